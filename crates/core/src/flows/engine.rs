use thiserror::Error;

use crate::domain::input::{parse_plu_codes, parse_rack_names};
use crate::domain::{RackName, StoreCode};
use crate::errors::{DomainError, InventoryError};
use crate::flows::callback::{CallbackAction, CallbackData};
use crate::flows::states::{
    Command, ExpectedInput, FlowAction, FlowInput, FlowState, Notice, OperationKind,
    PendingOperation, TransitionOutcome,
};

/// Pure conversation state machine. Executing commands and rendering replies is left to
/// the caller; this type only decides the next state.
#[derive(Clone, Copy, Debug, Default)]
pub struct FlowEngine;

impl FlowEngine {
    pub fn initial_state(&self) -> FlowState {
        FlowState::Idle
    }

    pub fn apply(
        &self,
        current: &FlowState,
        input: &FlowInput,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        transition(current, input)
    }
}

/// Rejected inputs leave the session state untouched.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("{message}")]
    InvalidInput { expected: ExpectedInput, message: String },
    #[error("button does not match the current step of {state:?}")]
    StaleAction { state: FlowState },
}

impl FlowTransitionError {
    fn invalid(expected: ExpectedInput, error: DomainError) -> Self {
        Self::InvalidInput { expected, message: InventoryError::from(error).user_message() }
    }
}

pub fn transition(
    current: &FlowState,
    input: &FlowInput,
) -> Result<TransitionOutcome, FlowTransitionError> {
    let (to, action) = match input {
        FlowInput::ShowMenu => {
            let notice = current.has_pending().then_some(Notice::Cancelled);
            (FlowState::Idle, FlowAction::ShowMainMenu { notice })
        }
        FlowInput::Timeout => {
            if current.has_pending() {
                (FlowState::Idle, FlowAction::ShowMainMenu { notice: Some(Notice::Expired) })
            } else {
                (FlowState::Idle, FlowAction::Noop)
            }
        }
        FlowInput::Callback(data) => on_callback(current, data)?,
        FlowInput::Text(text) => on_text(current, text)?,
    };

    Ok(TransitionOutcome { from: current.clone(), to, action })
}

fn on_callback(
    current: &FlowState,
    data: &CallbackData,
) -> Result<(FlowState, FlowAction), FlowTransitionError> {
    let stale = || FlowTransitionError::StaleAction { state: current.clone() };

    match (data.action, current) {
        (CallbackAction::Start(kind), _) => Ok(start(kind)),
        (CallbackAction::Cancel, _) => {
            Ok((FlowState::Idle, FlowAction::ShowMainMenu { notice: Some(Notice::Cancelled) }))
        }
        (CallbackAction::Decline, FlowState::Confirming(_)) => {
            Ok((FlowState::Idle, FlowAction::ShowMainMenu { notice: Some(Notice::Declined) }))
        }
        (CallbackAction::Confirm(kind), FlowState::Confirming(command))
            if command.kind() == kind =>
        {
            Ok((FlowState::Idle, FlowAction::Execute(command.clone())))
        }
        (CallbackAction::PickStore(kind), FlowState::Collecting(pending))
            if pending.kind() == kind
                && pending.expected_input() == ExpectedInput::StoreChoice =>
        {
            let store = data.store.clone().ok_or_else(stale)?;
            with_store(pending, store).ok_or_else(stale)
        }
        (CallbackAction::PickRack(kind), FlowState::Collecting(pending))
            if pending.kind() == kind && pending.store() == data.store.as_ref() =>
        {
            let rack = data.rack.clone().ok_or_else(stale)?;
            with_rack(pending, rack).ok_or_else(stale)
        }
        _ => Err(stale()),
    }
}

fn on_text(current: &FlowState, text: &str) -> Result<(FlowState, FlowAction), FlowTransitionError> {
    let pending = match current {
        FlowState::Idle => {
            return Ok((
                FlowState::Idle,
                FlowAction::ShowMainMenu { notice: Some(Notice::ChooseFromMenu) },
            ));
        }
        FlowState::Confirming(_) => {
            return Err(FlowTransitionError::InvalidInput {
                expected: ExpectedInput::Confirmation,
                message: "Please press Confirm or Cancel.".to_owned(),
            });
        }
        FlowState::Collecting(pending) => pending,
    };

    let expected = pending.expected_input();
    let invalid = |error| FlowTransitionError::invalid(expected, error);

    match expected {
        ExpectedInput::NewStoreCode => {
            let store = StoreCode::parse(text).map_err(invalid)?;
            Ok(finish(Command::CreateStore { store }))
        }
        ExpectedInput::StoreChoice => {
            let store = StoreCode::parse(text).map_err(invalid)?;
            with_store(pending, store).ok_or_else(|| unexpected(current))
        }
        ExpectedInput::RackNames => {
            let racks = parse_rack_names(text).map_err(invalid)?;
            let command = match pending {
                PendingOperation::AddRacks { store: Some(store) } => {
                    Command::AddRacks { store: store.clone(), racks }
                }
                PendingOperation::DeleteRacks { store: Some(store) } => {
                    Command::DeleteRacks { store: store.clone(), racks }
                }
                _ => return Err(unexpected(current)),
            };
            Ok(finish(command))
        }
        ExpectedInput::RackChoice => {
            let rack = RackName::parse(text).map_err(invalid)?;
            with_rack(pending, rack).ok_or_else(|| unexpected(current))
        }
        ExpectedInput::PluCodes => {
            let codes = parse_plu_codes(text).map_err(invalid)?;
            let command = match pending {
                PendingOperation::AddPlus { store: Some(store), rack: Some(rack) } => {
                    Command::AddPlus { store: store.clone(), rack: rack.clone(), codes }
                }
                PendingOperation::DeletePlus { store: Some(store), rack: Some(rack) } => {
                    Command::DeletePlus { store: store.clone(), rack: rack.clone(), codes }
                }
                _ => return Err(unexpected(current)),
            };
            Ok(finish(command))
        }
        ExpectedInput::Confirmation => Err(unexpected(current)),
    }
}

fn unexpected(current: &FlowState) -> FlowTransitionError {
    FlowTransitionError::StaleAction { state: current.clone() }
}

/// A new operation always replaces whatever was pending.
fn start(kind: OperationKind) -> (FlowState, FlowAction) {
    let action = match kind {
        OperationKind::AddStore => FlowAction::PromptStoreCode,
        operation => FlowAction::OfferStores { operation },
    };
    (FlowState::Collecting(PendingOperation::start(kind)), action)
}

fn with_store(pending: &PendingOperation, store: StoreCode) -> Option<(FlowState, FlowAction)> {
    let operation = pending.kind();
    let next = match pending {
        PendingOperation::DeleteStore => return Some(finish(Command::DeleteStore { store })),
        PendingOperation::AddRacks { store: None } => {
            let action = FlowAction::PromptRackNames { operation, store: store.clone() };
            (PendingOperation::AddRacks { store: Some(store) }, action)
        }
        PendingOperation::DeleteRacks { store: None } => {
            let action = FlowAction::OfferRacks { operation, store: store.clone() };
            (PendingOperation::DeleteRacks { store: Some(store) }, action)
        }
        PendingOperation::AddPlus { store: None, .. } => {
            let action = FlowAction::OfferRacks { operation, store: store.clone() };
            (PendingOperation::AddPlus { store: Some(store), rack: None }, action)
        }
        PendingOperation::DeletePlus { store: None, .. } => {
            let action = FlowAction::OfferRacks { operation, store: store.clone() };
            (PendingOperation::DeletePlus { store: Some(store), rack: None }, action)
        }
        _ => return None,
    };
    Some((FlowState::Collecting(next.0), next.1))
}

fn with_rack(pending: &PendingOperation, rack: RackName) -> Option<(FlowState, FlowAction)> {
    let operation = pending.kind();
    match pending {
        PendingOperation::DeleteRacks { store: Some(store) } => {
            Some(finish(Command::DeleteRacks { store: store.clone(), racks: vec![rack] }))
        }
        PendingOperation::AddPlus { store: Some(store), rack: None } => Some((
            FlowState::Collecting(PendingOperation::AddPlus {
                store: Some(store.clone()),
                rack: Some(rack.clone()),
            }),
            FlowAction::PromptPluCodes { operation, store: store.clone(), rack },
        )),
        PendingOperation::DeletePlus { store: Some(store), rack: None } => Some((
            FlowState::Collecting(PendingOperation::DeletePlus {
                store: Some(store.clone()),
                rack: Some(rack.clone()),
            }),
            FlowAction::PromptPluCodes { operation, store: store.clone(), rack },
        )),
        _ => None,
    }
}

/// Destructive commands wait for an explicit confirmation; additive ones run straight away.
fn finish(command: Command) -> (FlowState, FlowAction) {
    if command.kind().is_destructive() {
        (FlowState::Confirming(command.clone()), FlowAction::AskConfirmation(command))
    } else {
        (FlowState::Idle, FlowAction::Execute(command))
    }
}
