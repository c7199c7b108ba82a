//! Runs the pure flow state machine against a session and performs its side effects.

use std::sync::Arc;

use rackbot_core::flows::render::{self, MenuOptions};
use rackbot_core::flows::FlowTransitionError;
use rackbot_core::{
    Command, FlowAction, FlowEngine, FlowInput, FlowState, InventoryError, InventoryService,
    OperationKind, Reply, StoreCode,
};
use tracing::{error, info, warn};

use crate::session::Session;

pub const STALE_BUTTON_MESSAGE: &str = "That button belongs to a step that is no longer active.";
pub const INVALID_BUTTON_MESSAGE: &str = "That button is no longer valid.";

pub struct ConversationEngine<S: ?Sized> {
    inventory: Arc<S>,
    flows: FlowEngine,
    menu: MenuOptions,
}

impl<S> ConversationEngine<S>
where
    S: InventoryService + ?Sized,
{
    pub fn new(inventory: Arc<S>, menu: MenuOptions) -> Self {
        Self { inventory, flows: FlowEngine, menu }
    }

    pub fn main_menu(&self, header: Option<&str>) -> Reply {
        render::main_menu(&self.menu, header)
    }

    /// Reply for a button whose payload could not be decoded.
    pub fn invalid_button(&self) -> Reply {
        render::retry_prompt(INVALID_BUTTON_MESSAGE)
    }

    /// Applies one input to the session. Returns `None` when nothing should be sent.
    pub async fn handle(&self, session: &mut Session, input: FlowInput) -> Option<Reply> {
        let outcome = match self.flows.apply(&session.state, &input) {
            Ok(outcome) => outcome,
            Err(FlowTransitionError::InvalidInput { expected, message }) => {
                info!(
                    event_name = "agent.flow.input_rejected",
                    chat_id = %session.chat_id,
                    expected = ?expected,
                    "input rejected, state unchanged"
                );
                return Some(render::retry_prompt(&message));
            }
            Err(FlowTransitionError::StaleAction { .. }) => {
                info!(
                    event_name = "agent.flow.stale_action",
                    chat_id = %session.chat_id,
                    "stale button ignored"
                );
                return Some(render::retry_prompt(STALE_BUTTON_MESSAGE));
            }
        };

        info!(
            event_name = "agent.flow.transition",
            chat_id = %session.chat_id,
            from = ?outcome.from.expected_input(),
            to = ?outcome.to.expected_input(),
            "flow advanced"
        );
        session.state = outcome.to;
        self.perform(session, outcome.from, outcome.action).await
    }

    async fn perform(
        &self,
        session: &mut Session,
        previous: FlowState,
        action: FlowAction,
    ) -> Option<Reply> {
        match action {
            FlowAction::Noop => None,
            FlowAction::ShowMainMenu { notice } => {
                Some(self.main_menu(notice.map(|notice| notice.text())))
            }
            FlowAction::PromptStoreCode => Some(render::store_code_prompt()),
            FlowAction::OfferStores { operation } => match self.inventory.list_stores().await {
                Ok(stores) if stores.is_empty() => {
                    session.reset();
                    Some(self.main_menu(Some("No stores yet.")))
                }
                Ok(stores) => Some(render::store_choice(operation, &stores)),
                Err(error) => Some(self.lookup_failed(session, previous, error)),
            },
            FlowAction::PromptRackNames { store, .. } => {
                match self.inventory.list_racks(&store).await {
                    Ok(racks) => Some(render::rack_names_prompt(&store, &racks)),
                    Err(error) => Some(self.lookup_failed(session, previous, error)),
                }
            }
            FlowAction::OfferRacks { operation, store } => {
                match self.inventory.list_racks(&store).await {
                    Ok(racks) if racks.is_empty() => {
                        session.reset();
                        Some(self.main_menu(Some(&format!("Store {store} has no racks yet."))))
                    }
                    Ok(racks) => Some(render::rack_choice(operation, &store, &racks)),
                    Err(error) => Some(self.lookup_failed(session, previous, error)),
                }
            }
            FlowAction::PromptPluCodes { operation, store, rack } => {
                Some(render::plu_codes_prompt(operation, &store, &rack))
            }
            FlowAction::AskConfirmation(command) => Some(render::confirmation(&command)),
            FlowAction::Execute(command) => {
                let report = self.execute(session, &command).await;
                Some(self.main_menu(Some(&report)))
            }
        }
    }

    /// A lookup made while collecting input failed. A missing store keeps the user on the
    /// step that chose it; anything else abandons the operation.
    fn lookup_failed(
        &self,
        session: &mut Session,
        previous: FlowState,
        error: InventoryError,
    ) -> Reply {
        match error {
            InventoryError::NotFound { .. } | InventoryError::InvalidInput(_) => {
                session.state = previous;
                render::retry_prompt(&error.user_message())
            }
            other => {
                self.log_failure(session, None, &other);
                session.reset();
                self.main_menu(Some(&other.user_message()))
            }
        }
    }

    async fn execute(&self, session: &Session, command: &Command) -> String {
        let operation = command.kind();
        let store = command.store();
        let result = match command {
            Command::CreateStore { store } => {
                self.inventory.create_store(store).await.map(|()| render::store_created(store))
            }
            Command::DeleteStore { store } => {
                self.inventory.delete_store(store).await.map(|()| render::store_deleted(store))
            }
            Command::AddRacks { store, racks } => self
                .inventory
                .add_racks(store, racks)
                .await
                .map(|outcome| render::rack_add_report(store, &outcome)),
            Command::DeleteRacks { store, racks } => self
                .inventory
                .delete_racks(store, racks)
                .await
                .map(|outcome| render::rack_delete_report(store, &outcome)),
            Command::AddPlus { store, rack, codes } => self
                .inventory
                .add_plus(store, rack, codes)
                .await
                .map(|outcome| render::plu_add_report(store, rack, &outcome)),
            Command::DeletePlus { store, rack, codes } => self
                .inventory
                .delete_plus(store, rack, codes)
                .await
                .map(|outcome| render::plu_delete_report(store, rack, &outcome)),
        };

        match result {
            Ok(report) => {
                info!(
                    event_name = "agent.command.executed",
                    chat_id = %session.chat_id,
                    operation = operation.code(),
                    store = %store,
                    "command executed"
                );
                report
            }
            Err(error) => {
                self.log_failure(session, Some((operation, store)), &error);
                error.user_message()
            }
        }
    }

    fn log_failure(
        &self,
        session: &Session,
        command: Option<(OperationKind, &StoreCode)>,
        error: &InventoryError,
    ) {
        let operation = command.map(|(kind, _)| kind.code()).unwrap_or("lookup");
        let store = command.map(|(_, store)| store.to_string()).unwrap_or_default();
        if error.is_fatal() {
            error!(
                event_name = "agent.command.failed",
                chat_id = %session.chat_id,
                operation,
                store = %store,
                error = %error,
                "inventory call failed"
            );
        } else {
            warn!(
                event_name = "agent.command.rejected",
                chat_id = %session.chat_id,
                operation,
                store = %store,
                error = %error,
                "inventory call rejected"
            );
        }
    }
}
