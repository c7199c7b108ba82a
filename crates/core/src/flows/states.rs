use serde::{Deserialize, Serialize};

use crate::domain::{PluCode, RackName, StoreCode};
use crate::flows::callback::CallbackData;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    AddStore,
    DeleteStore,
    AddRack,
    DeleteRack,
    AddPlu,
    DeletePlu,
}

impl OperationKind {
    pub const ALL: [OperationKind; 6] = [
        Self::AddStore,
        Self::DeleteStore,
        Self::AddRack,
        Self::DeleteRack,
        Self::AddPlu,
        Self::DeletePlu,
    ];

    /// Short token used inside callback payloads.
    pub fn code(self) -> &'static str {
        match self {
            Self::AddStore => "as",
            Self::DeleteStore => "ds",
            Self::AddRack => "ar",
            Self::DeleteRack => "dr",
            Self::AddPlu => "ap",
            Self::DeletePlu => "dp",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::AddStore => "Add store",
            Self::DeleteStore => "Delete store",
            Self::AddRack => "Add rack",
            Self::DeleteRack => "Delete rack",
            Self::AddPlu => "Add PLU",
            Self::DeletePlu => "Delete PLU",
        }
    }

    pub fn is_destructive(self) -> bool {
        matches!(self, Self::DeleteStore | Self::DeleteRack | Self::DeletePlu)
    }
}

/// Context collected so far for the operation a session is working on. Each variant
/// carries only the fields its operation needs; `None` marks the field being asked for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PendingOperation {
    AddStore,
    DeleteStore,
    AddRacks { store: Option<StoreCode> },
    DeleteRacks { store: Option<StoreCode> },
    AddPlus { store: Option<StoreCode>, rack: Option<RackName> },
    DeletePlus { store: Option<StoreCode>, rack: Option<RackName> },
}

impl PendingOperation {
    pub fn start(kind: OperationKind) -> Self {
        match kind {
            OperationKind::AddStore => Self::AddStore,
            OperationKind::DeleteStore => Self::DeleteStore,
            OperationKind::AddRack => Self::AddRacks { store: None },
            OperationKind::DeleteRack => Self::DeleteRacks { store: None },
            OperationKind::AddPlu => Self::AddPlus { store: None, rack: None },
            OperationKind::DeletePlu => Self::DeletePlus { store: None, rack: None },
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Self::AddStore => OperationKind::AddStore,
            Self::DeleteStore => OperationKind::DeleteStore,
            Self::AddRacks { .. } => OperationKind::AddRack,
            Self::DeleteRacks { .. } => OperationKind::DeleteRack,
            Self::AddPlus { .. } => OperationKind::AddPlu,
            Self::DeletePlus { .. } => OperationKind::DeletePlu,
        }
    }

    pub fn store(&self) -> Option<&StoreCode> {
        match self {
            Self::AddStore | Self::DeleteStore => None,
            Self::AddRacks { store }
            | Self::DeleteRacks { store }
            | Self::AddPlus { store, .. }
            | Self::DeletePlus { store, .. } => store.as_ref(),
        }
    }

    pub fn expected_input(&self) -> ExpectedInput {
        match self {
            Self::AddStore => ExpectedInput::NewStoreCode,
            Self::DeleteStore
            | Self::AddRacks { store: None }
            | Self::DeleteRacks { store: None }
            | Self::AddPlus { store: None, .. }
            | Self::DeletePlus { store: None, .. } => ExpectedInput::StoreChoice,
            Self::AddRacks { store: Some(_) } | Self::DeleteRacks { store: Some(_) } => {
                ExpectedInput::RackNames
            }
            Self::AddPlus { rack: None, .. } | Self::DeletePlus { rack: None, .. } => {
                ExpectedInput::RackChoice
            }
            Self::AddPlus { rack: Some(_), .. } | Self::DeletePlus { rack: Some(_), .. } => {
                ExpectedInput::PluCodes
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpectedInput {
    NewStoreCode,
    StoreChoice,
    RackNames,
    RackChoice,
    PluCodes,
    Confirmation,
}

/// A fully specified operation, ready to run against the inventory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    CreateStore { store: StoreCode },
    DeleteStore { store: StoreCode },
    AddRacks { store: StoreCode, racks: Vec<RackName> },
    DeleteRacks { store: StoreCode, racks: Vec<RackName> },
    AddPlus { store: StoreCode, rack: RackName, codes: Vec<PluCode> },
    DeletePlus { store: StoreCode, rack: RackName, codes: Vec<PluCode> },
}

impl Command {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::CreateStore { .. } => OperationKind::AddStore,
            Self::DeleteStore { .. } => OperationKind::DeleteStore,
            Self::AddRacks { .. } => OperationKind::AddRack,
            Self::DeleteRacks { .. } => OperationKind::DeleteRack,
            Self::AddPlus { .. } => OperationKind::AddPlu,
            Self::DeletePlus { .. } => OperationKind::DeletePlu,
        }
    }

    pub fn store(&self) -> &StoreCode {
        match self {
            Self::CreateStore { store }
            | Self::DeleteStore { store }
            | Self::AddRacks { store, .. }
            | Self::DeleteRacks { store, .. }
            | Self::AddPlus { store, .. }
            | Self::DeletePlus { store, .. } => store,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FlowState {
    #[default]
    Idle,
    Collecting(PendingOperation),
    Confirming(Command),
}

impl FlowState {
    pub fn has_pending(&self) -> bool {
        !matches!(self, Self::Idle)
    }

    pub fn expected_input(&self) -> Option<ExpectedInput> {
        match self {
            Self::Idle => None,
            Self::Collecting(pending) => Some(pending.expected_input()),
            Self::Confirming(_) => Some(ExpectedInput::Confirmation),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlowInput {
    ShowMenu,
    Callback(CallbackData),
    Text(String),
    Timeout,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notice {
    Cancelled,
    Declined,
    Expired,
    ChooseFromMenu,
}

impl Notice {
    pub fn text(self) -> &'static str {
        match self {
            Self::Cancelled => "Cancelled.",
            Self::Declined => "Nothing was deleted.",
            Self::Expired => "Session expired after inactivity. Nothing was changed.",
            Self::ChooseFromMenu => "Please pick an action from the menu first.",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowAction {
    ShowMainMenu { notice: Option<Notice> },
    PromptStoreCode,
    OfferStores { operation: OperationKind },
    PromptRackNames { operation: OperationKind, store: StoreCode },
    OfferRacks { operation: OperationKind, store: StoreCode },
    PromptPluCodes { operation: OperationKind, store: StoreCode, rack: RackName },
    AskConfirmation(Command),
    Execute(Command),
    Noop,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub from: FlowState,
    pub to: FlowState,
    pub action: FlowAction,
}
