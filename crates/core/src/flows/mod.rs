pub mod callback;
pub mod engine;
pub mod render;
pub mod states;

pub use callback::{CallbackAction, CallbackData, CallbackError};
pub use engine::{transition, FlowEngine, FlowTransitionError};
pub use render::{ButtonTarget, MenuButton, MenuOptions, Reply, ReplyBuilder};
pub use states::{
    Command, ExpectedInput, FlowAction, FlowInput, FlowState, Notice, OperationKind,
    PendingOperation, TransitionOutcome,
};
