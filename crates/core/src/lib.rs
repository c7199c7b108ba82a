pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod gateway;
pub mod inventory;

pub use domain::{PluCode, RackName, StoreCode};
pub use errors::{DomainError, EntityKind, InventoryError};
pub use flows::{Command, FlowAction, FlowEngine, FlowInput, FlowState, OperationKind, Reply};
pub use gateway::{
    ChatId, Delivery, EventSink, GatewayError, InboundEvent, InboundKind, Outbox, Outgoing,
};
pub use inventory::{
    InventoryService, PluAddOutcome, PluDeleteOutcome, RackAddOutcome, RackDeleteOutcome,
};
