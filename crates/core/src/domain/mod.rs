pub mod input;
pub mod plu;
pub mod rack;
pub mod store;

pub use plu::PluCode;
pub use rack::RackName;
pub use store::StoreCode;
