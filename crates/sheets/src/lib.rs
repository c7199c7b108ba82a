//! Spreadsheet-backed inventory: the raw table seam, its Google Sheets and in-memory
//! implementations, and the repository that maps stores, racks and PLUs onto tables.

pub mod auth;
pub mod backend;
pub mod google;
pub mod inventory;
pub mod memory;
pub mod range;
pub mod retry;

pub use auth::{RefreshTokenProvider, StaticTokenProvider, TokenProvider};
pub use backend::{BackendError, NamedRange, PluRow, TableBackend};
pub use google::GoogleSheetsBackend;
pub use inventory::SheetInventory;
pub use memory::InMemoryTableBackend;
pub use range::RowRange;
pub use retry::RetryPolicy;
