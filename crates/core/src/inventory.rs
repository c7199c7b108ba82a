use async_trait::async_trait;

use crate::domain::{PluCode, RackName, StoreCode};
use crate::errors::InventoryError;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RackAddOutcome {
    pub added: Vec<RackName>,
    pub existing: Vec<RackName>,
    pub failed: Vec<RackName>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RackDeleteOutcome {
    pub deleted: Vec<RackName>,
    pub not_found: Vec<RackName>,
    pub failed: Vec<RackName>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PluAddOutcome {
    pub added: Vec<PluCode>,
    pub duplicates: Vec<PluCode>,
    pub failed: Vec<PluCode>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PluDeleteOutcome {
    pub deleted: Vec<PluCode>,
    pub not_found: Vec<PluCode>,
    pub failed: Vec<PluCode>,
}

/// Domain operations over stores, racks and PLUs.
///
/// Batch operations never abort on a single item: every distinct name or code lands in one
/// bucket of the returned outcome. A code repeated within one batch is also listed once under
/// `duplicates`, so it can appear both there and in `added`. An `Err` means the whole call
/// could not start (unknown store or rack, backend unreachable).
#[async_trait]
pub trait InventoryService: Send + Sync {
    async fn create_store(&self, store: &StoreCode) -> Result<(), InventoryError>;

    async fn delete_store(&self, store: &StoreCode) -> Result<(), InventoryError>;

    async fn list_stores(&self) -> Result<Vec<StoreCode>, InventoryError>;

    async fn add_racks(
        &self,
        store: &StoreCode,
        racks: &[RackName],
    ) -> Result<RackAddOutcome, InventoryError>;

    async fn list_racks(&self, store: &StoreCode) -> Result<Vec<RackName>, InventoryError>;

    async fn delete_racks(
        &self,
        store: &StoreCode,
        racks: &[RackName],
    ) -> Result<RackDeleteOutcome, InventoryError>;

    async fn add_plus(
        &self,
        store: &StoreCode,
        rack: &RackName,
        codes: &[PluCode],
    ) -> Result<PluAddOutcome, InventoryError>;

    async fn delete_plus(
        &self,
        store: &StoreCode,
        rack: &RackName,
        codes: &[PluCode],
    ) -> Result<PluDeleteOutcome, InventoryError>;
}
