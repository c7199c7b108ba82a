//! Stores, racks and PLUs laid out inside spreadsheet tables.
//!
//! Layout of a store table:
//!
//! ```text
//! row h      PLU | Item Name | Barcode          <- rack header
//! row h+1    A1  | =lookup   | =lookup          <- named range `Rak_Satu_AB12` starts here
//! ...
//! row e      B7  | =lookup   | =lookup          <- named range ends here
//! e+1..e+3   (blank spacer rows)
//! row e+4    PLU | Item Name | Barcode          <- next rack header
//! ```
//!
//! A rack's named range covers its data rows only; the header sits in the row above it.
//! Range names are spreadsheet-wide, so they carry the store code (`Rak_Satu_AB12`).
//! Cells are always written before a named range is registered, widened or removed.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use rackbot_core::domain::store::is_store_code;
use rackbot_core::errors::{EntityKind, InventoryError};
use rackbot_core::inventory::{
    InventoryService, PluAddOutcome, PluDeleteOutcome, RackAddOutcome, RackDeleteOutcome,
};
use rackbot_core::{PluCode, RackName, StoreCode};
use tracing::{error, info, warn};

use crate::backend::{BackendError, PluRow, TableBackend};
use crate::range::{quote_table_name, RowRange};
use crate::retry::RetryPolicy;

pub const RACK_HEADER: [&str; 3] = ["PLU", "Item Name", "Barcode"];
pub const PRODUCTS_HEADER: [&str; 3] = ["plu", "Item Name", "Barcode"];
pub const DEFAULT_PRODUCTS_TABLE: &str = "produk";
/// Blank rows kept between the end of one rack and the header of the next.
pub const SPACER_ROWS: u32 = 3;
/// Rows below a new rack's header that get the data-row styling.
pub const FORMATTED_DATA_ROWS: u32 = 50;

#[derive(Clone, Debug, PartialEq, Eq)]
struct RackSlot {
    name: RackName,
    /// Name of the backing named range as stored, legacy bare names included.
    range_name: String,
    range: RowRange,
}

impl RackSlot {
    fn last_row(&self) -> u32 {
        self.range.last.unwrap_or(self.range.first)
    }

    /// The header row plus the data rows.
    fn block(&self) -> RowRange {
        RowRange::rows(self.range.first.saturating_sub(1).max(1), self.last_row())
    }
}

pub struct SheetInventory<B> {
    backend: Arc<B>,
    retry: RetryPolicy,
    products_table: String,
}

impl<B> SheetInventory<B>
where
    B: TableBackend,
{
    pub fn new(backend: Arc<B>, retry: RetryPolicy) -> Self {
        Self { backend, retry, products_table: DEFAULT_PRODUCTS_TABLE.to_string() }
    }

    pub fn with_products_table(mut self, products_table: impl Into<String>) -> Self {
        self.products_table = products_table.into();
        self
    }

    fn report(&self, operation: &'static str, error: &BackendError) {
        error!(
            event_name = "sheets.inventory.backend_failure",
            operation,
            error = %error,
            "table backend call failed"
        );
    }

    fn failure(&self, operation: &'static str, error: BackendError) -> InventoryError {
        self.report(operation, &error);
        InventoryError::Fatal(format!("{operation}: {error}"))
    }

    /// Maps a missing table to `NotFound` for the store and everything else to `Fatal`.
    fn store_failure(
        &self,
        operation: &'static str,
        store: &StoreCode,
        error: BackendError,
    ) -> InventoryError {
        match error {
            BackendError::NotFound(_) => InventoryError::not_found(EntityKind::Store, store.as_str()),
            other => self.failure(operation, other),
        }
    }

    fn lookup_row(&self, plu: &str, row: u32) -> PluRow {
        let products = quote_table_name(&self.products_table);
        let lookup = |column: &str| {
            format!(
                "=IFERROR(INDEX({products}!{column}:{column}, MATCH(A{row}, {products}!A:A, 0)), \"\")"
            )
        };
        PluRow::new(plu, lookup("B"), lookup("C"))
    }

    async fn used_rows(&self, store: &StoreCode) -> Result<u32, InventoryError> {
        let table = store.as_str();
        let whole = RowRange::open(1);
        let rows = self
            .retry
            .run("read_cells", || self.backend.read_cells(table, &whole))
            .await
            .map_err(|error| self.store_failure("read_cells", store, error))?;
        Ok(rows.len() as u32)
    }

    /// Racks of a store ordered by position. Open-ended ranges left by older layouts are
    /// closed at the last used row above the next rack.
    async fn racks(&self, store: &StoreCode) -> Result<Vec<RackSlot>, InventoryError> {
        let table = store.as_str();
        let named = self
            .retry
            .run("list_named_ranges", || self.backend.list_named_ranges(table))
            .await
            .map_err(|error| self.store_failure("list_named_ranges", store, error))?;

        let mut racks = Vec::with_capacity(named.len());
        for entry in named {
            match RackName::from_range_name(store, &entry.name) {
                Ok(name) => {
                    racks.push(RackSlot { name, range_name: entry.name, range: entry.range })
                }
                Err(_) => warn!(
                    event_name = "sheets.inventory.foreign_range",
                    store = %store,
                    range_name = %entry.name,
                    "ignoring named range that is not a rack"
                ),
            }
        }
        racks.sort_by_key(|slot| slot.range.first);

        if racks.iter().any(|slot| slot.range.is_open()) {
            let used = self.used_rows(store).await?;
            let next_firsts =
                racks.iter().skip(1).map(|slot| Some(slot.range.first)).chain([None]).collect::<Vec<_>>();
            for (slot, next_first) in racks.iter_mut().zip(next_firsts) {
                if slot.range.is_open() {
                    let ceiling = next_first.map_or(used, |first| used.min(first.saturating_sub(2)));
                    slot.range = RowRange::rows(slot.range.first, ceiling);
                }
            }
        }

        Ok(racks)
    }

    async fn find_rack(
        &self,
        store: &StoreCode,
        rack: &RackName,
    ) -> Result<(Vec<RackSlot>, usize), InventoryError> {
        let racks = self.racks(store).await?;
        let index = racks
            .iter()
            .position(|slot| slot.name == *rack)
            .ok_or_else(|| InventoryError::not_found(EntityKind::Rack, rack.as_str()))?;
        Ok((racks, index))
    }

    async fn ensure_products_table(&self, tables: &[String]) -> Result<(), InventoryError> {
        if tables.iter().any(|table| table == &self.products_table) {
            return Ok(());
        }
        let products = self.products_table.as_str();
        match self.retry.run("create_table", || self.backend.create_table(products)).await {
            Ok(()) => {}
            Err(BackendError::Conflict(_)) => return Ok(()),
            Err(error) => return Err(self.failure("create_table", error)),
        }

        let header = PluRow::new(PRODUCTS_HEADER[0], PRODUCTS_HEADER[1], PRODUCTS_HEADER[2]);
        self.backend
            .append_rows(products, &[header])
            .await
            .map_err(|error| self.failure("append_rows", error))?;
        info!(
            event_name = "sheets.products.created",
            table = %self.products_table,
            "created shared products table"
        );
        Ok(())
    }

    async fn add_one_rack(
        &self,
        store: &StoreCode,
        rack: &RackName,
        header_row: u32,
    ) -> Result<RowRange, BackendError> {
        let table = store.as_str();
        let data_row = header_row + 1;
        let block = RowRange::rows(header_row, data_row);
        let cells = [
            PluRow::new(RACK_HEADER[0], RACK_HEADER[1], RACK_HEADER[2]),
            self.lookup_row("", data_row),
        ];
        self.retry.run("write_cells", || self.backend.write_cells(table, &block, &cells)).await?;

        let range_name = rack.range_name(store);
        let range = RowRange::single(data_row);
        let registered = self
            .retry
            .run("add_named_range", || self.backend.add_named_range(table, &range_name, &range))
            .await;
        if let Err(error) = registered {
            self.rollback(store, &block).await;
            return Err(error);
        }

        let styled = self
            .retry
            .run("format_rack_block", || {
                self.backend.format_rack_block(table, header_row, FORMATTED_DATA_ROWS)
            })
            .await;
        if let Err(error) = styled {
            warn!(
                event_name = "sheets.rack.format_failed",
                store = %store,
                rack = %rack,
                header_row,
                error = %error,
                "rack created without styling"
            );
        }
        Ok(range)
    }

    /// Best-effort undo of cells written by a step whose registration failed.
    async fn rollback(&self, store: &StoreCode, range: &RowRange) {
        let table = store.as_str();
        if let Err(error) =
            self.retry.run("clear_cells", || self.backend.clear_cells(table, range)).await
        {
            warn!(
                event_name = "sheets.inventory.rollback_failed",
                store = %store,
                range = %range,
                error = %error,
                "could not clear cells after a failed registration"
            );
        }
    }

    /// Writes `placements` (row, code) in as few calls as possible. Returns the codes that
    /// were written and the codes whose write failed.
    async fn write_placements(
        &self,
        store: &StoreCode,
        placements: &[(u32, PluCode)],
    ) -> (Vec<PluCode>, Vec<PluCode>) {
        let table = store.as_str();
        let mut written = Vec::new();
        let mut failed = Vec::new();

        for run in contiguous_runs(placements) {
            let (first, _) = run[0];
            let range = RowRange::rows(first, first + run.len() as u32 - 1);
            let cells =
                run.iter().map(|(row, code)| self.lookup_row(code.as_str(), *row)).collect::<Vec<_>>();
            let codes = run.iter().map(|(_, code)| code.clone());
            match self.retry.run("write_cells", || self.backend.write_cells(table, &range, &cells)).await {
                Ok(()) => written.extend(codes),
                Err(error) => {
                    self.report("write_cells", &error);
                    failed.extend(codes);
                }
            }
        }
        (written, failed)
    }

    /// Appends `codes` directly below the rack and widens its registration. Rows are
    /// inserted first when the next rack's block would otherwise be crowded.
    async fn grow_rack(
        &self,
        store: &StoreCode,
        racks: &[RackSlot],
        index: usize,
        codes: &[PluCode],
    ) -> Result<(), BackendError> {
        let table = store.as_str();
        let slot = &racks[index];
        let start = slot.last_row() + 1;
        let end = slot.last_row() + codes.len() as u32;

        if let Some(next) = racks.get(index + 1) {
            let next_header = next.range.first.saturating_sub(1);
            let wanted_header = end + SPACER_ROWS + 1;
            if next_header < wanted_header {
                let count = wanted_header - next_header;
                // Inserting shifts rows, so it is not retried.
                self.backend.insert_rows(table, start, count).await?;
                info!(
                    event_name = "sheets.rack.rows_inserted",
                    store = %store,
                    rack = %slot.name,
                    before_row = start,
                    count,
                    "made room below rack"
                );
            }
        }

        let appended = RowRange::rows(start, end);
        let cells = codes
            .iter()
            .zip(start..)
            .map(|(code, row)| self.lookup_row(code.as_str(), row))
            .collect::<Vec<_>>();
        self.retry.run("write_cells", || self.backend.write_cells(table, &appended, &cells)).await?;

        let widened = RowRange::rows(slot.range.first, end);
        let range_name = slot.range_name.as_str();
        let registered = self
            .retry
            .run("update_named_range", || {
                self.backend.update_named_range(table, range_name, &widened)
            })
            .await;
        if let Err(error) = registered {
            self.rollback(store, &appended).await;
            return Err(error);
        }
        Ok(())
    }
}

/// Splits row placements into runs of consecutive rows.
fn contiguous_runs(placements: &[(u32, PluCode)]) -> Vec<&[(u32, PluCode)]> {
    let mut runs = Vec::new();
    let mut start = 0;
    for index in 1..=placements.len() {
        let breaks = index == placements.len() || placements[index].0 != placements[index - 1].0 + 1;
        if breaks {
            runs.push(&placements[start..index]);
            start = index;
        }
    }
    runs
}

fn next_header_row(used_rows: u32, racks: &[RackSlot]) -> u32 {
    let tail = racks.iter().map(RackSlot::last_row).max().unwrap_or(0).max(used_rows);
    if tail == 0 {
        1
    } else {
        tail + SPACER_ROWS + 1
    }
}

#[async_trait]
impl<B> InventoryService for SheetInventory<B>
where
    B: TableBackend + 'static,
{
    async fn create_store(&self, store: &StoreCode) -> Result<(), InventoryError> {
        let tables = self
            .retry
            .run("list_tables", || self.backend.list_tables())
            .await
            .map_err(|error| self.failure("list_tables", error))?;
        if tables.iter().any(|table| table == store.as_str()) {
            return Err(InventoryError::already_exists(EntityKind::Store, store.as_str()));
        }

        self.ensure_products_table(&tables).await?;

        let table = store.as_str();
        match self.retry.run("create_table", || self.backend.create_table(table)).await {
            Ok(()) => {}
            Err(BackendError::Conflict(_)) => {
                return Err(InventoryError::already_exists(EntityKind::Store, store.as_str()));
            }
            Err(error) => return Err(self.failure("create_table", error)),
        }

        info!(event_name = "sheets.store.created", store = %store, "store created");
        Ok(())
    }

    async fn delete_store(&self, store: &StoreCode) -> Result<(), InventoryError> {
        let table = store.as_str();
        self.retry
            .run("delete_table", || self.backend.delete_table(table))
            .await
            .map_err(|error| self.store_failure("delete_table", store, error))?;

        info!(event_name = "sheets.store.deleted", store = %store, "store deleted");
        Ok(())
    }

    async fn list_stores(&self) -> Result<Vec<StoreCode>, InventoryError> {
        let tables = self
            .retry
            .run("list_tables", || self.backend.list_tables())
            .await
            .map_err(|error| self.failure("list_tables", error))?;

        Ok(tables
            .iter()
            .filter(|table| is_store_code(table))
            .filter_map(|table| StoreCode::parse(table).ok())
            .collect())
    }

    async fn add_racks(
        &self,
        store: &StoreCode,
        racks: &[RackName],
    ) -> Result<RackAddOutcome, InventoryError> {
        let mut slots = self.racks(store).await?;
        let mut used = self.used_rows(store).await?;
        let mut outcome = RackAddOutcome::default();

        for rack in racks {
            if slots.iter().any(|slot| slot.name == *rack) {
                outcome.existing.push(rack.clone());
                continue;
            }

            let header_row = next_header_row(used, &slots);
            match self.add_one_rack(store, rack, header_row).await {
                Ok(range) => {
                    info!(
                        event_name = "sheets.rack.created",
                        store = %store,
                        rack = %rack,
                        header_row,
                        "rack created"
                    );
                    used = used.max(header_row + 1);
                    let range_name = rack.range_name(store);
                    slots.push(RackSlot { name: rack.clone(), range_name, range });
                    outcome.added.push(rack.clone());
                }
                Err(BackendError::Conflict(_)) => outcome.existing.push(rack.clone()),
                Err(error) => {
                    self.report("add_rack", &error);
                    outcome.failed.push(rack.clone());
                }
            }
        }

        Ok(outcome)
    }

    async fn list_racks(&self, store: &StoreCode) -> Result<Vec<RackName>, InventoryError> {
        Ok(self.racks(store).await?.into_iter().map(|slot| slot.name).collect())
    }

    async fn delete_racks(
        &self,
        store: &StoreCode,
        racks: &[RackName],
    ) -> Result<RackDeleteOutcome, InventoryError> {
        let table = store.as_str();
        let slots = self.racks(store).await?;
        let mut outcome = RackDeleteOutcome::default();

        for rack in racks {
            let Some(slot) = slots.iter().find(|slot| slot.name == *rack) else {
                outcome.not_found.push(rack.clone());
                continue;
            };

            let block = slot.block();
            if let Err(error) =
                self.retry.run("clear_cells", || self.backend.clear_cells(table, &block)).await
            {
                self.report("clear_cells", &error);
                outcome.failed.push(rack.clone());
                continue;
            }

            match self
                .retry
                .run("delete_named_range", || {
                    self.backend.delete_named_range(table, &slot.range_name)
                })
                .await
            {
                Ok(()) | Err(BackendError::NotFound(_)) => {
                    info!(
                        event_name = "sheets.rack.deleted",
                        store = %store,
                        rack = %rack,
                        "rack deleted"
                    );
                    outcome.deleted.push(rack.clone());
                }
                Err(error) => {
                    self.report("delete_named_range", &error);
                    outcome.failed.push(rack.clone());
                }
            }
        }

        Ok(outcome)
    }

    async fn add_plus(
        &self,
        store: &StoreCode,
        rack: &RackName,
        codes: &[PluCode],
    ) -> Result<PluAddOutcome, InventoryError> {
        let table = store.as_str();
        let (racks, index) = self.find_rack(store, rack).await?;
        let range = racks[index].range;
        let rows = self
            .retry
            .run("read_cells", || self.backend.read_cells(table, &range))
            .await
            .map_err(|error| self.store_failure("read_cells", store, error))?;

        let mut taken = rows
            .iter()
            .map(|row| row.plu.trim().to_ascii_uppercase())
            .filter(|plu| !plu.is_empty())
            .collect::<HashSet<_>>();
        let mut outcome = PluAddOutcome::default();
        let mut fresh = Vec::new();
        for code in codes {
            if taken.insert(code.as_str().to_string()) {
                fresh.push(code.clone());
            } else if !outcome.duplicates.contains(code) {
                outcome.duplicates.push(code.clone());
            }
        }
        if fresh.is_empty() {
            return Ok(outcome);
        }

        let vacant = rows
            .iter()
            .zip(range.first..)
            .filter(|(row, _)| row.plu.trim().is_empty())
            .map(|(_, row_number)| row_number);
        let placements = vacant.zip(fresh.iter().cloned()).collect::<Vec<_>>();
        let overflow = &fresh[placements.len()..];

        let (written, failed) = self.write_placements(store, &placements).await;
        outcome.added.extend(written);
        outcome.failed.extend(failed);

        if !overflow.is_empty() {
            match self.grow_rack(store, &racks, index, overflow).await {
                Ok(()) => outcome.added.extend(overflow.iter().cloned()),
                Err(error) => {
                    self.report("grow_rack", &error);
                    outcome.failed.extend(overflow.iter().cloned());
                }
            }
        }

        info!(
            event_name = "sheets.plu.added",
            store = %store,
            rack = %rack,
            added = outcome.added.len(),
            duplicates = outcome.duplicates.len(),
            failed = outcome.failed.len(),
            "plu batch applied"
        );
        Ok(outcome)
    }

    async fn delete_plus(
        &self,
        store: &StoreCode,
        rack: &RackName,
        codes: &[PluCode],
    ) -> Result<PluDeleteOutcome, InventoryError> {
        let table = store.as_str();
        let (racks, index) = self.find_rack(store, rack).await?;
        let range = racks[index].range;
        let rows = self
            .retry
            .run("read_cells", || self.backend.read_cells(table, &range))
            .await
            .map_err(|error| self.store_failure("read_cells", store, error))?;

        let mut outcome = PluDeleteOutcome::default();
        let mut seen = HashSet::new();
        for code in codes {
            if !seen.insert(code.as_str()) {
                continue;
            }
            let matches = rows
                .iter()
                .zip(range.first..)
                .filter(|(row, _)| row.plu.trim().eq_ignore_ascii_case(code.as_str()))
                .map(|(_, row_number)| row_number)
                .collect::<Vec<_>>();
            if matches.is_empty() {
                outcome.not_found.push(code.clone());
                continue;
            }

            let mut cleared = true;
            for row_number in matches {
                let target = RowRange::single(row_number);
                if let Err(error) =
                    self.retry.run("clear_cells", || self.backend.clear_cells(table, &target)).await
                {
                    self.report("clear_cells", &error);
                    cleared = false;
                }
            }
            if cleared {
                outcome.deleted.push(code.clone());
            } else {
                outcome.failed.push(code.clone());
            }
        }

        info!(
            event_name = "sheets.plu.deleted",
            store = %store,
            rack = %rack,
            deleted = outcome.deleted.len(),
            not_found = outcome.not_found.len(),
            failed = outcome.failed.len(),
            "plu deletion applied"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::{contiguous_runs, next_header_row, RackSlot};
    use crate::range::RowRange;
    use rackbot_core::{PluCode, RackName};

    fn slot(name: &str, first: u32, last: u32) -> RackSlot {
        let name = RackName::parse(name).expect("valid rack");
        RackSlot { range_name: name.encoded(), name, range: RowRange::rows(first, last) }
    }

    #[test]
    fn first_rack_starts_at_the_top_of_an_empty_table() {
        assert_eq!(next_header_row(0, &[]), 1);
    }

    #[test]
    fn next_rack_leaves_three_spacer_rows() {
        let racks = [slot("Rak Satu", 2, 6)];
        assert_eq!(next_header_row(4, &racks), 10);
        assert_eq!(next_header_row(8, &racks), 12);
    }

    #[test]
    fn placements_split_into_consecutive_runs() {
        let code = |value: &str| PluCode::parse(value).expect("valid code");
        let placements =
            vec![(3, code("A")), (4, code("B")), (7, code("C")), (8, code("D")), (10, code("E"))];
        let runs = contiguous_runs(&placements);
        let firsts = runs.iter().map(|run| (run[0].0, run.len())).collect::<Vec<_>>();
        assert_eq!(firsts, vec![(3, 2), (7, 2), (10, 1)]);
        assert!(contiguous_runs(&[]).is_empty());
    }

    #[test]
    fn rack_block_includes_the_header_row() {
        assert_eq!(slot("Rak Satu", 2, 6).block(), RowRange::rows(1, 6));
    }
}
