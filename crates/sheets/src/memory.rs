use std::collections::BTreeMap;

use async_trait::async_trait;
use rackbot_core::domain::rack::looks_like_cell_reference;
use tokio::sync::RwLock;

use crate::backend::{check_write_shape, BackendError, NamedRange, PluRow, TableBackend};
use crate::range::RowRange;

const MUTATING_OPERATIONS: &[&str] = &[
    "create_table",
    "delete_table",
    "write_cells",
    "clear_cells",
    "add_named_range",
    "update_named_range",
    "delete_named_range",
    "append_rows",
    "insert_rows",
    "delete_rows",
    "format_rack_block",
];

#[derive(Clone, Debug, Default)]
struct MemoryTable {
    name: String,
    rows: BTreeMap<u32, PluRow>,
    named_ranges: Vec<NamedRange>,
    formatted: Vec<RowRange>,
}

impl MemoryTable {
    fn last_used_row(&self) -> u32 {
        self.rows.keys().next_back().copied().unwrap_or(0)
    }

    fn named_range_mut(&mut self, name: &str) -> Result<&mut NamedRange, BackendError> {
        let table = self.name.clone();
        self.named_ranges
            .iter_mut()
            .find(|named| named.name == name)
            .ok_or_else(|| BackendError::NotFound(format!("named range `{name}` in `{table}`")))
    }
}

#[derive(Clone, Debug)]
struct Fault {
    operation: &'static str,
    remaining: usize,
    error: BackendError,
}

#[derive(Default)]
struct MemoryState {
    tables: Vec<MemoryTable>,
    calls: Vec<&'static str>,
    faults: Vec<Fault>,
}

impl MemoryState {
    fn table(&self, name: &str) -> Result<&MemoryTable, BackendError> {
        self.tables
            .iter()
            .find(|table| table.name == name)
            .ok_or_else(|| BackendError::NotFound(format!("table `{name}`")))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut MemoryTable, BackendError> {
        self.tables
            .iter_mut()
            .find(|table| table.name == name)
            .ok_or_else(|| BackendError::NotFound(format!("table `{name}`")))
    }

    /// Records the call and fires any injected fault for it.
    fn enter(&mut self, operation: &'static str) -> Result<(), BackendError> {
        self.calls.push(operation);
        let Some(index) = self
            .faults
            .iter()
            .position(|fault| fault.operation == operation || fault.operation == "*")
        else {
            return Ok(());
        };

        let fault = &mut self.faults[index];
        let error = fault.error.clone();
        fault.remaining -= 1;
        if fault.remaining == 0 {
            self.faults.remove(index);
        }
        Err(error)
    }
}

/// Table backend kept entirely in memory, for tests.
///
/// Faults can be injected per operation name (or `"*"` for any operation) and every call is
/// recorded so tests can assert that nothing was mutated.
#[derive(Default)]
pub struct InMemoryTableBackend {
    state: RwLock<MemoryState>,
}

impl InMemoryTableBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fail_next(&self, operation: &'static str, error: BackendError) {
        self.fail_times(operation, 1, error).await;
    }

    pub async fn fail_times(&self, operation: &'static str, times: usize, error: BackendError) {
        if times == 0 {
            return;
        }
        self.state.write().await.faults.push(Fault { operation, remaining: times, error });
    }

    pub async fn calls(&self) -> Vec<&'static str> {
        self.state.read().await.calls.clone()
    }

    pub async fn mutation_count(&self) -> usize {
        self.state
            .read()
            .await
            .calls
            .iter()
            .filter(|call| MUTATING_OPERATIONS.contains(*call))
            .count()
    }

    /// Blocks styled through `format_rack_block`, in call order.
    pub async fn formatted_blocks(&self, table: &str) -> Vec<RowRange> {
        let state = self.state.read().await;
        state.table(table).map(|table| table.formatted.clone()).unwrap_or_default()
    }

    /// Cell values of a whole table keyed by row, for assertions.
    pub async fn snapshot(&self, table: &str) -> Option<BTreeMap<u32, PluRow>> {
        let state = self.state.read().await;
        state.table(table).ok().map(|table| table.rows.clone())
    }
}

fn validate_range_name(name: &str) -> Result<(), BackendError> {
    let valid_chars = name.starts_with(|ch: char| ch.is_ascii_alphabetic() || ch == '_')
        && name.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
    if !valid_chars || looks_like_cell_reference(name) || name.eq_ignore_ascii_case("true")
        || name.eq_ignore_ascii_case("false")
    {
        return Err(BackendError::InvalidArgument(format!("invalid named range name `{name}`")));
    }
    Ok(())
}

#[async_trait]
impl TableBackend for InMemoryTableBackend {
    async fn list_tables(&self) -> Result<Vec<String>, BackendError> {
        let mut state = self.state.write().await;
        state.enter("list_tables")?;
        Ok(state.tables.iter().map(|table| table.name.clone()).collect())
    }

    async fn create_table(&self, name: &str) -> Result<(), BackendError> {
        let mut state = self.state.write().await;
        state.enter("create_table")?;
        if name.trim().is_empty() {
            return Err(BackendError::InvalidArgument("table name is empty".to_string()));
        }
        if state.tables.iter().any(|table| table.name == name) {
            return Err(BackendError::Conflict(format!("table `{name}` already exists")));
        }
        state.tables.push(MemoryTable { name: name.to_string(), ..MemoryTable::default() });
        Ok(())
    }

    async fn delete_table(&self, name: &str) -> Result<(), BackendError> {
        let mut state = self.state.write().await;
        state.enter("delete_table")?;
        let before = state.tables.len();
        state.tables.retain(|table| table.name != name);
        if state.tables.len() == before {
            return Err(BackendError::NotFound(format!("table `{name}`")));
        }
        Ok(())
    }

    async fn read_cells(
        &self,
        table: &str,
        range: &RowRange,
    ) -> Result<Vec<PluRow>, BackendError> {
        let mut state = self.state.write().await;
        state.enter("read_cells")?;
        let table = state.table(table)?;
        let last = range.last.unwrap_or_else(|| table.last_used_row());
        if last < range.first {
            return Ok(Vec::new());
        }
        Ok((range.first..=last)
            .map(|row| table.rows.get(&row).cloned().unwrap_or_default())
            .collect())
    }

    async fn write_cells(
        &self,
        table: &str,
        range: &RowRange,
        rows: &[PluRow],
    ) -> Result<(), BackendError> {
        let mut state = self.state.write().await;
        state.enter("write_cells")?;
        check_write_shape(range, rows)?;
        let table = state.table_mut(table)?;
        for (row_number, row) in (range.first..).zip(rows) {
            if row.is_blank() {
                table.rows.remove(&row_number);
            } else {
                table.rows.insert(row_number, row.clone());
            }
        }
        Ok(())
    }

    async fn clear_cells(&self, table: &str, range: &RowRange) -> Result<(), BackendError> {
        let mut state = self.state.write().await;
        state.enter("clear_cells")?;
        let table = state.table_mut(table)?;
        table.rows.retain(|row, _| !range.contains(*row));
        Ok(())
    }

    async fn list_named_ranges(&self, table: &str) -> Result<Vec<NamedRange>, BackendError> {
        let mut state = self.state.write().await;
        state.enter("list_named_ranges")?;
        Ok(state.table(table)?.named_ranges.clone())
    }

    async fn add_named_range(
        &self,
        table: &str,
        name: &str,
        range: &RowRange,
    ) -> Result<(), BackendError> {
        let mut state = self.state.write().await;
        state.enter("add_named_range")?;
        validate_range_name(name)?;
        state.table(table)?;
        // Names are unique across the whole spreadsheet, not per table.
        let taken = state
            .tables
            .iter()
            .any(|table| table.named_ranges.iter().any(|named| named.name == name));
        if taken {
            return Err(BackendError::Conflict(format!("named range `{name}` already exists")));
        }
        let table = state.table_mut(table)?;
        table.named_ranges.push(NamedRange { name: name.to_string(), range: *range });
        Ok(())
    }

    async fn update_named_range(
        &self,
        table: &str,
        name: &str,
        range: &RowRange,
    ) -> Result<(), BackendError> {
        let mut state = self.state.write().await;
        state.enter("update_named_range")?;
        let named = state.table_mut(table)?.named_range_mut(name)?;
        named.range = *range;
        Ok(())
    }

    async fn delete_named_range(&self, table: &str, name: &str) -> Result<(), BackendError> {
        let mut state = self.state.write().await;
        state.enter("delete_named_range")?;
        let table = state.table_mut(table)?;
        let before = table.named_ranges.len();
        table.named_ranges.retain(|named| named.name != name);
        if table.named_ranges.len() == before {
            return Err(BackendError::NotFound(format!("named range `{name}`")));
        }
        Ok(())
    }

    async fn append_rows(&self, table: &str, rows: &[PluRow]) -> Result<RowRange, BackendError> {
        let mut state = self.state.write().await;
        state.enter("append_rows")?;
        if rows.is_empty() {
            return Err(BackendError::InvalidArgument("nothing to append".to_string()));
        }
        let table = state.table_mut(table)?;
        let first = table.last_used_row() + 1;
        for (row_number, row) in (first..).zip(rows) {
            table.rows.insert(row_number, row.clone());
        }
        Ok(RowRange::rows(first, first + rows.len() as u32 - 1))
    }

    async fn insert_rows(
        &self,
        table: &str,
        before_row: u32,
        count: u32,
    ) -> Result<(), BackendError> {
        let mut state = self.state.write().await;
        state.enter("insert_rows")?;
        if before_row == 0 || count == 0 {
            return Err(BackendError::InvalidArgument(format!(
                "cannot insert {count} rows before row {before_row}"
            )));
        }
        let table = state.table_mut(table)?;

        let moved = table.rows.split_off(&before_row);
        table.rows.extend(moved.into_iter().map(|(row, cells)| (row + count, cells)));

        for named in &mut table.named_ranges {
            let range = &mut named.range;
            if range.first >= before_row {
                range.first += count;
                range.last = range.last.map(|last| last + count);
            } else if let Some(last) = range.last.as_mut() {
                if before_row <= *last {
                    *last += count;
                }
            }
        }
        Ok(())
    }

    async fn delete_rows(&self, table: &str, rows: &[u32]) -> Result<(), BackendError> {
        let mut state = self.state.write().await;
        state.enter("delete_rows")?;
        let table = state.table_mut(table)?;

        let mut rows = rows.iter().copied().filter(|row| *row > 0).collect::<Vec<_>>();
        rows.sort_unstable_by(|a, b| b.cmp(a));
        rows.dedup();

        for deleted in rows {
            table.rows.remove(&deleted);
            let moved = table.rows.split_off(&deleted);
            table.rows.extend(moved.into_iter().map(|(row, cells)| (row - 1, cells)));

            table.named_ranges.retain(|named| named.range != RowRange::single(deleted));
            for named in &mut table.named_ranges {
                let range = &mut named.range;
                if range.first > deleted {
                    range.first -= 1;
                    range.last = range.last.map(|last| last - 1);
                } else if let Some(last) = range.last.as_mut() {
                    if deleted <= *last {
                        *last -= 1;
                    }
                }
            }
        }
        Ok(())
    }

    async fn format_rack_block(
        &self,
        table: &str,
        header_row: u32,
        data_rows: u32,
    ) -> Result<(), BackendError> {
        let mut state = self.state.write().await;
        state.enter("format_rack_block")?;
        if header_row == 0 {
            return Err(BackendError::InvalidArgument("rows are numbered from 1".to_string()));
        }
        let table = state.table_mut(table)?;
        table.formatted.push(RowRange::rows(header_row, header_row + data_rows));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::InMemoryTableBackend;
    use crate::backend::{BackendError, PluRow, TableBackend};
    use crate::range::RowRange;

    async fn backend_with_table() -> InMemoryTableBackend {
        let backend = InMemoryTableBackend::new();
        backend.create_table("AB12").await.expect("create table");
        backend
    }

    #[tokio::test]
    async fn create_and_delete_tables_report_conflicts() {
        let backend = backend_with_table().await;
        assert!(matches!(backend.create_table("AB12").await, Err(BackendError::Conflict(_))));
        backend.delete_table("AB12").await.expect("delete");
        assert!(matches!(backend.delete_table("AB12").await, Err(BackendError::NotFound(_))));
        assert!(backend.list_tables().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn append_lands_below_the_last_used_row() {
        let backend = backend_with_table().await;
        backend
            .write_cells("AB12", &RowRange::single(4), &[PluRow::new("X", "", "")])
            .await
            .expect("write");
        let landed = backend
            .append_rows("AB12", &[PluRow::new("A", "", ""), PluRow::new("B", "", "")])
            .await
            .expect("append");
        assert_eq!(landed, RowRange::rows(5, 6));

        let open = backend.read_cells("AB12", &RowRange::open(1)).await.expect("read");
        assert_eq!(open.len(), 6);
        assert_eq!(open[5].plu, "B");
    }

    #[tokio::test]
    async fn insert_rows_shifts_cells_and_named_ranges() {
        let backend = backend_with_table().await;
        backend.add_named_range("AB12", "Rak_Satu", &RowRange::rows(2, 4)).await.expect("add");
        backend.add_named_range("AB12", "Rak_Dua", &RowRange::rows(9, 9)).await.expect("add");
        backend
            .write_cells("AB12", &RowRange::single(9), &[PluRow::new("B2", "", "")])
            .await
            .expect("write");

        backend.insert_rows("AB12", 5, 2).await.expect("insert after first rack");
        backend.insert_rows("AB12", 3, 1).await.expect("insert inside first rack");

        let ranges = backend.list_named_ranges("AB12").await.expect("list");
        assert_eq!(ranges[0].range, RowRange::rows(2, 5));
        assert_eq!(ranges[1].range, RowRange::rows(12, 12));
        let moved = backend.read_cells("AB12", &RowRange::single(12)).await.expect("read");
        assert_eq!(moved[0].plu, "B2");
    }

    #[tokio::test]
    async fn delete_rows_renumbers_below() {
        let backend = backend_with_table().await;
        let rows = ["A", "B", "C", "D"].map(|code| PluRow::new(code, "", ""));
        backend.write_cells("AB12", &RowRange::rows(1, 4), &rows).await.expect("write");
        backend.add_named_range("AB12", "Rak", &RowRange::rows(3, 4)).await.expect("add");

        backend.delete_rows("AB12", &[2, 1]).await.expect("delete");

        let left = backend.read_cells("AB12", &RowRange::open(1)).await.expect("read");
        assert_eq!(left.iter().map(|row| row.plu.as_str()).collect::<Vec<_>>(), vec!["C", "D"]);
        let ranges = backend.list_named_ranges("AB12").await.expect("list");
        assert_eq!(ranges[0].range, RowRange::rows(1, 2));
    }

    #[tokio::test]
    async fn named_range_names_must_be_identifier_safe() {
        let backend = backend_with_table().await;
        for name in ["Rak Satu", "A1", "1Rak", ""] {
            assert!(matches!(
                backend.add_named_range("AB12", name, &RowRange::single(2)).await,
                Err(BackendError::InvalidArgument(_))
            ));
        }
        backend.add_named_range("AB12", "Rak_1", &RowRange::single(2)).await.expect("valid");
        assert!(matches!(
            backend.add_named_range("AB12", "Rak_1", &RowRange::single(5)).await,
            Err(BackendError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn named_range_names_are_unique_across_tables() {
        let backend = backend_with_table().await;
        backend.create_table("CD34").await.expect("create second table");
        backend.add_named_range("AB12", "Rak_1", &RowRange::single(2)).await.expect("add");

        assert!(matches!(
            backend.add_named_range("CD34", "Rak_1", &RowRange::single(2)).await,
            Err(BackendError::Conflict(_))
        ));
        assert!(backend.list_named_ranges("CD34").await.expect("list").is_empty());

        backend.delete_table("AB12").await.expect("delete first table");
        backend.add_named_range("CD34", "Rak_1", &RowRange::single(2)).await.expect("name freed");
    }

    #[tokio::test]
    async fn injected_faults_fire_then_clear() {
        let backend = backend_with_table().await;
        backend.fail_times("list_tables", 2, BackendError::Transient("503".to_string())).await;

        assert!(backend.list_tables().await.is_err());
        assert!(backend.list_tables().await.is_err());
        assert_eq!(backend.list_tables().await.expect("recovered"), vec!["AB12".to_string()]);
        assert_eq!(backend.mutation_count().await, 1);
    }
}
