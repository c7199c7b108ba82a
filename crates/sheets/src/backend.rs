use async_trait::async_trait;
use thiserror::Error;

use crate::range::{RowRange, COLUMN_COUNT};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("transient backend failure: {0}")]
    Transient(String),
    #[error("backend rejected credentials: {0}")]
    Unauthorized(String),
    #[error("backend failure: {0}")]
    Fatal(String),
}

impl BackendError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// One row of a rack: the PLU code plus the two looked-up columns.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PluRow {
    pub plu: String,
    pub name: String,
    pub barcode: String,
}

impl PluRow {
    pub fn new(plu: impl Into<String>, name: impl Into<String>, barcode: impl Into<String>) -> Self {
        Self { plu: plu.into(), name: name.into(), barcode: barcode.into() }
    }

    /// Builds a row from raw cells. Missing trailing cells are empty, extra cells are an error.
    pub fn from_cells(cells: Vec<String>) -> Result<Self, BackendError> {
        if cells.len() > COLUMN_COUNT {
            return Err(BackendError::InvalidArgument(format!(
                "expected at most {COLUMN_COUNT} cells per row, got {}",
                cells.len()
            )));
        }
        let mut cells = cells.into_iter();
        Ok(Self {
            plu: cells.next().unwrap_or_default(),
            name: cells.next().unwrap_or_default(),
            barcode: cells.next().unwrap_or_default(),
        })
    }

    pub fn to_cells(&self) -> Vec<String> {
        vec![self.plu.clone(), self.name.clone(), self.barcode.clone()]
    }

    pub fn is_blank(&self) -> bool {
        self.plu.trim().is_empty() && self.name.trim().is_empty() && self.barcode.trim().is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamedRange {
    pub name: String,
    pub range: RowRange,
}

/// Raw table operations. Implementations know nothing about stores, racks or PLUs and never
/// retry on their own.
#[async_trait]
pub trait TableBackend: Send + Sync {
    async fn list_tables(&self) -> Result<Vec<String>, BackendError>;

    async fn create_table(&self, name: &str) -> Result<(), BackendError>;

    async fn delete_table(&self, name: &str) -> Result<(), BackendError>;

    /// Closed ranges return exactly one row per covered row; open ranges stop at the last
    /// non-empty row.
    async fn read_cells(&self, table: &str, range: &RowRange)
        -> Result<Vec<PluRow>, BackendError>;

    /// `range` must be closed and cover exactly `rows.len()` rows. Cells starting with `=`
    /// are stored as formulas.
    async fn write_cells(
        &self,
        table: &str,
        range: &RowRange,
        rows: &[PluRow],
    ) -> Result<(), BackendError>;

    async fn clear_cells(&self, table: &str, range: &RowRange) -> Result<(), BackendError>;

    async fn list_named_ranges(&self, table: &str) -> Result<Vec<NamedRange>, BackendError>;

    async fn add_named_range(
        &self,
        table: &str,
        name: &str,
        range: &RowRange,
    ) -> Result<(), BackendError>;

    async fn update_named_range(
        &self,
        table: &str,
        name: &str,
        range: &RowRange,
    ) -> Result<(), BackendError>;

    async fn delete_named_range(&self, table: &str, name: &str) -> Result<(), BackendError>;

    /// Writes `rows` below the last non-empty row and returns where they landed.
    async fn append_rows(&self, table: &str, rows: &[PluRow]) -> Result<RowRange, BackendError>;

    /// Inserts `count` blank rows before `before_row`. Named ranges below move down; a range
    /// that strictly contains the insertion point grows.
    async fn insert_rows(&self, table: &str, before_row: u32, count: u32)
        -> Result<(), BackendError>;

    /// Removes rows and renumbers everything below them. Stored row numbers are stale after
    /// this call.
    async fn delete_rows(&self, table: &str, rows: &[u32]) -> Result<(), BackendError>;

    /// Styles a new rack block: the header at `header_row` and the `data_rows` rows below it.
    /// Cell values are untouched.
    async fn format_rack_block(
        &self,
        table: &str,
        header_row: u32,
        data_rows: u32,
    ) -> Result<(), BackendError>;
}

pub(crate) fn check_write_shape(range: &RowRange, rows: &[PluRow]) -> Result<(), BackendError> {
    match range.len() {
        Some(len) if len as usize == rows.len() => Ok(()),
        Some(len) => Err(BackendError::InvalidArgument(format!(
            "range {range} covers {len} rows but {} rows were given",
            rows.len()
        ))),
        None => Err(BackendError::InvalidArgument(format!(
            "cannot write to open-ended range {range}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::{check_write_shape, BackendError, PluRow};
    use crate::range::RowRange;

    #[test]
    fn short_rows_are_padded_and_wide_rows_rejected() {
        let row = PluRow::from_cells(vec!["A1".to_string()]).expect("short row");
        assert_eq!(row, PluRow::new("A1", "", ""));

        let wide = PluRow::from_cells(vec!["a".into(), "b".into(), "c".into(), "d".into()]);
        assert!(matches!(wide, Err(BackendError::InvalidArgument(_))));
    }

    #[test]
    fn write_shape_must_match_the_range() {
        let rows = vec![PluRow::default(), PluRow::default()];
        assert!(check_write_shape(&RowRange::rows(4, 5), &rows).is_ok());
        assert!(check_write_shape(&RowRange::rows(4, 6), &rows).is_err());
        assert!(check_write_shape(&RowRange::open(4), &rows).is_err());
    }
}
