//! Row ranges over the fixed three-column (`A:C`) layout.

use std::fmt;

use crate::backend::BackendError;

pub const FIRST_COLUMN: &str = "A";
pub const LAST_COLUMN: &str = "C";
pub const COLUMN_COUNT: usize = 3;

/// Inclusive, 1-based row span. `last == None` is an open-ended range (`A5:C`) that runs to
/// the bottom of the table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RowRange {
    pub first: u32,
    pub last: Option<u32>,
}

impl RowRange {
    pub fn rows(first: u32, last: u32) -> Self {
        Self { first, last: Some(last.max(first)) }
    }

    pub fn single(row: u32) -> Self {
        Self { first: row, last: Some(row) }
    }

    pub fn open(first: u32) -> Self {
        Self { first, last: None }
    }

    pub fn is_open(&self) -> bool {
        self.last.is_none()
    }

    pub fn contains(&self, row: u32) -> bool {
        row >= self.first && self.last.map_or(true, |last| row <= last)
    }

    /// Row count of a closed range.
    pub fn len(&self) -> Option<u32> {
        self.last.map(|last| last + 1 - self.first)
    }

    /// Cell part of an A1 reference, e.g. `A5:C9`.
    pub fn a1(&self) -> String {
        match self.last {
            Some(last) => format!("{FIRST_COLUMN}{}:{LAST_COLUMN}{last}", self.first),
            None => format!("{FIRST_COLUMN}{}:{LAST_COLUMN}", self.first),
        }
    }

    /// Full A1 reference including the quoted table name.
    pub fn to_a1(&self, table: &str) -> String {
        format!("{}!{}", quote_table_name(table), self.a1())
    }

    /// Parses `A5:C9`, `A5:A`, `A5` or any of those prefixed with a table name. Columns are
    /// ignored; only the row span is kept.
    pub fn parse_a1(input: &str) -> Result<(Option<String>, Self), BackendError> {
        let invalid = || BackendError::InvalidArgument(format!("not an A1 row range: `{input}`"));

        let (table, cells) = match input.rsplit_once('!') {
            Some((table, cells)) => (Some(unquote_table_name(table)), cells),
            None => (None, input),
        };

        let (start, end) = match cells.split_once(':') {
            Some((start, end)) => (start, Some(end)),
            None => (cells, None),
        };

        let first = row_of(start).flatten().ok_or_else(invalid)?;
        let last = match end {
            Some(end) => row_of(end).ok_or_else(invalid)?,
            None => Some(first),
        };
        if last.is_some_and(|last| last < first) {
            return Err(invalid());
        }

        Ok((table, Self { first, last }))
    }
}

impl fmt::Display for RowRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.a1())
    }
}

/// `Some(None)` for a bare column such as `C`, `Some(Some(row))` for a cell such as `C9`.
fn row_of(cell: &str) -> Option<Option<u32>> {
    let cell = cell.trim().trim_start_matches('$');
    let letters = cell.bytes().take_while(u8::is_ascii_alphabetic).count();
    if letters == 0 {
        return None;
    }
    let digits = cell[letters..].trim_start_matches('$');
    if digits.is_empty() {
        return Some(None);
    }
    match digits.parse::<u32>() {
        Ok(row) if row > 0 => Some(Some(row)),
        _ => None,
    }
}

/// Table names are always quoted so names with spaces or digits stay unambiguous.
pub fn quote_table_name(table: &str) -> String {
    format!("'{}'", table.replace('\'', "''"))
}

fn unquote_table_name(table: &str) -> String {
    table
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
        .map(|inner| inner.replace("''", "'"))
        .unwrap_or_else(|| table.to_string())
}

#[cfg(test)]
mod tests {
    use super::{quote_table_name, RowRange};

    #[test]
    fn closed_and_open_ranges_render_as_a1() {
        assert_eq!(RowRange::rows(5, 9).to_a1("AB12"), "'AB12'!A5:C9");
        assert_eq!(RowRange::open(5).a1(), "A5:C");
        assert_eq!(RowRange::single(3).len(), Some(1));
        assert_eq!(RowRange::open(3).len(), None);
    }

    #[test]
    fn parse_accepts_api_responses_and_legacy_ranges() {
        let (table, range) = RowRange::parse_a1("'AB12'!A10:C12").expect("parses");
        assert_eq!(table.as_deref(), Some("AB12"));
        assert_eq!(range, RowRange::rows(10, 12));

        let (table, range) = RowRange::parse_a1("AB12!A5:A").expect("parses");
        assert_eq!(table.as_deref(), Some("AB12"));
        assert_eq!(range, RowRange::open(5));

        let (_, range) = RowRange::parse_a1("$A$7").expect("parses");
        assert_eq!(range, RowRange::single(7));
    }

    #[test]
    fn parse_rejects_garbage() {
        for input in ["", "A0:C2", "5:9", "A9:C5", "!!"] {
            assert!(RowRange::parse_a1(input).is_err(), "{input:?} should be rejected");
        }
    }

    #[test]
    fn quotes_inside_table_names_are_doubled() {
        assert_eq!(quote_table_name("Bob's"), "'Bob''s'");
        let (table, _) = RowRange::parse_a1("'Bob''s'!A1:C1").expect("parses");
        assert_eq!(table.as_deref(), Some("Bob's"));
    }

    #[test]
    fn contains_respects_open_ends() {
        assert!(RowRange::open(4).contains(1_000));
        assert!(!RowRange::rows(4, 6).contains(7));
        assert!(!RowRange::rows(4, 6).contains(3));
    }
}
