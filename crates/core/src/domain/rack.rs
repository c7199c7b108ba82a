use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::store::StoreCode;
use crate::errors::DomainError;

/// Replaces spaces in the stored (named-range) form of a rack name.
pub const RACK_NAME_SEPARATOR: char = '_';
pub const MAX_RACK_NAME_LEN: usize = 48;

/// Human-readable rack name.
///
/// Valid names are ASCII letters, digits and single spaces, start with a letter and never
/// contain the separator, so [`encode_rack_name`] and [`decode_rack_name`] are inverse of
/// each other for every value of this type.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RackName(String);

impl RackName {
    pub fn parse(input: &str) -> Result<Self, DomainError> {
        let name = input.split_whitespace().collect::<Vec<_>>().join(" ");
        let reject = |reason: &'static str| DomainError::InvalidRackName {
            name: input.trim().to_owned(),
            reason,
        };

        if name.is_empty() {
            return Err(reject("name is empty"));
        }
        if name.len() > MAX_RACK_NAME_LEN {
            return Err(reject("name is longer than 48 characters"));
        }
        if !name.starts_with(|ch: char| ch.is_ascii_alphabetic()) {
            return Err(reject("name must start with a letter"));
        }
        if !name.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == ' ') {
            return Err(reject("only letters, digits and spaces are allowed"));
        }
        if looks_like_cell_reference(&name) {
            return Err(reject("name reads like a cell address; add a space, e.g. `RAK 1`"));
        }
        if name.eq_ignore_ascii_case("true") || name.eq_ignore_ascii_case("false") {
            return Err(reject("name is reserved"));
        }

        Ok(Self(name))
    }

    /// Parses the stored form produced by [`RackName::encoded`].
    pub fn from_encoded(encoded: &str) -> Result<Self, DomainError> {
        let decoded = decode_rack_name(encoded);
        let name = Self::parse(&decoded)?;
        if name.0 != decoded {
            return Err(DomainError::InvalidRackName {
                name: encoded.to_owned(),
                reason: "stored name is not in canonical form",
            });
        }
        Ok(name)
    }

    pub fn encoded(&self) -> String {
        encode_rack_name(&self.0)
    }

    /// Named-range name of this rack in `store`, e.g. `Rak_Satu_AB12`.
    ///
    /// Named ranges share one namespace across the whole spreadsheet, so the store code is
    /// appended. The rack part comes first because range names may not start with a digit.
    pub fn range_name(&self, store: &StoreCode) -> String {
        format!("{}{RACK_NAME_SEPARATOR}{store}", self.encoded())
    }

    /// Reads a named-range name found on `store`'s table. Names without the store suffix are
    /// bare encoded names written by older layouts and decode as they are.
    pub fn from_range_name(store: &StoreCode, name: &str) -> Result<Self, DomainError> {
        let suffix = format!("{RACK_NAME_SEPARATOR}{store}");
        match name.strip_suffix(suffix.as_str()) {
            Some(encoded) => Self::from_encoded(encoded),
            None => Self::from_encoded(name),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RackName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn encode_rack_name(name: &str) -> String {
    name.replace(' ', &RACK_NAME_SEPARATOR.to_string())
}

pub fn decode_rack_name(encoded: &str) -> String {
    encoded.replace(RACK_NAME_SEPARATOR, " ")
}

/// Spreadsheet named ranges may not look like `A1` or `R1C1` addresses.
pub fn looks_like_cell_reference(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    let letters = upper.bytes().take_while(u8::is_ascii_alphabetic).count();
    let rest = &upper[letters..];
    let a1_style = (1..=3).contains(&letters)
        && !rest.is_empty()
        && rest.bytes().all(|byte| byte.is_ascii_digit());

    let r1c1_style = upper
        .strip_prefix('R')
        .and_then(|tail| {
            let digits = tail.bytes().take_while(u8::is_ascii_digit).count();
            tail[digits..].strip_prefix('C').map(|col| (digits, col))
        })
        .is_some_and(|(row_digits, col)| {
            row_digits > 0 && !col.is_empty() && col.bytes().all(|byte| byte.is_ascii_digit())
        });

    a1_style || r1c1_style
}

#[cfg(test)]
mod tests {
    use super::{decode_rack_name, encode_rack_name, looks_like_cell_reference, RackName};
    use crate::domain::store::StoreCode;

    #[test]
    fn encode_then_decode_round_trips_for_valid_names() {
        for input in ["Rak Satu", "A", "Rak 1", "Gondola Depan Kiri 2", "Z9 Z9"] {
            let name = RackName::parse(input).expect("valid name");
            let encoded = name.encoded();
            assert!(!encoded.contains(' '));
            assert_eq!(decode_rack_name(&encoded), name.as_str());
            assert_eq!(RackName::from_encoded(&encoded).expect("decodes"), name);
        }
    }

    #[test]
    fn encoding_replaces_each_space() {
        assert_eq!(encode_rack_name("Rak Satu Dua"), "Rak_Satu_Dua");
        assert_eq!(decode_rack_name("Rak_Satu_Dua"), "Rak Satu Dua");
    }

    #[test]
    fn parse_collapses_inner_whitespace() {
        let name = RackName::parse("  Rak   Satu ").expect("valid");
        assert_eq!(name.as_str(), "Rak Satu");
    }

    #[test]
    fn parse_rejects_separator_and_symbols() {
        for input in ["Rak_Satu", "Rak-1", "", "   ", "1Rak", "Rak/2"] {
            assert!(RackName::parse(input).is_err(), "{input:?} should be rejected");
        }
    }

    #[test]
    fn parse_rejects_cell_like_names() {
        assert!(RackName::parse("A1").is_err());
        assert!(RackName::parse("RAK1").is_err());
        assert!(RackName::parse("R1C2").is_err());
        assert!(RackName::parse("RAK 1").is_ok());
        assert!(RackName::parse("RAKS1").is_ok());
    }

    #[test]
    fn cell_reference_detection() {
        assert!(looks_like_cell_reference("b12"));
        assert!(looks_like_cell_reference("XFD1"));
        assert!(looks_like_cell_reference("r10c3"));
        assert!(!looks_like_cell_reference("Rak"));
        assert!(!looks_like_cell_reference("Rak_1"));
        assert!(!looks_like_cell_reference("ABCD1"));
    }

    #[test]
    fn from_encoded_rejects_non_canonical_stored_names() {
        assert!(RackName::from_encoded("Rak__Satu").is_err());
        assert!(RackName::from_encoded("_Rak").is_err());
    }

    #[test]
    fn range_names_carry_the_store_code() {
        let ab12 = StoreCode::parse("AB12").expect("store");
        let cd34 = StoreCode::parse("12CD").expect("store");
        let rack = RackName::parse("Rak Satu").expect("rack");

        assert_eq!(rack.range_name(&ab12), "Rak_Satu_AB12");
        assert_eq!(rack.range_name(&cd34), "Rak_Satu_12CD");
        assert_ne!(rack.range_name(&ab12), rack.range_name(&cd34));
        assert_eq!(RackName::from_range_name(&ab12, "Rak_Satu_AB12").expect("decodes"), rack);
        assert_eq!(RackName::from_range_name(&cd34, "Rak_Satu_12CD").expect("decodes"), rack);
    }

    #[test]
    fn bare_range_names_from_older_layouts_still_decode() {
        let ab12 = StoreCode::parse("AB12").expect("store");
        let rack = RackName::from_range_name(&ab12, "Rak_Satu").expect("legacy name");
        assert_eq!(rack.as_str(), "Rak Satu");
        assert!(RackName::from_range_name(&ab12, "Rak__AB12").is_err());
        assert!(RackName::from_range_name(&ab12, "_AB12").is_err());
    }
}
