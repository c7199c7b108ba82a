use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

pub const STORE_CODE_LEN: usize = 4;

/// A store code doubles as the name of the store's table.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StoreCode(String);

impl StoreCode {
    /// Trims and upper-cases `input`, then requires exactly four ASCII letters or digits.
    pub fn parse(input: &str) -> Result<Self, DomainError> {
        let code = input.trim().to_ascii_uppercase();
        if is_store_code(&code) {
            Ok(Self(code))
        } else {
            Err(DomainError::InvalidStoreCode(input.trim().to_owned()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StoreCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// True for table names that follow the store naming convention.
pub fn is_store_code(name: &str) -> bool {
    name.len() == STORE_CODE_LEN
        && name.bytes().all(|byte| byte.is_ascii_digit() || byte.is_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::{is_store_code, StoreCode};
    use crate::errors::DomainError;

    #[test]
    fn parse_normalizes_case_and_whitespace() {
        let code = StoreCode::parse("  ab12 ").expect("valid code");
        assert_eq!(code.as_str(), "AB12");
    }

    #[test]
    fn parse_rejects_wrong_length_and_symbols() {
        for input in ["AB", "ABCDE", "AB-1", "", "A B1", "ÄB12"] {
            let error = StoreCode::parse(input).expect_err("must reject");
            assert!(matches!(error, DomainError::InvalidStoreCode(_)), "{input}");
        }
    }

    #[test]
    fn naming_convention_filters_foreign_tables() {
        assert!(is_store_code("T001"));
        assert!(!is_store_code("produk"));
        assert!(!is_store_code("ab12"));
        assert!(!is_store_code("Sheet1"));
    }
}
