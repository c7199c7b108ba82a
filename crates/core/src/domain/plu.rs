use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

pub const MAX_PLU_LEN: usize = 32;

/// Item code keyed within a rack. Stored upper-cased.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PluCode(String);

impl PluCode {
    pub fn parse(input: &str) -> Result<Self, DomainError> {
        let code = input.trim().to_ascii_uppercase();
        let valid = !code.is_empty()
            && code.len() <= MAX_PLU_LEN
            && code.bytes().all(|byte| byte.is_ascii_alphanumeric() || byte == b'-');
        if valid {
            Ok(Self(code))
        } else {
            Err(DomainError::InvalidPluCode(input.trim().to_owned()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PluCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
