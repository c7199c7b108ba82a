use std::fmt;

use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("store code must be exactly 4 letters or digits, got `{0}`")]
    InvalidStoreCode(String),
    #[error("invalid rack name `{name}`: {reason}")]
    InvalidRackName { name: String, reason: &'static str },
    #[error("invalid PLU `{0}`: use letters, digits or `-` (max 32)")]
    InvalidPluCode(String),
    #[error("the list is empty")]
    EmptyList,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityKind {
    Store,
    Rack,
    Plu,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Store => "store",
            Self::Rack => "rack",
            Self::Plu => "PLU",
        })
    }
}

/// Failures surfaced by the inventory repository. Transient backend errors are retried
/// before they get here and arrive as `Fatal` once retries are exhausted.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InventoryError {
    #[error(transparent)]
    InvalidInput(#[from] DomainError),
    #[error("{entity} `{name}` already exists")]
    AlreadyExists { entity: EntityKind, name: String },
    #[error("{entity} `{name}` was not found")]
    NotFound { entity: EntityKind, name: String },
    #[error("table backend failure: {0}")]
    Fatal(String),
}

impl InventoryError {
    pub fn already_exists(entity: EntityKind, name: impl Into<String>) -> Self {
        Self::AlreadyExists { entity, name: name.into() }
    }

    pub fn not_found(entity: EntityKind, name: impl Into<String>) -> Self {
        Self::NotFound { entity, name: name.into() }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }

    /// Text safe to show in chat. Fatal details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidInput(error) => capitalize(&error.to_string()),
            Self::AlreadyExists { entity, name } => {
                capitalize(&format!("{entity} '{name}' already exists."))
            }
            Self::NotFound { entity, name } => {
                capitalize(&format!("{entity} '{name}' was not found."))
            }
            Self::Fatal(_) => {
                "Sorry, something went wrong while talking to the spreadsheet. Please try again later."
                    .to_owned()
            }
        }
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{DomainError, EntityKind, InventoryError};

    #[test]
    fn domain_errors_map_to_invalid_input() {
        let error = InventoryError::from(DomainError::InvalidStoreCode("AB".to_owned()));
        assert!(matches!(error, InventoryError::InvalidInput(_)));
        assert!(error.user_message().starts_with("Store code must be exactly 4"));
    }

    #[test]
    fn collision_and_missing_messages_name_the_entity() {
        assert_eq!(
            InventoryError::already_exists(EntityKind::Store, "AB12").user_message(),
            "Store 'AB12' already exists."
        );
        assert_eq!(
            InventoryError::not_found(EntityKind::Rack, "Rak Satu").user_message(),
            "Rack 'Rak Satu' was not found."
        );
    }

    #[test]
    fn fatal_errors_hide_detail_from_users() {
        let error = InventoryError::Fatal("HTTP 500 from sheets.googleapis.com".to_owned());
        assert!(error.is_fatal());
        assert!(!error.user_message().contains("500"));
    }
}
