//! Button payload codec.
//!
//! A payload is `v1|<action>|<store>|<rack>` where the rack is stored in its encoded form.
//! `%` and `|` inside a field are escaped as `%25` and `%7C`, so names can never split a
//! payload into extra fields.

use thiserror::Error;

use crate::domain::{RackName, StoreCode};
use crate::flows::states::OperationKind;

pub const CALLBACK_VERSION: &str = "v1";
/// Telegram rejects `callback_data` longer than 64 bytes.
pub const MAX_CALLBACK_BYTES: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallbackAction {
    /// Main menu entry.
    Start(OperationKind),
    PickStore(OperationKind),
    PickRack(OperationKind),
    Confirm(OperationKind),
    Decline,
    Cancel,
}

impl CallbackAction {
    fn token(self) -> String {
        match self {
            Self::Start(kind) => format!("go.{}", kind.code()),
            Self::PickStore(kind) => format!("st.{}", kind.code()),
            Self::PickRack(kind) => format!("rk.{}", kind.code()),
            Self::Confirm(kind) => format!("ok.{}", kind.code()),
            Self::Decline => "no".to_owned(),
            Self::Cancel => "x".to_owned(),
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        match token {
            "no" => return Some(Self::Decline),
            "x" => return Some(Self::Cancel),
            _ => {}
        }
        let (prefix, code) = token.split_once('.')?;
        let kind = OperationKind::from_code(code)?;
        match prefix {
            "go" => Some(Self::Start(kind)),
            "st" => Some(Self::PickStore(kind)),
            "rk" => Some(Self::PickRack(kind)),
            "ok" => Some(Self::Confirm(kind)),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallbackData {
    pub action: CallbackAction,
    pub store: Option<StoreCode>,
    pub rack: Option<RackName>,
}

impl CallbackData {
    pub fn new(action: CallbackAction) -> Self {
        Self { action, store: None, rack: None }
    }

    pub fn with_store(mut self, store: StoreCode) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_rack(mut self, rack: RackName) -> Self {
        self.rack = Some(rack);
        self
    }

    pub fn encode(&self) -> Result<String, CallbackError> {
        let store = self.store.as_ref().map(|store| escape(store.as_str())).unwrap_or_default();
        let rack = self.rack.as_ref().map(|rack| escape(&rack.encoded())).unwrap_or_default();
        let payload = format!("{CALLBACK_VERSION}|{}|{store}|{rack}", self.action.token());
        if payload.len() > MAX_CALLBACK_BYTES {
            return Err(CallbackError::TooLong(payload.len()));
        }
        Ok(payload)
    }

    pub fn decode(payload: &str) -> Result<Self, CallbackError> {
        if payload.len() > MAX_CALLBACK_BYTES {
            return Err(CallbackError::TooLong(payload.len()));
        }
        let fields = payload.split('|').collect::<Vec<_>>();
        let [version, action, store, rack] = fields.as_slice() else {
            return Err(CallbackError::Malformed(payload.to_owned()));
        };
        if *version != CALLBACK_VERSION {
            return Err(CallbackError::UnsupportedVersion((*version).to_owned()));
        }
        let action = CallbackAction::from_token(action)
            .ok_or_else(|| CallbackError::UnknownAction((*action).to_owned()))?;

        let store = match unescape(store)? {
            value if value.is_empty() => None,
            value => Some(parse_store(&value)?),
        };
        let rack = match unescape(rack)? {
            value if value.is_empty() => None,
            value => Some(
                RackName::from_encoded(&value).map_err(|_| CallbackError::InvalidField(value))?,
            ),
        };

        let data = Self { action, store, rack };
        data.check_required_fields()?;
        Ok(data)
    }

    fn check_required_fields(&self) -> Result<(), CallbackError> {
        let missing = match self.action {
            CallbackAction::PickStore(_) => self.store.is_none(),
            CallbackAction::PickRack(_) => self.store.is_none() || self.rack.is_none(),
            _ => false,
        };
        if missing {
            return Err(CallbackError::MissingField(self.action.token()));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CallbackError {
    #[error("callback payload is {0} bytes, above the 64 byte limit")]
    TooLong(usize),
    #[error("malformed callback payload `{0}`")]
    Malformed(String),
    #[error("unsupported callback version `{0}`")]
    UnsupportedVersion(String),
    #[error("unknown callback action `{0}`")]
    UnknownAction(String),
    #[error("callback field `{0}` is not valid")]
    InvalidField(String),
    #[error("callback action `{0}` is missing a required field")]
    MissingField(String),
}

fn parse_store(value: &str) -> Result<StoreCode, CallbackError> {
    match StoreCode::parse(value) {
        Ok(store) if store.as_str() == value => Ok(store),
        _ => Err(CallbackError::InvalidField(value.to_owned())),
    }
}

fn escape(field: &str) -> String {
    field.replace('%', "%25").replace('|', "%7C")
}

fn unescape(field: &str) -> Result<String, CallbackError> {
    let mut out = String::with_capacity(field.len());
    let mut rest = field;
    while let Some(index) = rest.find('%') {
        out.push_str(&rest[..index]);
        let escape = rest.get(index..index + 3);
        match escape {
            Some("%25") => out.push('%'),
            Some("%7C") | Some("%7c") => out.push('|'),
            _ => return Err(CallbackError::InvalidField(field.to_owned())),
        }
        rest = &rest[index + 3..];
    }
    out.push_str(rest);
    Ok(out)
}
