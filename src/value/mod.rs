//! the structured value used for metadata and dht/extension messages. It mirrors the four
//! bencode types plus an `Undefined` state for a slot that was created but never assigned.

mod bencode;
mod print;
mod verify;

use std::collections::BTreeMap;
use std::fmt;

pub use self::errors::{MessageError, WrongVariant};
pub use verify::{verify_message, KeyDesc};

pub type Dictionary = BTreeMap<Vec<u8>, Value>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Value {
    Integer(i64),
    ByteString(Vec<u8>),
    List(Vec<Value>),
    Dictionary(Dictionary),
    #[default]
    Undefined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Integer,
    ByteString,
    List,
    Dictionary,
    Undefined,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Integer => "integer",
            ValueKind::ByteString => "byte string",
            ValueKind::List => "list",
            ValueKind::Dictionary => "dictionary",
            ValueKind::Undefined => "undefined",
        };
        f.write_str(name)
    }
}

impl Value {
    /// empty value of the given kind (zero, empty string, empty list or dictionary).
    pub fn new(kind: ValueKind) -> Self {
        match kind {
            ValueKind::Integer => Value::Integer(0),
            ValueKind::ByteString => Value::ByteString(Vec::new()),
            ValueKind::List => Value::List(Vec::new()),
            ValueKind::Dictionary => Value::Dictionary(Dictionary::new()),
            ValueKind::Undefined => Value::Undefined,
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Integer(_) => ValueKind::Integer,
            Value::ByteString(_) => ValueKind::ByteString,
            Value::List(_) => ValueKind::List,
            Value::Dictionary(_) => ValueKind::Dictionary,
            Value::Undefined => ValueKind::Undefined,
        }
    }

    fn wrong(&self, expected: ValueKind) -> WrongVariant {
        WrongVariant {
            expected,
            found: self.kind(),
        }
    }

    pub fn integer(&self) -> Result<i64, WrongVariant> {
        match self {
            Value::Integer(i) => Ok(*i),
            other => Err(other.wrong(ValueKind::Integer)),
        }
    }

    pub fn integer_mut(&mut self) -> Result<&mut i64, WrongVariant> {
        match self {
            Value::Integer(i) => Ok(i),
            other => Err(other.wrong(ValueKind::Integer)),
        }
    }

    pub fn string(&self) -> Result<&[u8], WrongVariant> {
        match self {
            Value::ByteString(s) => Ok(s),
            other => Err(other.wrong(ValueKind::ByteString)),
        }
    }

    pub fn string_mut(&mut self) -> Result<&mut Vec<u8>, WrongVariant> {
        match self {
            Value::ByteString(s) => Ok(s),
            other => Err(other.wrong(ValueKind::ByteString)),
        }
    }

    pub fn list(&self) -> Result<&[Value], WrongVariant> {
        match self {
            Value::List(l) => Ok(l),
            other => Err(other.wrong(ValueKind::List)),
        }
    }

    pub fn list_mut(&mut self) -> Result<&mut Vec<Value>, WrongVariant> {
        match self {
            Value::List(l) => Ok(l),
            other => Err(other.wrong(ValueKind::List)),
        }
    }

    pub fn dict(&self) -> Result<&Dictionary, WrongVariant> {
        match self {
            Value::Dictionary(d) => Ok(d),
            other => Err(other.wrong(ValueKind::Dictionary)),
        }
    }

    pub fn dict_mut(&mut self) -> Result<&mut Dictionary, WrongVariant> {
        match self {
            Value::Dictionary(d) => Ok(d),
            other => Err(other.wrong(ValueKind::Dictionary)),
        }
    }

    /// looks up `key` in a dictionary value.
    pub fn get(&self, key: impl AsRef<[u8]>) -> Result<Option<&Value>, WrongVariant> {
        Ok(self.dict()?.get(key.as_ref()))
    }

    /// mutable slot for `key`, inserting `Undefined` when missing. An undefined value is turned
    /// into an empty dictionary first, so nested messages can be built with
    /// `msg.entry("a")?.entry("id")?`.
    pub fn entry(&mut self, key: impl AsRef<[u8]>) -> Result<&mut Value, WrongVariant> {
        if let Value::Undefined = self {
            *self = Value::new(ValueKind::Dictionary);
        }

        Ok(self
            .dict_mut()?
            .entry(key.as_ref().to_vec())
            .or_default())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::ByteString(value.as_bytes().to_vec())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::ByteString(value.into_bytes())
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Value::ByteString(value.to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::ByteString(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl From<Dictionary> for Value {
    fn from(value: Dictionary) -> Self {
        Value::Dictionary(value)
    }
}

mod errors {
    use thiserror::Error;

    use super::ValueKind;

    #[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
    #[error("expected {expected} value, found {found}")]
    pub struct WrongVariant {
        pub expected: ValueKind,
        pub found: ValueKind,
    }

    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum MessageError {
        #[error("message is not a dictionary")]
        NotADictionary,
        #[error("missing '{0}' key")]
        MissingKey(&'static str),
        #[error("invalid type for '{key}', expected {expected}, found {found}")]
        WrongType {
            key: &'static str,
            expected: ValueKind,
            found: ValueKind,
        },
        #[error("invalid size for '{key}', expected {expected} bytes, found {found}")]
        WrongSize {
            key: &'static str,
            expected: usize,
            found: usize,
        },
    }
}
