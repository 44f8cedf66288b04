use serde::{Deserialize, Serialize};

/// A value stored in a session.
///
/// Sessions hold a mapping from string keys to values of this type, so the data stored in a
/// session always has a checkable shape.
/// Arbitrary serializable types can be stored as [`SessionValue::Json`] via
/// [`Session::set_serialized`](crate::Session::set_serialized).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SessionValue {
    /// A string.
    Text(String),
    /// A signed integer.
    Integer(i64),
    /// A floating point number.
    Float(f64),
    /// A boolean.
    Boolean(bool),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// Any JSON value, used for serialized structured data.
    Json(serde_json::Value),
}

impl SessionValue {
    /// Returns the string if this is a [`SessionValue::Text`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Returns the integer if this is a [`SessionValue::Integer`].
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(integer) => Some(*integer),
            _ => None,
        }
    }

    /// Returns the number if this is a [`SessionValue::Float`] or a [`SessionValue::Integer`].
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(float) => Some(*float),
            Self::Integer(integer) => Some(*integer as f64),
            _ => None,
        }
    }

    /// Returns the boolean if this is a [`SessionValue::Boolean`].
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(boolean) => Some(*boolean),
            _ => None,
        }
    }

    /// Returns the bytes if this is a [`SessionValue::Bytes`].
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Converts this value into its JSON representation.
    /// Bytes become an array of numbers.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Text(text) => serde_json::Value::from(text.as_str()),
            Self::Integer(integer) => serde_json::Value::from(*integer),
            Self::Float(float) => serde_json::Value::from(*float),
            Self::Boolean(boolean) => serde_json::Value::from(*boolean),
            Self::Bytes(bytes) => serde_json::Value::from(bytes.as_slice()),
            Self::Json(value) => value.clone(),
        }
    }
}

impl From<String> for SessionValue {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for SessionValue {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<i64> for SessionValue {
    fn from(integer: i64) -> Self {
        Self::Integer(integer)
    }
}

impl From<i32> for SessionValue {
    fn from(integer: i32) -> Self {
        Self::Integer(integer.into())
    }
}

impl From<u32> for SessionValue {
    fn from(integer: u32) -> Self {
        Self::Integer(integer.into())
    }
}

impl From<f64> for SessionValue {
    fn from(float: f64) -> Self {
        Self::Float(float)
    }
}

impl From<bool> for SessionValue {
    fn from(boolean: bool) -> Self {
        Self::Boolean(boolean)
    }
}

impl From<Vec<u8>> for SessionValue {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<serde_json::Value> for SessionValue {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}
