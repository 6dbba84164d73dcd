//! Session field values.
//!
//! This module provides the closed set of value kinds a session field can
//! hold:
//!
//! - [`SessionValue`] - A single field value
//! - [`ValueKind`] - The kind of a value, with its short type alias
//!
//! ## Kinds
//!
//! Common primitives (integers, floats, strings, booleans, bytes, timestamps
//! and the two array kinds) have dedicated variants and a short alias used
//! as their type tag in the backend. Anything else is carried as
//! [`SessionValue::Json`]: an arbitrary JSON document labelled with the
//! application's type name, so structured application state still
//! round-trips without the store knowing its shape.
//!
//! ```
//! use sessionbox_core::{SessionValue, ValueKind};
//!
//! let visits = SessionValue::from(3);
//! assert_eq!(visits.kind(), ValueKind::Int);
//! assert_eq!(visits.as_i32(), Some(3));
//!
//! let cart = SessionValue::json("Shop.Cart", serde_json::json!({"items": [1, 2]}));
//! assert_eq!(cart.kind(), ValueKind::Json);
//! ```

use chrono::{DateTime, Utc};
use smol_str::SmolStr;

/// A value stored in one session field.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionValue {
    /// 32-bit signed integer.
    Int(i32),
    /// 64-bit signed integer.
    Long(i64),
    /// Double precision float.
    Double(f64),
    /// Single precision float.
    Float(f32),
    /// Boolean flag.
    Bool(bool),
    /// Unsigned byte.
    Byte(u8),
    /// UTF-8 string.
    String(String),
    /// Array of 32-bit integers.
    IntArray(Vec<i32>),
    /// Array of strings.
    StringArray(Vec<String>),
    /// UTC timestamp.
    DateTime(DateTime<Utc>),
    /// Application-defined value carried as JSON.
    Json {
        /// Fully qualified application type name.
        type_name: SmolStr,
        /// The value itself.
        value: serde_json::Value,
    },
}

/// Kind of a [`SessionValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// See [`SessionValue::Int`].
    Int,
    /// See [`SessionValue::Long`].
    Long,
    /// See [`SessionValue::Double`].
    Double,
    /// See [`SessionValue::Float`].
    Float,
    /// See [`SessionValue::Bool`].
    Bool,
    /// See [`SessionValue::Byte`].
    Byte,
    /// See [`SessionValue::String`].
    String,
    /// See [`SessionValue::IntArray`].
    IntArray,
    /// See [`SessionValue::StringArray`].
    StringArray,
    /// See [`SessionValue::DateTime`].
    DateTime,
    /// See [`SessionValue::Json`].
    Json,
}

impl ValueKind {
    /// Kinds that have a short alias.
    pub const ALIASED: [ValueKind; 10] = [
        ValueKind::Int,
        ValueKind::String,
        ValueKind::Long,
        ValueKind::Double,
        ValueKind::Float,
        ValueKind::IntArray,
        ValueKind::StringArray,
        ValueKind::DateTime,
        ValueKind::Bool,
        ValueKind::Byte,
    ];

    /// Short alias written as the type tag, `None` for [`ValueKind::Json`].
    pub const fn alias(&self) -> Option<&'static str> {
        match self {
            Self::Int => Some("SysInt"),
            Self::String => Some("SysString"),
            Self::Long => Some("SysLong"),
            Self::Double => Some("SysDouble"),
            Self::Float => Some("SysFloat"),
            Self::IntArray => Some("SysIntArr"),
            Self::StringArray => Some("SysStringArr"),
            Self::DateTime => Some("SysDateTime"),
            Self::Bool => Some("SysBool"),
            Self::Byte => Some("SysByte"),
            Self::Json => None,
        }
    }

    /// Looks up the kind for a short alias.
    pub fn from_alias(alias: &str) -> Option<Self> {
        Self::ALIASED
            .iter()
            .copied()
            .find(|kind| kind.alias() == Some(alias))
    }
}

impl SessionValue {
    /// Creates an application-defined JSON value.
    pub fn json(type_name: impl Into<SmolStr>, value: serde_json::Value) -> Self {
        Self::Json {
            type_name: type_name.into(),
            value,
        }
    }

    /// Returns the kind of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Int(_) => ValueKind::Int,
            Self::Long(_) => ValueKind::Long,
            Self::Double(_) => ValueKind::Double,
            Self::Float(_) => ValueKind::Float,
            Self::Bool(_) => ValueKind::Bool,
            Self::Byte(_) => ValueKind::Byte,
            Self::String(_) => ValueKind::String,
            Self::IntArray(_) => ValueKind::IntArray,
            Self::StringArray(_) => ValueKind::StringArray,
            Self::DateTime(_) => ValueKind::DateTime,
            Self::Json { .. } => ValueKind::Json,
        }
    }

    /// Returns the integer if this is an [`SessionValue::Int`].
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the integer if this is an [`SessionValue::Int`] or [`SessionValue::Long`].
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(i64::from(*v)),
            Self::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the float if this is a [`SessionValue::Double`] or [`SessionValue::Float`].
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(v) => Some(*v),
            Self::Float(v) => Some(f64::from(*v)),
            _ => None,
        }
    }

    /// Returns the flag if this is a [`SessionValue::Bool`].
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the string slice if this is a [`SessionValue::String`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the JSON document if this is a [`SessionValue::Json`].
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json { value, .. } => Some(value),
            _ => None,
        }
    }
}

impl From<i32> for SessionValue {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<i64> for SessionValue {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<f64> for SessionValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<f32> for SessionValue {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for SessionValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<u8> for SessionValue {
    fn from(v: u8) -> Self {
        Self::Byte(v)
    }
}

impl From<&str> for SessionValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<String> for SessionValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Vec<i32>> for SessionValue {
    fn from(v: Vec<i32>) -> Self {
        Self::IntArray(v)
    }
}

impl From<Vec<String>> for SessionValue {
    fn from(v: Vec<String>) -> Self {
        Self::StringArray(v)
    }
}

impl From<DateTime<Utc>> for SessionValue {
    fn from(v: DateTime<Utc>) -> Self {
        Self::DateTime(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_table_is_bijective() {
        for kind in ValueKind::ALIASED {
            let alias = kind.alias().expect("aliased kind");
            assert_eq!(ValueKind::from_alias(alias), Some(kind));
        }
        assert_eq!(ValueKind::Json.alias(), None);
        assert_eq!(ValueKind::from_alias("System.Int32"), None);
    }

    #[test]
    fn conversions_pick_expected_kind() {
        assert_eq!(SessionValue::from(1i64).kind(), ValueKind::Long);
        assert_eq!(SessionValue::from(1.5f32).kind(), ValueKind::Float);
        assert_eq!(SessionValue::from("x").as_str(), Some("x"));
        assert_eq!(SessionValue::from(7).as_i64(), Some(7));
        assert_eq!(SessionValue::from(vec![1, 2]).kind(), ValueKind::IntArray);
    }
}
