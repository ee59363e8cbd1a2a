//! Variant value model used for every RPC parameter, result and error.
//!
//! [`Value`] is a closed sum type. Typed accessors never coerce: asking a
//! `String` for its integer yields [`ValueError::TypeMismatch`].
//!
//! # Example
//!
//! ```
//! use sockrpc_client::value::{Value, ValueType};
//!
//! let mut params = Value::array_with_capacity(2);
//! params.push(Value::from("exampleTest1")).unwrap();
//! params.push(Value::empty(ValueType::Array)).unwrap();
//!
//! assert_eq!(params.len().unwrap(), 2);
//! assert_eq!(params.get(0).unwrap().as_str().unwrap(), "exampleTest1");
//!
//! let err = Value::error(-1, "Parameter is not of type string.");
//! assert!(err.is_error());
//! ```

pub mod fault;
mod structs;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use structs::StructValue;

/// Type tag of a [`Value`], without data.
///
/// `Error` tags fault values; it is not a valid signature type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Void,
    Boolean,
    Integer,
    Float,
    String,
    Binary,
    Array,
    Struct,
    Error,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Void => "void",
            ValueType::Boolean => "boolean",
            ValueType::Integer => "integer",
            ValueType::Float => "float",
            ValueType::String => "string",
            ValueType::Binary => "binary",
            ValueType::Array => "array",
            ValueType::Struct => "struct",
            ValueType::Error => "error",
        };
        f.write_str(name)
    }
}

/// Failure to read a [`Value`] through a typed accessor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    /// The value holds a different tag than the accessor expects.
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: ValueType,
        found: ValueType,
    },

    /// Struct lookup for a key that is not present.
    #[error("missing field: {0}")]
    MissingField(String),

    /// Array read past the end.
    #[error("index {index} out of bounds for array of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    /// `Error` is a result, never a declared parameter or return type.
    #[error("{0} cannot appear in a method signature")]
    NotASignatureType(ValueType),
}

/// A variant-typed RPC value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Value {
    #[default]
    Void,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Binary(#[serde(with = "serde_bytes")] Vec<u8>),
    Array(Vec<Value>),
    Struct(StructValue),
    /// RPC fault. A distinct variant, not a convention over `Struct`.
    Error {
        #[serde(rename = "faultCode")]
        fault_code: i32,
        #[serde(rename = "faultString")]
        fault_string: String,
    },
}

impl Value {
    /// Build an error value (`makeError`).
    pub fn error(code: i32, message: impl Into<String>) -> Self {
        Value::Error {
            fault_code: code,
            fault_string: message.into(),
        }
    }

    /// Build the empty value of a type tag.
    ///
    /// Used to declare method signatures, where only the tag carries meaning.
    /// `ValueType::Error` yields an error with code 0 and an empty message.
    pub fn empty(value_type: ValueType) -> Self {
        match value_type {
            ValueType::Void => Value::Void,
            ValueType::Boolean => Value::Boolean(false),
            ValueType::Integer => Value::Integer(0),
            ValueType::Float => Value::Float(0.0),
            ValueType::String => Value::String(String::new()),
            ValueType::Binary => Value::Binary(Vec::new()),
            ValueType::Array => Value::Array(Vec::new()),
            ValueType::Struct => Value::Struct(StructValue::new()),
            ValueType::Error => Value::error(0, ""),
        }
    }

    /// Create an empty array with room for `capacity` elements.
    pub fn array_with_capacity(capacity: usize) -> Self {
        Value::Array(Vec::with_capacity(capacity))
    }

    /// Type tag of this value.
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Void => ValueType::Void,
            Value::Boolean(_) => ValueType::Boolean,
            Value::Integer(_) => ValueType::Integer,
            Value::Float(_) => ValueType::Float,
            Value::String(_) => ValueType::String,
            Value::Binary(_) => ValueType::Binary,
            Value::Array(_) => ValueType::Array,
            Value::Struct(_) => ValueType::Struct,
            Value::Error { .. } => ValueType::Error,
        }
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error { .. })
    }

    #[inline]
    pub fn is_void(&self) -> bool {
        matches!(self, Value::Void)
    }

    fn mismatch(&self, expected: ValueType) -> ValueError {
        ValueError::TypeMismatch {
            expected,
            found: self.value_type(),
        }
    }

    pub fn as_bool(&self) -> Result<bool, ValueError> {
        match self {
            Value::Boolean(b) => Ok(*b),
            other => Err(other.mismatch(ValueType::Boolean)),
        }
    }

    pub fn as_integer(&self) -> Result<i64, ValueError> {
        match self {
            Value::Integer(i) => Ok(*i),
            other => Err(other.mismatch(ValueType::Integer)),
        }
    }

    pub fn as_float(&self) -> Result<f64, ValueError> {
        match self {
            Value::Float(f) => Ok(*f),
            other => Err(other.mismatch(ValueType::Float)),
        }
    }

    pub fn as_str(&self) -> Result<&str, ValueError> {
        match self {
            Value::String(s) => Ok(s),
            other => Err(other.mismatch(ValueType::String)),
        }
    }

    pub fn as_binary(&self) -> Result<&[u8], ValueError> {
        match self {
            Value::Binary(b) => Ok(b),
            other => Err(other.mismatch(ValueType::Binary)),
        }
    }

    pub fn as_array(&self) -> Result<&[Value], ValueError> {
        match self {
            Value::Array(items) => Ok(items),
            other => Err(other.mismatch(ValueType::Array)),
        }
    }

    pub fn as_array_mut(&mut self) -> Result<&mut Vec<Value>, ValueError> {
        match self {
            Value::Array(items) => Ok(items),
            other => Err(other.mismatch(ValueType::Array)),
        }
    }

    pub fn as_struct(&self) -> Result<&StructValue, ValueError> {
        match self {
            Value::Struct(map) => Ok(map),
            other => Err(other.mismatch(ValueType::Struct)),
        }
    }

    pub fn as_struct_mut(&mut self) -> Result<&mut StructValue, ValueError> {
        match self {
            Value::Struct(map) => Ok(map),
            other => Err(other.mismatch(ValueType::Struct)),
        }
    }

    /// Fault code of an error value.
    pub fn fault_code(&self) -> Result<i32, ValueError> {
        match self {
            Value::Error { fault_code, .. } => Ok(*fault_code),
            other => Err(other.mismatch(ValueType::Error)),
        }
    }

    /// Fault message of an error value.
    pub fn fault_string(&self) -> Result<&str, ValueError> {
        match self {
            Value::Error { fault_string, .. } => Ok(fault_string),
            other => Err(other.mismatch(ValueType::Error)),
        }
    }

    // Array operations

    /// Reserve room for `additional` more elements.
    pub fn reserve(&mut self, additional: usize) -> Result<(), ValueError> {
        self.as_array_mut()?.reserve(additional);
        Ok(())
    }

    /// Append an element.
    pub fn push(&mut self, value: impl Into<Value>) -> Result<(), ValueError> {
        self.as_array_mut()?.push(value.into());
        Ok(())
    }

    /// Indexed read.
    pub fn get(&self, index: usize) -> Result<&Value, ValueError> {
        let items = self.as_array()?;
        items.get(index).ok_or(ValueError::IndexOutOfBounds {
            index,
            len: items.len(),
        })
    }

    /// Number of elements in an array or fields in a struct.
    pub fn len(&self) -> Result<usize, ValueError> {
        match self {
            Value::Array(items) => Ok(items.len()),
            Value::Struct(map) => Ok(map.len()),
            other => Err(other.mismatch(ValueType::Array)),
        }
    }

    /// Struct lookup by key.
    pub fn field(&self, key: &str) -> Result<&Value, ValueError> {
        self.as_struct()?.get(key)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v.into())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Binary(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl From<StructValue> for Value {
    fn from(v: StructValue) -> Self {
        Value::Struct(v)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Void
    }
}
