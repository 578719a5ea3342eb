//! Conversion from JSON values into typed parameters and ids.
//!
//! Conversions run through a closed set of [`FromJson`] implementations.
//! Each implementation names the JSON type it expects so that a failed
//! conversion can be reported as "is of type X, expected Y". Outbound values
//! go the other way through `serde::Serialize`.

use std::fmt;
use std::hash::Hash;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::json_type::JsonType;

/// Why a value could not be converted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    /// The value has the wrong JSON type. Carries the actual type.
    WrongType(JsonType),
    /// The value is a number, but it does not fit the target type.
    OutOfRange,
    /// An array element failed to convert to `expected`.
    Element {
        index: usize,
        expected: JsonType,
        error: Box<ConversionError>,
    },
}

/// Typed conversion from a borrowed JSON value.
pub trait FromJson: Sized {
    /// The JSON type this conversion expects.
    const KIND: JsonType;

    fn from_json(value: &Value) -> Result<Self, ConversionError>;
}

fn wrong_type<T>(value: &Value) -> Result<T, ConversionError> {
    Err(ConversionError::WrongType(JsonType::of(value)))
}

impl FromJson for bool {
    const KIND: JsonType = JsonType::Bool;

    fn from_json(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Bool(b) => Ok(*b),
            other => wrong_type(other),
        }
    }
}

impl FromJson for String {
    const KIND: JsonType = JsonType::String;

    fn from_json(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::String(s) => Ok(s.clone()),
            other => wrong_type(other),
        }
    }
}

impl FromJson for f64 {
    const KIND: JsonType = JsonType::Number;

    fn from_json(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Number(n) => n.as_f64().ok_or(ConversionError::OutOfRange),
            other => wrong_type(other),
        }
    }
}

// Integers are range checked. Fractional numbers never convert to an integer.
macro_rules! signed_from_json {
    ($($ty:ty),*) => {$(
        impl FromJson for $ty {
            const KIND: JsonType = JsonType::Number;

            fn from_json(value: &Value) -> Result<Self, ConversionError> {
                match value {
                    Value::Number(n) => n
                        .as_i64()
                        .and_then(|v| <$ty>::try_from(v).ok())
                        .ok_or(ConversionError::OutOfRange),
                    other => wrong_type(other),
                }
            }
        }
    )*};
}

macro_rules! unsigned_from_json {
    ($($ty:ty),*) => {$(
        impl FromJson for $ty {
            const KIND: JsonType = JsonType::Number;

            fn from_json(value: &Value) -> Result<Self, ConversionError> {
                match value {
                    Value::Number(n) => n
                        .as_u64()
                        .and_then(|v| <$ty>::try_from(v).ok())
                        .ok_or(ConversionError::OutOfRange),
                    other => wrong_type(other),
                }
            }
        }
    )*};
}

signed_from_json!(i32, i64);
unsigned_from_json!(u32, u64);

impl<T: FromJson> FromJson for Vec<T> {
    const KIND: JsonType = JsonType::Array;

    fn from_json(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(index, item)| {
                    T::from_json(item).map_err(|error| ConversionError::Element {
                        index,
                        expected: T::KIND,
                        error: Box::new(error),
                    })
                })
                .collect(),
            other => wrong_type(other),
        }
    }
}

impl FromJson for Map<String, Value> {
    const KIND: JsonType = JsonType::Object;

    fn from_json(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Object(o) => Ok(o.clone()),
            other => wrong_type(other),
        }
    }
}

/// A raw value accepts anything. Its nominal kind is only used in messages.
impl FromJson for Value {
    const KIND: JsonType = JsonType::Object;

    fn from_json(value: &Value) -> Result<Self, ConversionError> {
        Ok(value.clone())
    }
}

/// Types usable as a JSON-RPC `id`.
pub trait RpcId:
    FromJson + Serialize + Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static
{
}

impl<T> RpcId for T where
    T: FromJson + Serialize + Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static
{
}

/// Ids that can be generated from a monotonically increasing counter.
pub trait SequentialId: RpcId {
    fn from_sequence(n: u64) -> Self;
}

impl SequentialId for i32 {
    fn from_sequence(n: u64) -> Self {
        // Wraps after i32::MAX outstanding calls.
        (n % (i32::MAX as u64)) as i32
    }
}

impl SequentialId for i64 {
    fn from_sequence(n: u64) -> Self {
        (n % (i64::MAX as u64)) as i64
    }
}

impl SequentialId for u32 {
    fn from_sequence(n: u64) -> Self {
        (n % (u32::MAX as u64)) as u32
    }
}

impl SequentialId for u64 {
    fn from_sequence(n: u64) -> Self {
        n
    }
}

impl SequentialId for String {
    fn from_sequence(n: u64) -> Self {
        n.to_string()
    }
}
