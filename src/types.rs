//! JSON-RPC 2.0 message types.
//!
//! This module classifies inbound envelopes and holds the field checks shared
//! by the request, notification, response and error handlers. Envelopes stay
//! plain `serde_json` objects; the checks borrow from them.
//!
//! See <https://www.jsonrpc.org/specification>.

use serde_json::{Map, Value};
use tracing::debug;

use crate::codes::{self, RpcResult};
use crate::convert::FromJson;
use crate::json_type::JsonType;

/// Value of the `jsonrpc` member.
pub const JSONRPC_VERSION: &str = "2.0";

/// An inbound JSON value, classified by shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// An object with an `id` that is not a response.
    Request(Map<String, Value>),
    /// An object without an `id`.
    Notification(Map<String, Value>),
    /// An object with `result` or `error` and no `method`.
    Response(Map<String, Value>),
    Batch(Vec<Value>),
    /// Neither an object nor an array.
    Invalid(Value),
}

impl Message {
    pub fn classify(value: Value) -> Self {
        let object = match value {
            Value::Object(object) => object,
            Value::Array(items) => return Message::Batch(items),
            other => {
                debug!("Unclassifiable JSON-RPC message of type {}", JsonType::of(&other));
                return Message::Invalid(other);
            }
        };

        let has_method = object.contains_key("method");
        if !has_method && (object.contains_key("result") || object.contains_key("error")) {
            Message::Response(object)
        } else if object.contains_key("id") {
            Message::Request(object)
        } else {
            Message::Notification(object)
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Message::Request(o) | Message::Notification(o) | Message::Response(o) => {
                Value::Object(o)
            }
            Message::Batch(items) => Value::Array(items),
            Message::Invalid(value) => value,
        }
    }

    /// The raw `id` member, if any.
    pub fn id(&self) -> Option<&Value> {
        match self {
            Message::Request(o) | Message::Response(o) => o.get("id"),
            _ => None,
        }
    }

    pub fn is_request(&self) -> bool {
        matches!(self, Message::Request(_))
    }

    pub fn is_response(&self) -> bool {
        matches!(self, Message::Response(_))
    }

    pub fn is_notification(&self) -> bool {
        matches!(self, Message::Notification(_))
    }

    pub fn is_batch(&self) -> bool {
        matches!(self, Message::Batch(_))
    }
}

/// State of the `id` member of an envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum IdField<I> {
    Absent,
    Valid(I),
    /// Present, but not convertible to the id type.
    Invalid(codes::ErrorCode),
}

impl<I: FromJson> IdField<I> {
    pub fn read(envelope: &Map<String, Value>) -> Self {
        match envelope.get("id") {
            None => IdField::Absent,
            Some(_) => match check_id(envelope) {
                Ok(id) => IdField::Valid(id),
                Err(e) => IdField::Invalid(e),
            },
        }
    }
}

/// `jsonrpc` must be present, a string, and exactly `"2.0"`.
pub fn check_jsonrpc(envelope: &Map<String, Value>) -> RpcResult<()> {
    match envelope.get("jsonrpc") {
        None => Err(codes::jsonrpc_missing()),
        Some(Value::String(s)) if s == JSONRPC_VERSION => Ok(()),
        Some(Value::String(s)) => Err(codes::jsonrpc_unknown_specification(s)),
        Some(other) => Err(codes::jsonrpc_not_a_string(JsonType::of(other))),
    }
}

/// `id` must be present and convertible to `I`.
pub fn check_id<I: FromJson>(envelope: &Map<String, Value>) -> RpcResult<I> {
    let Some(id) = envelope.get("id") else {
        return Err(codes::id_missing());
    };
    I::from_json(id).map_err(|_| codes::id_wrong_type(JsonType::of(id), I::KIND))
}

pub fn check_method(envelope: &Map<String, Value>) -> RpcResult<&str> {
    match envelope.get("method") {
        None => Err(codes::method_missing()),
        Some(Value::String(method)) => Ok(method.as_str()),
        Some(other) => Err(codes::method_not_a_string(JsonType::of(other))),
    }
}

pub fn check_params(envelope: &Map<String, Value>) -> RpcResult<&Map<String, Value>> {
    match envelope.get("params") {
        None => Err(codes::params_missing()),
        Some(Value::Object(params)) => Ok(params),
        Some(other) => Err(codes::params_not_an_object(JsonType::of(other))),
    }
}
