//! Outbound response envelopes and inbound response validation.
//!
//! [`success`] and [`failure`] build the two response shapes for a request
//! id. [`ResponseHandler`] and [`ErrorHandler`] do the opposite for the
//! calling side: they validate a response envelope field by field and decode
//! it into typed values.

use std::marker::PhantomData;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::codes::{self, ErrorCode, RpcResult};
use crate::convert::{FromJson, RpcId};
use crate::json_type::JsonType;
use crate::types::{JSONRPC_VERSION, check_id, check_jsonrpc};

fn envelope(id: Value) -> Map<String, Value> {
    let mut o = Map::new();
    o.insert("jsonrpc".to_string(), Value::String(JSONRPC_VERSION.to_string()));
    o.insert("id".to_string(), id);
    o
}

/// `{"jsonrpc":"2.0","id":id,"result":result}`
pub fn success<I: Serialize, R: Serialize>(id: &I, result: &R) -> Result<Value, serde_json::Error> {
    let mut o = envelope(serde_json::to_value(id)?);
    o.insert("result".to_string(), serde_json::to_value(result)?);
    Ok(Value::Object(o))
}

/// `{"jsonrpc":"2.0","id":id,"error":{...}}`
///
/// A missing id is rendered as `null`.
pub fn failure<I: Serialize>(id: Option<&I>, error: &ErrorCode) -> Value {
    let id = id
        .and_then(|id| serde_json::to_value(id).ok())
        .unwrap_or(Value::Null);
    let mut o = envelope(id);
    o.insert("error".to_string(), error.to_value());
    Value::Object(o)
}

/// Validates success responses and decodes `(id, result)`.
///
/// Checks run in order: `jsonrpc`, `id`, `result`.
#[derive(Debug)]
pub struct ResponseHandler<I, R> {
    _types: PhantomData<fn() -> (I, R)>,
}

impl<I: RpcId, R: FromJson> ResponseHandler<I, R> {
    pub fn new() -> Self {
        Self { _types: PhantomData }
    }

    pub fn handle(&self, response: &Map<String, Value>) -> RpcResult<(I, R)> {
        check_jsonrpc(response)?;
        let id = check_id::<I>(response)?;
        let Some(result) = response.get("result") else {
            return Err(codes::result_missing());
        };
        let result = R::from_json(result)
            .map_err(|_| codes::result_wrong_type(JsonType::of(result), R::KIND))?;
        Ok((id, result))
    }
}

impl<I: RpcId, R: FromJson> Default for ResponseHandler<I, R> {
    fn default() -> Self {
        Self::new()
    }
}

/// Validates error responses and decodes `(id, error)`.
///
/// Checks run in order: `jsonrpc`, `id`, `error`, `error.code`,
/// `error.message`. `error.data` is optional and kept as is.
#[derive(Debug)]
pub struct ErrorHandler<I> {
    _id: PhantomData<fn() -> I>,
}

impl<I: RpcId> ErrorHandler<I> {
    pub fn new() -> Self {
        Self { _id: PhantomData }
    }

    pub fn handle(&self, response: &Map<String, Value>) -> RpcResult<(I, ErrorCode)> {
        check_jsonrpc(response)?;
        let id = check_id::<I>(response)?;

        let error = match response.get("error") {
            None => return Err(codes::error_missing()),
            Some(Value::Object(error)) => error,
            Some(other) => return Err(codes::error_not_an_object(JsonType::of(other))),
        };

        let code = match error.get("code") {
            None => return Err(codes::error_code_missing()),
            Some(Value::Number(n)) => n
                .as_i64()
                .and_then(|n| i32::try_from(n).ok())
                .ok_or_else(|| codes::error_code_not_a_number(JsonType::Number))?,
            Some(other) => return Err(codes::error_code_not_a_number(JsonType::of(other))),
        };

        let message = match error.get("message") {
            None => return Err(codes::error_message_missing()),
            Some(Value::String(message)) => message.clone(),
            Some(other) => return Err(codes::error_message_not_a_string(JsonType::of(other))),
        };

        let mut decoded = ErrorCode::new(code, message);
        decoded.data = error.get("data").cloned();
        Ok((id, decoded))
    }
}

impl<I: RpcId> Default for ErrorHandler<I> {
    fn default() -> Self {
        Self::new()
    }
}
