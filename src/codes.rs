//! JSON-RPC error codes and the error object builder.
//!
//! [`ErrorCode`] is the `{code, message, data}` object sent over the wire.
//! The free functions in this module build every error the library emits.
//! They are pure: identical inputs render identical messages, so responses
//! can be compared byte for byte in tests.
//!
//! Field validation errors carry a `data` object naming the field and,
//! for type mismatches, the actual and expected JSON types:
//!
//! ```json
//! {"code":11,"message":"Parameter \"a\" is of type \"string\", expected \"number\"",
//!  "data":{"name":"a","actual":"string","expected":"number"}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::json_type::JsonType;

/// Outcome of a validation step: the value, or the error object to report.
pub type RpcResult<T> = Result<T, ErrorCode>;

/// Error codes used by the library.
///
/// The negative codes are reserved by the JSON-RPC 2.0 specification. The
/// positive codes are library specific and describe which validation step
/// failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Code {
    ParseError = -32700,
    InvalidRequest = -32600,
    MethodNotFound = -32601,
    InvalidParams = -32602,
    InternalError = -32603,
    UnknownError = 0,
    JsonrpcMissing = 1,
    JsonrpcNotAString = 2,
    JsonrpcUnknownSpecification = 3,
    MethodMissing = 4,
    MethodNotAString = 5,
    IdMissing = 6,
    IdWrongType = 7,
    ParamsMissing = 8,
    ParamsNotAnObject = 9,
    ParameterMissing = 10,
    ParameterWrongType = 11,
    ParameterValueMissing = 12,
    ErrorMissing = 13,
    ErrorNotAnObject = 14,
    ErrorCodeMissing = 15,
    ErrorCodeNotANumber = 16,
    ErrorMessageMissing = 17,
    ErrorMessageNotAString = 18,
    ErrorCallbackMissing = 19,
    ResultMissing = 20,
    ResultWrongType = 21,
    ParameterOutOfRange = 22,
}

impl Code {
    const ALL: [Code; 28] = [
        Code::ParseError,
        Code::InvalidRequest,
        Code::MethodNotFound,
        Code::InvalidParams,
        Code::InternalError,
        Code::UnknownError,
        Code::JsonrpcMissing,
        Code::JsonrpcNotAString,
        Code::JsonrpcUnknownSpecification,
        Code::MethodMissing,
        Code::MethodNotAString,
        Code::IdMissing,
        Code::IdWrongType,
        Code::ParamsMissing,
        Code::ParamsNotAnObject,
        Code::ParameterMissing,
        Code::ParameterWrongType,
        Code::ParameterValueMissing,
        Code::ErrorMissing,
        Code::ErrorNotAnObject,
        Code::ErrorCodeMissing,
        Code::ErrorCodeNotANumber,
        Code::ErrorMessageMissing,
        Code::ErrorMessageNotAString,
        Code::ErrorCallbackMissing,
        Code::ResultMissing,
        Code::ResultWrongType,
        Code::ParameterOutOfRange,
    ];

    pub const fn value(self) -> i32 {
        self as i32
    }

    pub fn from_value(value: i32) -> Option<Code> {
        Self::ALL.into_iter().find(|c| c.value() == value)
    }

    /// Failures of the envelope itself (`jsonrpc`, `id`, `method`).
    pub fn is_envelope_failure(self) -> bool {
        matches!(
            self,
            Code::JsonrpcMissing
                | Code::JsonrpcNotAString
                | Code::JsonrpcUnknownSpecification
                | Code::MethodMissing
                | Code::MethodNotAString
                | Code::IdMissing
                | Code::IdWrongType
        )
    }

    /// Failures of `params` or of a single declared parameter.
    pub fn is_parameter_failure(self) -> bool {
        matches!(
            self,
            Code::ParamsMissing
                | Code::ParamsNotAnObject
                | Code::ParameterMissing
                | Code::ParameterWrongType
                | Code::ParameterValueMissing
                | Code::ParameterOutOfRange
        )
    }
}

impl From<Code> for i32 {
    fn from(code: Code) -> Self {
        code.value()
    }
}

/// A JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("JSON-RPC error {code}: {message}")]
pub struct ErrorCode {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorCode {
    pub fn new(code: impl Into<i32>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// The library code, if this is one of the known codes.
    pub fn kind(&self) -> Option<Code> {
        Code::from_value(self.code)
    }

    /// Render as a JSON object.
    pub fn to_value(&self) -> Value {
        let mut o = serde_json::Map::new();
        o.insert("code".to_string(), json!(self.code));
        o.insert("message".to_string(), json!(self.message));
        if let Some(data) = &self.data {
            o.insert("data".to_string(), data.clone());
        }
        Value::Object(o)
    }

    /// Wrap library validation codes in the matching reserved code.
    ///
    /// Envelope failures become `INVALID_REQUEST`, parameter failures become
    /// `INVALID_PARAMS`, both keeping the root cause as `data`. Anything else
    /// is returned unchanged.
    pub fn standardize(self) -> ErrorCode {
        match self.kind() {
            Some(code) if code.is_envelope_failure() => invalid_request(&self),
            Some(code) if code.is_parameter_failure() => invalid_params(&self),
            _ => self,
        }
    }

    /// `Missing field "<field>"` with `{"name": field}` as data.
    pub fn missing_field(code: Code, field: &str) -> Self {
        Self::new(code, format!("Missing field \"{field}\"")).with_data(json!({ "name": field }))
    }

    /// `Field "<field>" is of type "<actual>", expected "<expected>"`.
    pub fn wrong_type(code: Code, field: &str, actual: JsonType, expected: JsonType) -> Self {
        Self::new(
            code,
            format!("Field \"{field}\" is of type \"{actual}\", expected \"{expected}\""),
        )
        .with_data(type_data(field, actual, expected))
    }

    pub fn missing_parameter(code: Code, name: &str) -> Self {
        Self::new(code, format!("Missing parameter \"{name}\"")).with_data(json!({ "name": name }))
    }

    pub fn wrong_parameter_type(
        code: Code,
        name: &str,
        actual: JsonType,
        expected: JsonType,
    ) -> Self {
        Self::new(
            code,
            format!("Parameter \"{name}\" is of type \"{actual}\", expected \"{expected}\""),
        )
        .with_data(type_data(name, actual, expected))
    }
}

impl Default for ErrorCode {
    fn default() -> Self {
        Self::new(Code::UnknownError, "Unknown error")
    }
}

impl From<ErrorCode> for Value {
    fn from(code: ErrorCode) -> Self {
        code.to_value()
    }
}

fn type_data(name: &str, actual: JsonType, expected: JsonType) -> Value {
    json!({
        "name": name,
        "actual": actual.name(),
        "expected": expected.name(),
    })
}

pub fn parse_error() -> ErrorCode {
    ErrorCode::new(Code::ParseError, "Parse error")
}

pub fn invalid_request(cause: &ErrorCode) -> ErrorCode {
    ErrorCode::new(Code::InvalidRequest, "Invalid request").with_data(cause.to_value())
}

pub fn method_not_found(method: &str) -> ErrorCode {
    ErrorCode::new(Code::MethodNotFound, format!("Method \"{method}\" not found"))
        .with_data(json!({ "method": method }))
}

pub fn invalid_params(cause: &ErrorCode) -> ErrorCode {
    ErrorCode::new(Code::InvalidParams, "Invalid parameter").with_data(cause.to_value())
}

pub fn internal_error(data: Option<Value>) -> ErrorCode {
    let code = ErrorCode::new(Code::InternalError, "Internal Error");
    match data {
        Some(data) => code.with_data(data),
        None => code,
    }
}

pub fn jsonrpc_missing() -> ErrorCode {
    ErrorCode::missing_field(Code::JsonrpcMissing, "jsonrpc")
}

pub fn jsonrpc_not_a_string(actual: JsonType) -> ErrorCode {
    ErrorCode::wrong_type(Code::JsonrpcNotAString, "jsonrpc", actual, JsonType::String)
}

pub fn jsonrpc_unknown_specification(value: &str) -> ErrorCode {
    ErrorCode::new(
        Code::JsonrpcUnknownSpecification,
        format!("Unknown JSON-RPC specification \"{value}\", expected \"2.0\""),
    )
}

pub fn method_missing() -> ErrorCode {
    ErrorCode::missing_field(Code::MethodMissing, "method")
}

pub fn method_not_a_string(actual: JsonType) -> ErrorCode {
    ErrorCode::wrong_type(Code::MethodNotAString, "method", actual, JsonType::String)
}

pub fn id_missing() -> ErrorCode {
    ErrorCode::missing_field(Code::IdMissing, "id")
}

pub fn id_wrong_type(actual: JsonType, expected: JsonType) -> ErrorCode {
    ErrorCode::wrong_type(Code::IdWrongType, "id", actual, expected)
}

pub fn params_missing() -> ErrorCode {
    ErrorCode::missing_field(Code::ParamsMissing, "params")
}

pub fn params_not_an_object(actual: JsonType) -> ErrorCode {
    ErrorCode::wrong_type(Code::ParamsNotAnObject, "params", actual, JsonType::Object)
}

pub fn parameter_missing(name: &str) -> ErrorCode {
    ErrorCode::missing_parameter(Code::ParameterMissing, name)
}

pub fn parameter_wrong_type(name: &str, actual: JsonType, expected: JsonType) -> ErrorCode {
    ErrorCode::wrong_parameter_type(Code::ParameterWrongType, name, actual, expected)
}

pub fn parameter_out_of_range(name: &str, expected: JsonType) -> ErrorCode {
    ErrorCode::new(
        Code::ParameterOutOfRange,
        format!("Parameter \"{name}\" is out of range for the expected \"{expected}\""),
    )
    .with_data(json!({ "name": name }))
}

pub fn parameter_value_missing(name: &str) -> ErrorCode {
    ErrorCode::new(
        Code::ParameterValueMissing,
        format!("No value or default value provided for parameter \"{name}\""),
    )
}

pub fn error_missing() -> ErrorCode {
    ErrorCode::missing_field(Code::ErrorMissing, "error")
}

pub fn error_not_an_object(actual: JsonType) -> ErrorCode {
    ErrorCode::wrong_type(Code::ErrorNotAnObject, "error", actual, JsonType::Object)
}

pub fn error_code_missing() -> ErrorCode {
    ErrorCode::missing_field(Code::ErrorCodeMissing, "code")
}

pub fn error_code_not_a_number(actual: JsonType) -> ErrorCode {
    ErrorCode::wrong_type(Code::ErrorCodeNotANumber, "code", actual, JsonType::Number)
}

pub fn error_message_missing() -> ErrorCode {
    ErrorCode::missing_field(Code::ErrorMessageMissing, "message")
}

pub fn error_message_not_a_string(actual: JsonType) -> ErrorCode {
    ErrorCode::wrong_type(Code::ErrorMessageNotAString, "message", actual, JsonType::String)
}

pub fn error_callback_missing() -> ErrorCode {
    ErrorCode::new(Code::ErrorCallbackMissing, "Error callback missing")
}

pub fn result_missing() -> ErrorCode {
    ErrorCode::missing_field(Code::ResultMissing, "result")
}

pub fn result_wrong_type(actual: JsonType, expected: JsonType) -> ErrorCode {
    ErrorCode::wrong_type(Code::ResultWrongType, "result", actual, expected)
}
