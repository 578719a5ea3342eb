//! Outbound request and notification generators.
//!
//! A generator holds a method name and a parameter list. Calling `build`
//! with values in declaration order produces the envelope:
//!
//! ```json
//! {"jsonrpc":"2.0","id":1,"method":"sum","params":{"a":3,"b":7}}
//! ```
//!
//! `params` is always emitted, as an empty object for methods without
//! parameters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::convert::SequentialId;
use crate::parameter::ParameterList;
use crate::types::JSONRPC_VERSION;

fn params_object<P: ParameterList>(
    params: &P,
    values: &P::Values,
) -> Result<Value, serde_json::Error> {
    let mut o = Map::new();
    params.store(&mut o, values)?;
    Ok(Value::Object(o))
}

/// Generates request envelopes for one method.
#[derive(Debug, Clone)]
pub struct Request<P> {
    method: String,
    params: P,
}

impl<P: ParameterList> Request<P> {
    pub fn new(method: impl Into<String>, params: P) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn set_method(&mut self, method: impl Into<String>) {
        self.method = method.into();
    }

    pub fn build<I: Serialize>(
        &self,
        id: &I,
        values: &P::Values,
    ) -> Result<Value, serde_json::Error> {
        let mut o = Map::new();
        o.insert("jsonrpc".to_string(), Value::String(JSONRPC_VERSION.to_string()));
        o.insert("id".to_string(), serde_json::to_value(id)?);
        o.insert("method".to_string(), Value::String(self.method.clone()));
        o.insert("params".to_string(), params_object(&self.params, values)?);
        Ok(Value::Object(o))
    }
}

/// Generates notification envelopes for one method.
#[derive(Debug, Clone)]
pub struct Notification<P> {
    method: String,
    params: P,
}

impl<P: ParameterList> Notification<P> {
    pub fn new(method: impl Into<String>, params: P) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn build(&self, values: &P::Values) -> Result<Value, serde_json::Error> {
        let mut o = Map::new();
        o.insert("jsonrpc".to_string(), Value::String(JSONRPC_VERSION.to_string()));
        o.insert("method".to_string(), Value::String(self.method.clone()));
        o.insert("params".to_string(), params_object(&self.params, values)?);
        Ok(Value::Object(o))
    }
}

/// A source of fresh request ids. The first id is 1.
///
/// Share one sequence per session so that ids are unique among the calls
/// that session has outstanding.
#[derive(Debug, Default)]
pub struct IdSequence {
    last: AtomicU64,
}

impl IdSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next<I: SequentialId>(&self) -> I {
        I::from_sequence(self.last.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::Parameter;
    use serde_json::json;

    #[test]
    fn request_envelope() {
        let sum = Request::new(
            "sum",
            (Parameter::<i64>::required("a"), Parameter::<i64>::required("b")),
        );
        let envelope = sum.build(&1_i32, &(3, 7)).unwrap();
        assert_eq!(
            serde_json::to_string(&envelope).unwrap(),
            r#"{"jsonrpc":"2.0","id":1,"method":"sum","params":{"a":3,"b":7}}"#
        );
    }

    #[test]
    fn notification_has_no_id() {
        let log = Notification::new("log", ());
        assert_eq!(
            log.build(&()).unwrap(),
            json!({"jsonrpc": "2.0", "method": "log", "params": {}})
        );
    }

    #[test]
    fn ids_are_fresh() {
        let ids = IdSequence::new();
        assert_eq!(ids.next::<i64>(), 1);
        assert_eq!(ids.next::<i64>(), 2);
        assert_eq!(ids.next::<String>(), "3");
    }
}
