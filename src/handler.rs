//! Request and notification handlers.
//!
//! A handler validates an inbound envelope in a fixed order and binds the
//! declared parameters before it invokes its callback:
//!
//! 1. `jsonrpc` is present, a string, and `"2.0"`
//! 2. `id` is present and of the id type (requests only)
//! 3. `method` is present and a string
//! 4. `params` is present and an object
//! 5. every declared parameter, in declaration order
//!
//! The first failing step decides the error. Errors are the raw library
//! codes; mapping them to `INVALID_REQUEST`/`INVALID_PARAMS` happens when a
//! procedure renders the response.

use serde_json::{Map, Value};

use crate::codes::RpcResult;
use crate::convert::RpcId;
use crate::parameter::ParameterList;
use crate::types::{check_id, check_jsonrpc, check_method, check_params};

type RequestCallback<I, V, R> = Box<dyn Fn(&I, V) -> RpcResult<R> + Send + Sync>;
type NotificationCallback<V> = Box<dyn Fn(V) -> RpcResult<()> + Send + Sync>;

/// Result of handling a request.
///
/// `id` is the request id whenever it could be read, even if a later
/// validation step or the callback failed.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<I, R> {
    pub id: Option<I>,
    pub result: RpcResult<R>,
}

/// Validates requests and invokes a callback with the bound parameters.
pub struct RequestHandler<I, P: ParameterList, R> {
    params: P,
    callback: RequestCallback<I, P::Values, R>,
}

impl<I, P, R> RequestHandler<I, P, R>
where
    I: RpcId,
    P: ParameterList,
{
    pub fn new<F>(params: P, callback: F) -> Self
    where
        F: Fn(&I, P::Values) -> RpcResult<R> + Send + Sync + 'static,
    {
        Self {
            params,
            callback: Box::new(callback),
        }
    }

    /// Run the validation steps and bind the parameters.
    pub fn bind(&self, request: &Map<String, Value>) -> RpcResult<(I, P::Values)> {
        check_jsonrpc(request)?;
        let id = check_id::<I>(request)?;
        check_method(request)?;
        let params = check_params(request)?;
        let values = self.params.load(params)?;
        Ok((id, values))
    }

    /// Invoke the callback with already bound parameters.
    pub fn invoke(&self, id: &I, values: P::Values) -> RpcResult<R> {
        (self.callback)(id, values)
    }

    /// Bind, then invoke the callback.
    pub fn handle(&self, request: &Map<String, Value>) -> Outcome<I, R> {
        match self.bind(request) {
            Ok((id, values)) => {
                let result = self.invoke(&id, values);
                Outcome {
                    id: Some(id),
                    result,
                }
            }
            Err(e) => Outcome {
                id: check_id::<I>(request).ok(),
                result: Err(e),
            },
        }
    }
}

/// Validates notifications and invokes a callback with the bound parameters.
pub struct NotificationHandler<P: ParameterList> {
    params: P,
    callback: NotificationCallback<P::Values>,
}

impl<P: ParameterList> NotificationHandler<P> {
    pub fn new<F>(params: P, callback: F) -> Self
    where
        F: Fn(P::Values) -> RpcResult<()> + Send + Sync + 'static,
    {
        Self {
            params,
            callback: Box::new(callback),
        }
    }

    /// Same as [`RequestHandler::bind`] without the `id` step.
    pub fn bind(&self, notification: &Map<String, Value>) -> RpcResult<P::Values> {
        check_jsonrpc(notification)?;
        check_method(notification)?;
        let params = check_params(notification)?;
        self.params.load(params)
    }

    pub fn invoke(&self, values: P::Values) -> RpcResult<()> {
        (self.callback)(values)
    }

    pub fn handle(&self, notification: &Map<String, Value>) -> RpcResult<()> {
        let values = self.bind(notification)?;
        self.invoke(values)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicI64, Ordering};

    use super::*;
    use crate::codes::{self, Code};
    use crate::parameter::Parameter;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(o) => o,
            _ => panic!("not an object"),
        }
    }

    fn sum() -> RequestHandler<i32, (Parameter<i64>, Parameter<i64>), i64> {
        RequestHandler::new(
            (Parameter::required("a"), Parameter::required("b")),
            |_id: &i32, (a, b): (i64, i64)| Ok(a + b),
        )
    }

    #[test]
    fn validation_order_is_fixed() {
        let handler = sum();
        let cases = [
            (json!({"method": "sum"}), Code::JsonrpcMissing),
            (json!({"jsonrpc": "2.0", "method": "sum"}), Code::IdMissing),
            (json!({"jsonrpc": "2.0", "id": "x", "method": "sum"}), Code::IdWrongType),
            (json!({"jsonrpc": "2.0", "id": 1}), Code::MethodMissing),
            (json!({"jsonrpc": "2.0", "id": 1, "method": 4}), Code::MethodNotAString),
            (json!({"jsonrpc": "2.0", "id": 1, "method": "sum"}), Code::ParamsMissing),
            (
                json!({"jsonrpc": "2.0", "id": 1, "method": "sum", "params": [3, 7]}),
                Code::ParamsNotAnObject,
            ),
            (
                json!({"jsonrpc": "2.0", "id": 1, "method": "sum", "params": {"b": 7}}),
                Code::ParameterMissing,
            ),
        ];
        for (request, expected) in cases {
            let error = handler.bind(&object(request)).unwrap_err();
            assert_eq!(error.kind(), Some(expected));
        }
    }

    #[test]
    fn first_parameter_failure_wins() {
        let request = object(json!({
            "jsonrpc": "2.0", "id": 1, "method": "sum", "params": {"a": "3"}
        }));
        let error = sum().bind(&request).unwrap_err();
        assert_eq!(
            error,
            codes::parameter_wrong_type("a", crate::JsonType::String, crate::JsonType::Number)
        );
    }

    #[test]
    fn handle_invokes_callback() {
        let request = object(json!({
            "jsonrpc": "2.0", "id": 5, "method": "sum", "params": {"a": 3, "b": 7}
        }));
        assert_eq!(
            sum().handle(&request),
            Outcome {
                id: Some(5),
                result: Ok(10)
            }
        );
    }

    #[test]
    fn handle_keeps_id_on_failure() {
        let request = object(json!({"jsonrpc": "2.0", "id": 5, "method": "sum", "params": {}}));
        let outcome = sum().handle(&request);
        assert_eq!(outcome.id, Some(5));
        assert_eq!(outcome.result, Err(codes::parameter_missing("a")));
    }

    #[test]
    fn notification_skips_id() {
        let seen = Arc::new(AtomicI64::new(0));
        let sink = Arc::clone(&seen);
        let handler = NotificationHandler::new((Parameter::<i64>::required("v"),), move |(v,)| {
            sink.store(v, Ordering::SeqCst);
            Ok(())
        });

        let notification = object(json!({"jsonrpc": "2.0", "method": "set", "params": {"v": 42}}));
        assert_eq!(handler.handle(&notification), Ok(()));
        assert_eq!(seen.load(Ordering::SeqCst), 42);

        let broken = object(json!({"jsonrpc": "2.0", "params": {"v": 1}}));
        assert_eq!(handler.handle(&broken), Err(codes::method_missing()));
    }
}
