//! Method registry and dispatcher.
//!
//! A [`Module`] maps method names to request procedures and notification
//! procedures, with an optional fallback for unknown methods. Register
//! everything with the builder methods before the first dispatch; the
//! registry is read-only afterwards and can be shared across threads behind
//! an `Arc`.
//!
//! # Dispatch
//!
//! For a single envelope, [`Module::dispatch`] decides in this order:
//!
//! 1. A missing or non-string `method` is answered only when the envelope
//!    carries a valid `id`. Otherwise it is dropped.
//! 2. An unknown method goes to the fallback untouched, if one is set.
//! 3. An `id` of the wrong type is answered with `INVALID_REQUEST` and a
//!    `null` id.
//! 4. An unknown method without fallback is `METHOD_NOT_FOUND` for requests
//!    and dropped for notifications.
//! 5. A request method needs an `id`. Called without one it is dropped.
//! 6. `jsonrpc` and `params` are checked before the procedure runs. With a
//!    valid `id` these failures are answered, even for a notification method.
//! 7. A notification method never answers for its own parameter or callback
//!    failures. Those are logged.
//!
//! ```
//! use json_rpc_bind::{Module, Parameter};
//!
//! let module: Module<i64> = Module::new().procedure(
//!     "sum",
//!     (Parameter::<i64>::required("a"), Parameter::<i64>::required("b")),
//!     |(a, b)| Ok(a + b),
//! );
//!
//! let response = module.call(r#"{"jsonrpc":"2.0","id":1,"method":"sum","params":{"a":3,"b":7}}"#);
//! assert_eq!(response.as_deref(), Some(r#"{"jsonrpc":"2.0","id":1,"result":10}"#));
//! ```

use std::collections::HashMap;
use std::marker::PhantomData;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use crate::codes::{self, ErrorCode};
use crate::convert::RpcId;
use crate::error::Error;
use crate::parameter::ParameterList;
use crate::procedure::{NotificationProcedure, Procedure};
use crate::response;
use crate::types::{IdField, check_jsonrpc, check_method, check_params};

/// Type-erased procedure. Returns the response envelope, if any.
type BoxedProcedure = Box<dyn Fn(&Map<String, Value>) -> Option<Value> + Send + Sync>;

struct Entry {
    procedure: BoxedProcedure,
    requires_id: bool,
}

/// A registry of procedures for one id type.
pub struct Module<I> {
    entries: HashMap<String, Entry>,
    fallback: Option<BoxedProcedure>,
    _id: PhantomData<fn() -> I>,
}

impl<I: RpcId> Module<I> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            fallback: None,
            _id: PhantomData,
        }
    }

    /// Register a request method.
    ///
    /// A later registration under the same name replaces the earlier one.
    pub fn procedure<P, R, F>(self, method: &str, params: P, callback: F) -> Self
    where
        P: ParameterList,
        R: Serialize + 'static,
        F: Fn(P::Values) -> Result<R, Error> + Send + Sync + 'static,
    {
        self.with_procedure(method, Procedure::new(params, callback))
    }

    /// Register an already built [`Procedure`].
    pub fn with_procedure<P, R>(mut self, method: &str, procedure: Procedure<I, P, R>) -> Self
    where
        P: ParameterList,
        R: Serialize + 'static,
    {
        let entry = Entry {
            procedure: Box::new(move |request| Some(procedure.call(request))),
            requires_id: true,
        };
        self.entries.insert(method.to_string(), entry);
        self
    }

    /// Register a notification method.
    pub fn notification<P, F>(mut self, method: &str, params: P, callback: F) -> Self
    where
        P: ParameterList,
        F: Fn(P::Values) -> Result<(), Error> + Send + Sync + 'static,
    {
        let procedure = NotificationProcedure::new(params, callback);
        let entry = Entry {
            procedure: Box::new(move |notification| {
                procedure.call(notification);
                None
            }),
            requires_id: false,
        };
        self.entries.insert(method.to_string(), entry);
        self
    }

    /// Handle every unknown method. The fallback does its own validation.
    pub fn fallback<F>(mut self, fallback: F) -> Self
    where
        F: Fn(&Map<String, Value>) -> Option<Value> + Send + Sync + 'static,
    {
        self.fallback = Some(Box::new(fallback));
        self
    }

    pub fn contains(&self, method: &str) -> bool {
        self.entries.contains_key(method)
    }

    /// Dispatch a single envelope. Returns the response, if one is due.
    pub fn dispatch(&self, envelope: &Map<String, Value>) -> Option<Value> {
        let id = IdField::<I>::read(envelope);

        let method = match check_method(envelope) {
            Ok(method) => method,
            Err(e) => {
                return match id {
                    IdField::Valid(id) => Some(reject(Some(&id), e)),
                    _ => {
                        debug!("Dropping envelope without usable method: {}", e.message);
                        None
                    }
                };
            }
        };

        let Some(entry) = self.entries.get(method) else {
            if let Some(fallback) = &self.fallback {
                debug!("Method {} handled by fallback", method);
                return fallback(envelope);
            }
            return match id {
                IdField::Valid(id) => {
                    Some(response::failure(Some(&id), &codes::method_not_found(method)))
                }
                IdField::Invalid(e) => Some(reject::<I>(None, e)),
                IdField::Absent => {
                    debug!("Dropping notification for unknown method {}", method);
                    None
                }
            };
        };

        let checked = check_jsonrpc(envelope).and_then(|()| check_params(envelope).map(|_| ()));

        match id {
            IdField::Invalid(e) => Some(reject::<I>(None, e)),
            // A notification method ignores a valid id.
            IdField::Valid(id) => match checked {
                Err(e) => Some(reject(Some(&id), e)),
                Ok(()) => (entry.procedure)(envelope),
            },
            IdField::Absent if entry.requires_id => {
                warn!("Method {} called as notification, dropping", method);
                None
            }
            IdField::Absent => match checked {
                Ok(()) => (entry.procedure)(envelope),
                Err(e) => {
                    debug!("Dropping invalid notification {}: {}", method, e.message);
                    None
                }
            },
        }
    }

    /// Handle a parsed message: a single envelope or a batch.
    ///
    /// A batch answers with an array of the responses that are due, or with
    /// nothing if none are. An empty batch and a non-object element are
    /// `INVALID_REQUEST` with a `null` id.
    pub fn handle(&self, message: &Value) -> Option<Value> {
        match message {
            Value::Object(envelope) => self.dispatch(envelope),
            Value::Array(items) if items.is_empty() => Some(invalid_request()),
            Value::Array(items) => {
                let responses: Vec<Value> = items
                    .iter()
                    .filter_map(|item| match item {
                        Value::Object(envelope) => self.dispatch(envelope),
                        _ => Some(invalid_request()),
                    })
                    .collect();
                if responses.is_empty() {
                    None
                } else {
                    Some(Value::Array(responses))
                }
            }
            _ => Some(invalid_request()),
        }
    }

    /// Parse and handle a JSON text. Unparseable text is `PARSE_ERROR`.
    pub fn call(&self, text: &str) -> Option<String> {
        let response = match serde_json::from_str::<Value>(text) {
            Ok(message) => self.handle(&message)?,
            Err(e) => {
                debug!("Failed to parse message: {}", e);
                response::failure::<Value>(None, &codes::parse_error())
            }
        };
        match serde_json::to_string(&response) {
            Ok(s) => Some(s),
            Err(e) => {
                error!("Failed to serialize response: {}", e);
                None
            }
        }
    }
}

impl<I: RpcId> Default for Module<I> {
    fn default() -> Self {
        Self::new()
    }
}

fn reject<I: RpcId>(id: Option<&I>, cause: ErrorCode) -> Value {
    response::failure(id, &cause.standardize())
}

fn invalid_request() -> Value {
    let cause = ErrorCode::new(codes::Code::InvalidRequest, "Invalid request");
    response::failure::<Value>(None, &cause)
}
