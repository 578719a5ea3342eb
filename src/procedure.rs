//! Procedures: handlers plus error translation plus response building.
//!
//! A [`Procedure`] is the complete unit of work for one request method. It
//! is the only place where callback failures are translated:
//!
//! - `Err(Error::Rpc(code))` is sent verbatim,
//! - any other `Err` becomes `INTERNAL_ERROR` with the error's text,
//! - a panic becomes `INTERNAL_ERROR` with the panic message.
//!
//! Validation failures from the handler are wrapped in `INVALID_REQUEST` or
//! `INVALID_PARAMS` with the root cause as `data`.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::codes::{self, ErrorCode, RpcResult};
use crate::convert::RpcId;
use crate::error::Error;
use crate::handler::{NotificationHandler, Outcome, RequestHandler};
use crate::parameter::ParameterList;
use crate::response;
use crate::types::check_id;

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "Procedure panicked".to_string()
    }
}

/// Run a user callback and translate its failure into an error object.
fn guarded<V, R, F>(callback: &F, values: V) -> RpcResult<R>
where
    F: Fn(V) -> Result<R, Error>,
{
    match panic::catch_unwind(AssertUnwindSafe(|| callback(values))) {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(e)) => Err(e.to_error_code()),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!("Callback panicked: {}", message);
            Err(ErrorCode::new(codes::Code::InternalError, message))
        }
    }
}

/// A request method: validates, invokes, and renders the response envelope.
pub struct Procedure<I, P: ParameterList, R> {
    handler: RequestHandler<I, P, R>,
}

impl<I, P, R> Procedure<I, P, R>
where
    I: RpcId,
    P: ParameterList,
    R: Serialize + 'static,
{
    pub fn new<F>(params: P, callback: F) -> Self
    where
        F: Fn(P::Values) -> Result<R, Error> + Send + Sync + 'static,
    {
        Self {
            handler: RequestHandler::new(params, move |_id: &I, values| guarded(&callback, values)),
        }
    }

    /// Handle a request and return the typed outcome.
    ///
    /// Validation errors are already wrapped for the wire. Callback errors
    /// are left as they are.
    pub fn invoke(&self, request: &Map<String, Value>) -> Outcome<I, R> {
        match self.handler.bind(request) {
            Ok((id, values)) => {
                let result = self.handler.invoke(&id, values);
                Outcome {
                    id: Some(id),
                    result,
                }
            }
            Err(e) => Outcome {
                id: check_id::<I>(request).ok(),
                result: Err(e.standardize()),
            },
        }
    }

    /// Handle a request and build the response envelope.
    pub fn call(&self, request: &Map<String, Value>) -> Value {
        let Outcome { id, result } = self.invoke(request);
        let result = match result {
            Ok(result) => match id.as_ref() {
                Some(id) => response::success(id, &result).map_err(|e| {
                    error!("Failed to serialize result: {}", e);
                    codes::internal_error(Some(Value::String(e.to_string())))
                }),
                None => Err(codes::internal_error(None)),
            },
            Err(e) => Err(e),
        };
        match result {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!("Request failed with code {}: {}", e.code, e.message);
                response::failure(id.as_ref(), &e)
            }
        }
    }
}

/// A notification method. Produces no output.
pub struct NotificationProcedure<P: ParameterList> {
    handler: NotificationHandler<P>,
}

impl<P: ParameterList> NotificationProcedure<P> {
    pub fn new<F>(params: P, callback: F) -> Self
    where
        F: Fn(P::Values) -> Result<(), Error> + Send + Sync + 'static,
    {
        Self {
            handler: NotificationHandler::new(params, move |values| guarded(&callback, values)),
        }
    }

    /// Handle a notification. Validation failures are returned wrapped for
    /// the wire, callback failures as they are.
    pub fn invoke(&self, notification: &Map<String, Value>) -> RpcResult<()> {
        let values = self.handler.bind(notification).map_err(ErrorCode::standardize)?;
        self.handler.invoke(values)
    }

    /// Handle a notification, logging any failure.
    pub fn call(&self, notification: &Map<String, Value>) {
        if let Err(e) = self.invoke(notification) {
            debug!("Notification failed with code {}: {}", e.code, e.message);
        }
    }
}
