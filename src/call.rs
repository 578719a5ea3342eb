//! Issuing calls to the peer.
//!
//! [`Call`] is the calling side of a request method: it generates a request
//! with a fresh id, registers the id in the session's [`CallLog`], hands the
//! envelope to a send action and blocks for the matching response.
//! [`Notify`] does the same for notifications, without waiting.
//!
//! The send action is any `Fn(Value) -> Result<(), Error>`; with a
//! [`Connection`](crate::Connection) it is usually
//! `move |envelope| outbound.send(envelope)`.

use std::marker::PhantomData;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use serde_json::Value;
use tracing::{debug, error};

use crate::call_log::CallLog;
use crate::codes::{self, ErrorCode};
use crate::convert::{FromJson, SequentialId};
use crate::error::Error;
use crate::parameter::ParameterList;
use crate::request::{IdSequence, Notification, Request};
use crate::response::{ErrorHandler, ResponseHandler};

type SendAction = Arc<dyn Fn(Value) -> Result<(), Error> + Send + Sync>;

type ResultCallback<I, R> = Box<dyn FnOnce(I, R) + Send>;
type ErrorCallback<I> = Box<dyn FnOnce(I, ErrorCode) + Send>;

/// Callbacks for [`Call::spawn`].
pub struct Callbacks<I, R> {
    on_result: Option<ResultCallback<I, R>>,
    on_error: Option<ErrorCallback<I>>,
}

impl<I, R> Callbacks<I, R> {
    pub fn new() -> Self {
        Self {
            on_result: None,
            on_error: None,
        }
    }

    pub fn on_result<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(I, R) + Send + 'static,
    {
        self.on_result = Some(Box::new(callback));
        self
    }

    /// Called for error responses and for local failures such as timeouts.
    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(I, ErrorCode) + Send + 'static,
    {
        self.on_error = Some(Box::new(callback));
        self
    }
}

impl<I, R> Default for Callbacks<I, R> {
    fn default() -> Self {
        Self::new()
    }
}

/// A request method on the peer, returning `R`.
pub struct Call<I, P, R> {
    request: Arc<Request<P>>,
    ids: Arc<IdSequence>,
    log: Arc<CallLog<I>>,
    send: SendAction,
    _result: PhantomData<fn() -> R>,
}

impl<I, P, R> Clone for Call<I, P, R> {
    fn clone(&self) -> Self {
        Self {
            request: Arc::clone(&self.request),
            ids: Arc::clone(&self.ids),
            log: Arc::clone(&self.log),
            send: Arc::clone(&self.send),
            _result: PhantomData,
        }
    }
}

impl<I, P, R> Call<I, P, R>
where
    I: SequentialId,
    P: ParameterList,
    R: FromJson + Send + 'static,
{
    pub fn new<F>(
        request: Request<P>,
        ids: Arc<IdSequence>,
        log: Arc<CallLog<I>>,
        send: F,
    ) -> Self
    where
        F: Fn(Value) -> Result<(), Error> + Send + Sync + 'static,
    {
        Self {
            request: Arc::new(request),
            ids,
            log,
            send: Arc::new(send),
            _result: PhantomData,
        }
    }

    pub fn method(&self) -> &str {
        self.request.method()
    }

    /// Send the request and block for the response.
    ///
    /// An error response from the peer is returned as [`Error::Rpc`].
    pub fn invoke(&self, values: P::Values) -> Result<R, Error> {
        let id = self.ids.next::<I>();
        let envelope = self.request.build(&id, &values)?;
        self.exchange(&id, envelope)
    }

    fn exchange(&self, id: &I, envelope: Value) -> Result<R, Error> {
        self.log.register(id.clone());
        debug!("Calling {} with id {:?}", self.request.method(), id);
        if let Err(e) = (self.send)(envelope) {
            self.log.forget(id);
            return Err(e);
        }
        let response = self.log.wait_for(id)?;

        if response.contains_key("result") {
            let (_, result) = ResponseHandler::<I, R>::new().handle(&response)?;
            Ok(result)
        } else if response.contains_key("error") {
            let (_, error) = ErrorHandler::<I>::new().handle(&response)?;
            Err(Error::Rpc(error))
        } else {
            Err(Error::Rpc(codes::result_missing()))
        }
    }

    /// Run the call on a worker thread and report through `callbacks`.
    ///
    /// Without an error callback, failures are logged as
    /// `ERROR_CALLBACK_MISSING`.
    pub fn spawn(&self, values: P::Values, callbacks: Callbacks<I, R>) -> JoinHandle<()> {
        let call = self.clone();
        thread::spawn(move || {
            let id = call.ids.next::<I>();
            let outcome = call
                .request
                .build(&id, &values)
                .map_err(Error::from)
                .and_then(|envelope| call.exchange(&id, envelope));

            match outcome {
                Ok(result) => match callbacks.on_result {
                    Some(on_result) => on_result(id, result),
                    None => debug!("Result for {:?} has no callback", id),
                },
                Err(e) => {
                    let code = e.to_error_code();
                    match callbacks.on_error {
                        Some(on_error) => on_error(id, code),
                        None => error!(
                            "{} for call {:?}: {}",
                            codes::error_callback_missing().message,
                            id,
                            code
                        ),
                    }
                }
            }
        })
    }
}

/// A notification method on the peer.
pub struct Notify<P> {
    notification: Notification<P>,
    send: SendAction,
}

impl<P: ParameterList> Notify<P> {
    pub fn new<F>(notification: Notification<P>, send: F) -> Self
    where
        F: Fn(Value) -> Result<(), Error> + Send + Sync + 'static,
    {
        Self {
            notification,
            send: Arc::new(send),
        }
    }

    pub fn notify(&self, values: P::Values) -> Result<(), Error> {
        let envelope = self.notification.build(&values)?;
        (self.send)(envelope)
    }
}
