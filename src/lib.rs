//! Typed JSON-RPC 2.0 procedures with a streaming transport core.
//!
//! This library binds Rust functions to JSON-RPC 2.0 methods. A method is
//! declared once as a list of named, typed parameters; the library validates
//! inbound envelopes against the JSON-RPC 2.0 grammar, converts every
//! parameter, invokes the function and renders a JSON-RPC 2.0 response or
//! error. The same declarations generate outbound requests, and a call log
//! pairs responses with the callers waiting for them.
//!
//! # Architecture
//!
//! [`codes`] holds the error codes and the builder for `{code, message,
//! data}` error objects. Validation errors name the offending field and its
//! actual and expected JSON type.
//!
//! [`parameter`] declares named parameters with optional defaults. Tuples of
//! parameters form a [`ParameterList`].
//!
//! [`handler`] validates requests and notifications in a fixed order and
//! binds the parameters. [`procedure`] wraps a handler with error
//! translation and response building. [`module`] is the method registry and
//! dispatcher.
//!
//! [`request`], [`call`] and [`call_log`] form the calling side: request
//! generation, blocking calls and response correlation by id.
//!
//! [`framer`] extracts complete JSON values from a byte stream that arrives
//! in arbitrary chunks, and [`connection`] runs a whole session over a tokio
//! reader/writer pair.
//!
//! [`error`] defines implementation-level errors, separate from the error
//! objects sent over the wire.
//!
//! # Quick Start
//!
//! ```
//! use json_rpc_bind::{Error, Module, Parameter};
//!
//! let module: Module<i64> = Module::new()
//!     .procedure(
//!         "sum",
//!         (Parameter::<i64>::required("a"), Parameter::<i64>::required("b")),
//!         |(a, b)| Ok(a + b),
//!     )
//!     .procedure(
//!         "divide",
//!         (Parameter::<f64>::required("a"), Parameter::<f64>::required("b")),
//!         |(a, b)| {
//!             if b == 0.0 {
//!                 return Err(Error::failed("Division by zero"));
//!             }
//!             Ok(a / b)
//!         },
//!     );
//!
//! let response = module.call(r#"{"jsonrpc":"2.0","id":2,"method":"divide","params":{"a":1,"b":0}}"#);
//! assert_eq!(
//!     response.as_deref(),
//!     Some(r#"{"jsonrpc":"2.0","id":2,"error":{"code":-32603,"message":"Division by zero"}}"#)
//! );
//! ```
//!
//! # Error Handling
//!
//! Callbacks return `Result<T, Error>`. [`Error::rpc`] sends a specific code;
//! any other error becomes `INTERNAL_ERROR` with the error's text. Panics in
//! callbacks are caught and reported the same way.
//!
//! Validation failures are reported as `INVALID_REQUEST` (envelope fields)
//! or `INVALID_PARAMS` (parameters) with the precise library error as
//! `data`:
//!
//! ```json
//! {"jsonrpc":"2.0","id":1,"error":{"code":-32602,"message":"Invalid parameter",
//!  "data":{"code":10,"message":"Missing parameter \"b\"","data":{"name":"b"}}}}
//! ```
//!
//! # Sessions
//!
//! ```no_run
//! use std::sync::Arc;
//! use json_rpc_bind::{Connection, Module};
//!
//! # async fn serve() -> Result<(), json_rpc_bind::Error> {
//! let module: Module<i64> = Module::new();
//! Connection::new(Arc::new(module))
//!     .run(tokio::io::stdin(), tokio::io::stdout())
//!     .await
//! # }
//! ```
//!
//! Messages may arrive pipelined, pretty printed or split across reads.
//! Responses are written one per line.

pub use call::{Call, Callbacks, Notify};
pub use call_log::{CallLog, Released};
pub use cancellation::CancellationToken;
pub use codes::{Code, ErrorCode, RpcResult};
pub use connection::{Connection, Outbound};
pub use convert::{ConversionError, FromJson, RpcId, SequentialId};
pub use error::Error;
pub use framer::{FrameError, Framer};
pub use handler::{NotificationHandler, Outcome, RequestHandler};
pub use json_type::JsonType;
pub use module::Module;
pub use parameter::{Parameter, ParameterList};
pub use procedure::{NotificationProcedure, Procedure};
pub use request::{IdSequence, Notification, Request};
pub use response::{ErrorHandler, ResponseHandler};
pub use types::{JSONRPC_VERSION, Message};

pub mod call;
pub mod call_log;
pub mod cancellation;
pub mod codes;
pub mod connection;
pub mod convert;
pub mod error;
pub mod framer;
pub mod handler;
pub mod json_type;
pub mod module;
pub mod parameter;
pub mod procedure;
pub mod request;
pub mod response;
pub mod types;
