//! A JSON-RPC session over one byte stream.
//!
//! [`Connection`] ties the pieces together for a reader/writer pair such as
//! stdin/stdout, a TCP stream or `tokio::io::duplex`:
//!
//! - bytes are read in chunks and framed with a [`Framer`],
//! - responses are released into the session's [`CallLog`],
//! - requests and notifications are dispatched to the shared [`Module`] on
//!   blocking worker threads,
//! - responses and outbound messages are written newline separated.
//!
//! Outbound requests from local code go through an [`Outbound`] handle,
//! which can be used from any thread. At end of stream every call still
//! waiting in the call log is cancelled.

use std::io;
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, warn};

use crate::call_log::CallLog;
use crate::codes;
use crate::convert::RpcId;
use crate::error::Error;
use crate::framer::{DEFAULT_MAX_FRAME_BYTES, Framer};
use crate::module::Module;
use crate::response;
use crate::types::Message;

/// Default size of a single read.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 4096;

#[derive(Debug)]
enum Outgoing {
    Envelope(Value),
    Close,
}

/// Handle for writing envelopes to the peer.
#[derive(Debug, Clone)]
pub struct Outbound {
    sender: mpsc::UnboundedSender<Outgoing>,
}

impl Outbound {
    /// Queue an envelope for writing. Fails once the session has ended.
    pub fn send(&self, envelope: Value) -> Result<(), Error> {
        self.sender.send(Outgoing::Envelope(envelope)).map_err(|_| {
            Error::TransportError(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "Connection is closed",
            ))
        })
    }
}

/// One session: a module to serve, a call log for outbound calls.
pub struct Connection<I> {
    module: Arc<Module<I>>,
    call_log: Arc<CallLog<I>>,
    read_buffer_size: usize,
    max_frame_bytes: usize,
    sender: mpsc::UnboundedSender<Outgoing>,
    receiver: mpsc::UnboundedReceiver<Outgoing>,
}

impl<I: RpcId> Connection<I> {
    pub fn new(module: Arc<Module<I>>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            module,
            call_log: Arc::new(CallLog::new()),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            sender,
            receiver,
        }
    }

    pub fn with_call_log(mut self, call_log: Arc<CallLog<I>>) -> Self {
        self.call_log = call_log;
        self
    }

    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }

    pub fn with_max_frame_bytes(mut self, max_frame_bytes: usize) -> Self {
        self.max_frame_bytes = max_frame_bytes;
        self
    }

    pub fn call_log(&self) -> Arc<CallLog<I>> {
        Arc::clone(&self.call_log)
    }

    pub fn outbound(&self) -> Outbound {
        Outbound {
            sender: self.sender.clone(),
        }
    }

    /// Serve until the reader reaches end of stream.
    ///
    /// Returns after every dispatched message has been answered and written.
    pub async fn run<R, W>(self, mut reader: R, writer: W) -> Result<(), Error>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let Connection {
            module,
            call_log,
            read_buffer_size,
            max_frame_bytes,
            sender,
            receiver,
        } = self;
        let outbound = Outbound { sender };

        let writer_task = tokio::spawn(write_loop(writer, receiver));
        let mut framer = Framer::new().with_max_frame_bytes(max_frame_bytes);
        let mut dispatches = JoinSet::new();
        let mut chunk = vec![0u8; read_buffer_size];

        debug!("Connection started");
        let read_result = loop {
            let n = match reader.read(&mut chunk).await {
                Ok(0) => break Ok(()),
                Ok(n) => n,
                Err(e) => break Err(Error::from(e)),
            };
            framer.append(&chunk[..n]);

            loop {
                match framer.next_value() {
                    Ok(Some(value)) => {
                        route(value, &module, &call_log, &outbound, &mut dispatches);
                    }
                    Ok(None) => break,
                    Err(e) => {
                        debug!("Answering framing error: {}", e);
                        send_parse_error(&outbound);
                    }
                }
            }
            reap(&mut dispatches);
        };

        if framer.has_partial() {
            warn!("Stream ended inside a value");
            send_parse_error(&outbound);
        }

        call_log.cancel_all();
        while let Some(joined) = dispatches.join_next().await {
            log_join_failure(joined);
        }
        // Outbound clones may outlive the session; close explicitly.
        let _ = outbound.sender.send(Outgoing::Close);

        let write_result = match writer_task.await {
            Ok(result) => result,
            Err(e) => Err(Error::TransportError(io::Error::other(e))),
        };
        debug!("Connection finished");
        read_result.and(write_result)
    }
}

fn route<I: RpcId>(
    value: Value,
    module: &Arc<Module<I>>,
    call_log: &Arc<CallLog<I>>,
    outbound: &Outbound,
    dispatches: &mut JoinSet<()>,
) {
    match Message::classify(value) {
        Message::Response(response) => release(call_log, response),
        Message::Batch(items) => {
            let mut calls = Vec::with_capacity(items.len());
            for item in items {
                match Message::classify(item) {
                    Message::Response(response) => release(call_log, response),
                    other => calls.push(other.into_value()),
                }
            }
            if !calls.is_empty() {
                dispatch(Value::Array(calls), module, outbound, dispatches);
            }
        }
        other => dispatch(other.into_value(), module, outbound, dispatches),
    }
}

fn release<I: RpcId>(call_log: &CallLog<I>, response: Map<String, Value>) {
    if let Err(e) = call_log.release(response) {
        warn!("Unmatched response: {}", e);
    }
}

fn dispatch<I: RpcId>(
    message: Value,
    module: &Arc<Module<I>>,
    outbound: &Outbound,
    dispatches: &mut JoinSet<()>,
) {
    let module = Arc::clone(module);
    let outbound = outbound.clone();
    dispatches.spawn_blocking(move || {
        if let Some(response) = module.handle(&message) {
            if let Err(e) = outbound.send(response) {
                warn!("Dropping response: {}", e);
            }
        }
    });
}

/// Collect dispatches that already finished.
fn reap(dispatches: &mut JoinSet<()>) {
    while let Some(joined) = dispatches.try_join_next() {
        log_join_failure(joined);
    }
}

fn log_join_failure(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        error!("Dispatch task failed: {}", e);
    }
}

fn send_parse_error(outbound: &Outbound) {
    let envelope = response::failure::<Value>(None, &codes::parse_error());
    if let Err(e) = outbound.send(envelope) {
        warn!("Dropping parse error response: {}", e);
    }
}

async fn write_loop<W>(
    mut writer: W,
    mut receiver: mpsc::UnboundedReceiver<Outgoing>,
) -> Result<(), Error>
where
    W: AsyncWrite + Unpin,
{
    while let Some(Outgoing::Envelope(envelope)) = receiver.recv().await {
        let mut line = serde_json::to_vec(&envelope)?;
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await?;
    }
    writer.shutdown().await?;
    Ok(())
}
