//! Extraction of complete JSON values from a byte stream.
//!
//! A [`Framer`] accumulates bytes as they arrive, in chunks of any size, and
//! yields one complete top-level object or array at a time. Values may be
//! pipelined back to back (`{..}{..}`), separated by whitespace or newlines,
//! or pretty printed across many chunks.
//!
//! The scanner is a push-down automaton over [`State`]. Its stack and cursor
//! survive between calls, so every byte is scanned once no matter how the
//! input is split.
//!
//! ```
//! use json_rpc_bind::Framer;
//!
//! let mut framer = Framer::new();
//! framer.append(br#"{"a":1,"b":[1,2"#);
//! assert!(framer.next_value().unwrap().is_none());
//!
//! framer.append(br#",3]}{"c":"#);
//! let value = framer.next_value().unwrap().unwrap();
//! assert_eq!(value["b"][2], 3);
//! assert!(framer.next_value().unwrap().is_none());
//! ```

use serde_json::Value;
use tracing::{debug, warn};

/// Default upper bound for a single value.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Scanner states.
///
/// `Initial` is the state of an empty stack: the scanner is between values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Initial,
    Object,
    Key,
    Value,
    Array,
    String,
    Escape,
    Number,
    Bool,
    Null,
}

/// Stack operation for one input byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// Consume the byte.
    Stay,
    /// Consume the byte and enter a nested state.
    Push(State),
    /// Enter a nested state that sees the same byte again.
    Enter(State),
    /// Consume the byte and leave the current state.
    Pop,
    /// Consume the byte and leave the current and the enclosing state.
    PopTwice,
    /// Leave the current state. The enclosing state sees the same byte.
    Leave,
}

fn is_number_byte(byte: u8) -> bool {
    byte.is_ascii_digit() || matches!(byte, b'-' | b'+' | b'.' | b'e' | b'E')
}

fn transition(state: State, byte: u8) -> Step {
    match state {
        State::Initial => match byte {
            b'{' => Step::Push(State::Object),
            b'[' => Step::Push(State::Array),
            _ => Step::Stay,
        },
        State::Object => match byte {
            b'"' => Step::Push(State::Key),
            b':' => Step::Push(State::Value),
            b'}' => Step::Pop,
            _ => Step::Stay,
        },
        State::Key | State::String => match byte {
            b'\\' => Step::Push(State::Escape),
            b'"' => Step::Pop,
            _ => Step::Stay,
        },
        State::Escape => Step::Pop,
        State::Value => match byte {
            b'{' => Step::Push(State::Object),
            b'[' => Step::Push(State::Array),
            b'"' => Step::Push(State::String),
            b't' | b'f' => Step::Push(State::Bool),
            b'n' => Step::Push(State::Null),
            b',' => Step::Pop,
            b'}' | b']' => Step::PopTwice,
            b if b.is_ascii_digit() || matches!(b, b'-' | b'+' | b'.') => Step::Push(State::Number),
            _ => Step::Stay,
        },
        State::Array => match byte {
            b']' => Step::Pop,
            b',' => Step::Stay,
            b if b.is_ascii_whitespace() => Step::Stay,
            _ => Step::Enter(State::Value),
        },
        State::Number => {
            if is_number_byte(byte) {
                Step::Stay
            } else {
                Step::Leave
            }
        }
        State::Bool | State::Null => {
            if byte.is_ascii_alphabetic() {
                Step::Stay
            } else {
                Step::Leave
            }
        }
    }
}

/// Why the framer could not produce a value.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Bytes outside of any value. Reported once per run of such bytes.
    #[error("Unexpected byte 0x{byte:02x} outside of a JSON value")]
    UnexpectedInput { byte: u8 },

    /// A balanced frame was found, but it is not valid JSON.
    #[error("Frame is not valid JSON: {0}")]
    Invalid(#[from] serde_json::Error),

    /// A value grew beyond the limit. The rest of it is skipped unbuffered.
    #[error("Frame exceeds {limit} bytes")]
    TooLarge { limit: usize },
}

/// Incremental splitter for a stream of JSON values.
#[derive(Debug)]
pub struct Framer {
    buffer: Vec<u8>,
    /// Next byte to scan.
    cursor: usize,
    /// Offset of the opening bracket of the value being scanned.
    start: Option<usize>,
    stack: Vec<State>,
    max_frame_bytes: usize,
    /// Inside a run of unexpected bytes that was already reported.
    in_garbage: bool,
    /// Scanning the tail of an oversized value without keeping it.
    discarding: bool,
}

impl Framer {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            cursor: 0,
            start: None,
            stack: Vec::new(),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            in_garbage: false,
            discarding: false,
        }
    }

    pub fn with_max_frame_bytes(mut self, max_frame_bytes: usize) -> Self {
        self.max_frame_bytes = max_frame_bytes;
        self
    }

    pub fn append(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Bytes held, scanned or not.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Whether a value has been opened but not yet closed.
    pub fn has_partial(&self) -> bool {
        self.start.is_some()
    }

    fn state(&self) -> State {
        self.stack.last().copied().unwrap_or(State::Initial)
    }

    /// Drop the buffered part of the open value. The stack is kept so the
    /// tail can be skipped up to its closing bracket.
    fn discard(&mut self) {
        self.buffer.clear();
        self.cursor = 0;
        self.start = None;
        self.discarding = true;
    }

    /// Drop everything before the cursor.
    fn compact(&mut self) {
        self.buffer.drain(..self.cursor);
        self.cursor = 0;
    }

    /// Extract the next complete value.
    ///
    /// Returns `Ok(None)` when more bytes are needed. Call in a loop until
    /// then to drain every value that is already buffered.
    pub fn next_value(&mut self) -> Result<Option<Value>, FrameError> {
        while self.cursor < self.buffer.len() {
            let byte = self.buffer[self.cursor];
            let state = self.state();

            if state == State::Initial {
                match transition(state, byte) {
                    Step::Push(next) => {
                        self.in_garbage = false;
                        self.start = Some(self.cursor);
                        self.stack.push(next);
                    }
                    _ if byte.is_ascii_whitespace() => {}
                    _ => {
                        self.cursor += 1;
                        if !self.in_garbage {
                            self.in_garbage = true;
                            self.compact();
                            warn!("Unexpected byte 0x{:02x} between values", byte);
                            return Err(FrameError::UnexpectedInput { byte });
                        }
                        continue;
                    }
                }
                self.cursor += 1;
                continue;
            }

            match transition(state, byte) {
                Step::Stay => self.cursor += 1,
                Step::Push(next) => {
                    self.stack.push(next);
                    self.cursor += 1;
                }
                Step::Enter(next) => self.stack.push(next),
                Step::Pop => {
                    self.stack.pop();
                    self.cursor += 1;
                }
                Step::PopTwice => {
                    self.stack.pop();
                    self.stack.pop();
                    self.cursor += 1;
                }
                Step::Leave => {
                    self.stack.pop();
                }
            }

            if self.stack.is_empty() {
                if self.discarding {
                    self.discarding = false;
                    self.compact();
                    debug!("Skipped the end of an oversized frame");
                    continue;
                }
                return self.complete();
            }
        }

        if self.discarding {
            self.buffer.clear();
            self.cursor = 0;
            return Ok(None);
        }

        match self.start {
            Some(start) if self.buffer.len() - start > self.max_frame_bytes => {
                warn!(
                    "Discarding {} buffered bytes, frame limit is {}",
                    self.buffer.len() - start,
                    self.max_frame_bytes
                );
                self.discard();
                Err(FrameError::TooLarge {
                    limit: self.max_frame_bytes,
                })
            }
            Some(_) => Ok(None),
            None => {
                self.compact();
                Ok(None)
            }
        }
    }

    fn complete(&mut self) -> Result<Option<Value>, FrameError> {
        let start = self.start.take().unwrap_or(0);
        let end = self.cursor;
        let parsed = if end - start > self.max_frame_bytes {
            Err(FrameError::TooLarge {
                limit: self.max_frame_bytes,
            })
        } else {
            serde_json::from_slice::<Value>(&self.buffer[start..end]).map_err(FrameError::from)
        };
        self.compact();

        match parsed {
            Ok(value) => {
                debug!("Framed {} bytes", end - start);
                Ok(Some(value))
            }
            Err(e) => {
                warn!("Dropping frame: {}", e);
                Err(e)
            }
        }
    }
}

impl Default for Framer {
    fn default() -> Self {
        Self::new()
    }
}
