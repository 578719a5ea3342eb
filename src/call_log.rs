//! Correlation of outbound calls with their responses.
//!
//! A [`CallLog`] pairs the id of an outstanding request with the thread that
//! blocks for its response. It is owned by a session and shared by
//! reference (usually an `Arc`) between the callers and the reader that
//! receives responses.
//!
//! The expected sequence is:
//!
//! 1. [`CallLog::register`] the id before the request is written,
//! 2. write the request,
//! 3. block in one of the `wait` methods.
//!
//! The reader calls [`CallLog::release`] for every response. A response for
//! an id that is not registered is dropped: it is either unsolicited or it
//! arrived after its call timed out or was cancelled.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::cancellation::CancellationToken;
use crate::convert::RpcId;
use crate::error::Error;
use crate::types::check_id;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct SlotState {
    response: Option<Map<String, Value>>,
    cancelled: bool,
}

/// One outstanding call.
#[derive(Default)]
struct Slot {
    state: Mutex<SlotState>,
    ready: Condvar,
}

impl Slot {
    /// Returns `false` if a response was already there.
    fn deliver(&self, response: Map<String, Value>) -> bool {
        let mut state = lock(&self.state);
        if state.response.is_some() {
            return false;
        }
        state.response = Some(response);
        self.ready.notify_all();
        true
    }

    fn cancel(&self) {
        lock(&self.state).cancelled = true;
        self.ready.notify_all();
    }
}

/// What [`CallLog::release`] did with a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Released {
    /// Handed to a registered call.
    Delivered,
    /// No call is registered for the id. The response was dropped.
    Unsolicited,
    /// The call already had a response. The new one was dropped.
    Duplicate,
}

struct Table<I> {
    slots: HashMap<I, Arc<Slot>>,
    /// Set by `cancel_all`. Later waits fail right away.
    closed: bool,
}

/// Table of outstanding calls keyed by id.
pub struct CallLog<I> {
    calls: Mutex<Table<I>>,
    timeout: Option<Duration>,
}

impl<I: RpcId> CallLog<I> {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Table {
                slots: HashMap::new(),
                closed: false,
            }),
            timeout: None,
        }
    }

    /// Default timeout for [`CallLog::wait`] and [`CallLog::wait_for`].
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Number of registered calls.
    pub fn outstanding(&self) -> usize {
        lock(&self.calls).slots.len()
    }

    /// Register `id` as outstanding.
    ///
    /// Registering an id that is still outstanding joins the existing call.
    pub fn register(&self, id: I) {
        let mut calls = lock(&self.calls);
        if calls.closed {
            debug!("Not registering {:?} on a closed call log", id);
            return;
        }
        if calls.slots.contains_key(&id) {
            warn!("Id {:?} is reused while its call is outstanding", id);
        } else {
            calls.slots.insert(id, Arc::new(Slot::default()));
        }
    }

    /// Drop a registration, for example when the request could not be sent.
    pub fn forget(&self, id: &I) {
        lock(&self.calls).slots.remove(id);
    }

    fn slot(&self, id: &I) -> Result<Arc<Slot>, Error> {
        let mut calls = lock(&self.calls);
        if calls.closed {
            return Err(Error::Cancelled);
        }
        Ok(Arc::clone(calls.slots.entry(id.clone()).or_default()))
    }

    fn remove(&self, id: &I, slot: &Arc<Slot>) {
        let mut calls = lock(&self.calls);
        if calls
            .slots
            .get(id)
            .is_some_and(|current| Arc::ptr_eq(current, slot))
        {
            calls.slots.remove(id);
        }
    }

    /// Block until the response to `request` arrives.
    ///
    /// Uses the configured timeout, if any.
    pub fn wait(&self, request: &Map<String, Value>) -> Result<Map<String, Value>, Error> {
        let id = check_id::<I>(request)?;
        self.wait_for(&id)
    }

    pub fn wait_for(&self, id: &I) -> Result<Map<String, Value>, Error> {
        let deadline = self.timeout.map(|timeout| Instant::now() + timeout);
        self.block(id, &self.slot(id)?, deadline)
    }

    pub fn wait_timeout(&self, id: &I, timeout: Duration) -> Result<Map<String, Value>, Error> {
        self.block(id, &self.slot(id)?, Some(Instant::now() + timeout))
    }

    /// Like [`CallLog::wait_for`], but gives up when `token` is cancelled.
    pub fn wait_cancellable(
        &self,
        id: &I,
        token: &CancellationToken,
    ) -> Result<Map<String, Value>, Error> {
        let slot = self.slot(id)?;
        let weak = Arc::downgrade(&slot);
        token.on_cancel(move || {
            if let Some(slot) = weak.upgrade() {
                slot.cancel();
            }
        });
        let deadline = self.timeout.map(|timeout| Instant::now() + timeout);
        self.block(id, &slot, deadline)
    }

    fn block(
        &self,
        id: &I,
        slot: &Arc<Slot>,
        deadline: Option<Instant>,
    ) -> Result<Map<String, Value>, Error> {
        let mut state = lock(&slot.state);
        let outcome = loop {
            if let Some(response) = state.response.take() {
                break Ok(response);
            }
            if state.cancelled {
                break Err(Error::Cancelled);
            }
            match deadline {
                None => {
                    state = slot.ready.wait(state).unwrap_or_else(PoisonError::into_inner);
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        break Err(Error::TimedOut(format!("{:?}", id)));
                    }
                    let (guard, _) = slot
                        .ready
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner);
                    state = guard;
                }
            }
        };
        drop(state);
        self.remove(id, slot);
        outcome
    }

    /// Hand a response envelope to the call waiting for its id.
    pub fn release(&self, response: Map<String, Value>) -> Result<Released, Error> {
        let id = check_id::<I>(&response)?;
        let mut calls = lock(&self.calls);
        if calls.closed {
            debug!("Dropping response for {:?} on a closed call log", id);
            return Err(Error::Cancelled);
        }
        match calls.slots.get(&id) {
            Some(slot) => {
                if slot.deliver(response) {
                    Ok(Released::Delivered)
                } else {
                    warn!("Dropping duplicate response for {:?}", id);
                    Ok(Released::Duplicate)
                }
            }
            None => {
                warn!("Dropping response for unregistered id {:?}", id);
                Ok(Released::Unsolicited)
            }
        }
    }

    /// Wake every waiter with [`Error::Cancelled`] and close the log.
    ///
    /// Waits that start afterwards fail with [`Error::Cancelled`] too.
    pub fn cancel_all(&self) {
        let slots = {
            let mut calls = lock(&self.calls);
            calls.closed = true;
            std::mem::take(&mut calls.slots)
        };
        if !slots.is_empty() {
            debug!("Cancelling {} outstanding calls", slots.len());
        }
        for slot in slots.values() {
            slot.cancel();
        }
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.calls).closed
    }
}

impl<I: RpcId> Default for CallLog<I> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use serde_json::json;

    fn response(id: i64, result: i64) -> Map<String, Value> {
        match json!({"jsonrpc": "2.0", "id": id, "result": result}) {
            Value::Object(o) => o,
            _ => unreachable!(),
        }
    }

    #[test]
    fn release_wakes_the_matching_waiter() {
        let log = Arc::new(CallLog::<i64>::new());
        log.register(1);

        let waiter = {
            let log = Arc::clone(&log);
            thread::spawn(move || log.wait_for(&1))
        };
        assert_eq!(log.release(response(1, 10)).unwrap(), Released::Delivered);

        let received = waiter.join().unwrap().unwrap();
        assert_eq!(received["result"], json!(10));
        assert_eq!(log.outstanding(), 0);
    }

    #[test]
    fn response_before_wait_is_kept_for_registered_id() {
        let log = CallLog::<i64>::new();
        log.register(5);
        assert_eq!(log.release(response(5, 50)).unwrap(), Released::Delivered);
        assert_eq!(log.wait_for(&5).unwrap()["result"], json!(50));
        assert_eq!(log.outstanding(), 0);
    }

    #[test]
    fn unsolicited_responses_are_dropped() {
        let log = CallLog::<i64>::new();
        for id in 0..1000 {
            assert_eq!(log.release(response(id, 99)).unwrap(), Released::Unsolicited);
        }
        assert_eq!(log.outstanding(), 0);
    }

    #[test]
    fn late_response_after_timeout_is_dropped() {
        let log = CallLog::<i64>::new();
        log.register(1);
        assert!(matches!(
            log.wait_timeout(&1, Duration::from_millis(5)),
            Err(Error::TimedOut(_))
        ));
        assert_eq!(log.release(response(1, 99)).unwrap(), Released::Unsolicited);
        assert_eq!(log.outstanding(), 0);

        log.register(1);
        assert_eq!(log.release(response(1, 7)).unwrap(), Released::Delivered);
        assert_eq!(log.wait_for(&1).unwrap()["result"], json!(7));
    }

    #[test]
    fn duplicate_response_is_dropped() {
        let log = CallLog::<i64>::new();
        log.register(2);
        assert_eq!(log.release(response(2, 1)).unwrap(), Released::Delivered);
        assert_eq!(log.release(response(2, 9)).unwrap(), Released::Duplicate);
        assert_eq!(log.wait_for(&2).unwrap()["result"], json!(1));
    }

    #[test]
    fn pairing_under_concurrency() {
        let log = Arc::new(CallLog::<i64>::new());
        let ids: Vec<i64> = (1..=16).collect();
        for id in &ids {
            log.register(*id);
        }

        let waiters: Vec<_> = ids
            .iter()
            .map(|&id| {
                let log = Arc::clone(&log);
                thread::spawn(move || (id, log.wait_for(&id)))
            })
            .collect();

        for id in ids.iter().rev() {
            log.release(response(*id, id * 100)).unwrap();
        }

        for waiter in waiters {
            let (id, received) = waiter.join().unwrap();
            let received = received.unwrap();
            assert_eq!(received["id"], json!(id));
            assert_eq!(received["result"], json!(id * 100));
        }
    }

    #[test]
    fn wait_times_out() {
        let log = CallLog::<i64>::new().with_timeout(Duration::from_millis(20));
        log.register(3);
        assert!(matches!(log.wait_for(&3), Err(Error::TimedOut(_))));
        assert_eq!(log.outstanding(), 0);

        log.register(4);
        assert!(matches!(
            log.wait_timeout(&4, Duration::from_millis(5)),
            Err(Error::TimedOut(_))
        ));
    }

    #[test]
    fn cancellation_wakes_waiter() {
        let log = Arc::new(CallLog::<i64>::new());
        let token = CancellationToken::new();
        log.register(7);

        let waiter = {
            let log = Arc::clone(&log);
            let token = token.clone();
            thread::spawn(move || log.wait_cancellable(&7, &token))
        };
        token.cancel();
        assert!(matches!(waiter.join().unwrap(), Err(Error::Cancelled)));
    }

    #[test]
    fn cancel_all_releases_everyone() {
        let log = Arc::new(CallLog::<i64>::new());
        log.register(1);
        log.register(2);
        let waiters: Vec<_> = [1, 2]
            .into_iter()
            .map(|id| {
                let log = Arc::clone(&log);
                thread::spawn(move || log.wait_for(&id))
            })
            .collect();

        log.cancel_all();
        for waiter in waiters {
            assert!(matches!(waiter.join().unwrap(), Err(Error::Cancelled)));
        }
        assert_eq!(log.outstanding(), 0);
        assert!(log.is_closed());
        assert!(matches!(log.release(response(1, 1)), Err(Error::Cancelled)));
    }

    #[test]
    fn wait_rejects_request_without_valid_id() {
        let log = CallLog::<i64>::new();
        let request = match json!({"jsonrpc": "2.0", "method": "m"}) {
            Value::Object(o) => o,
            _ => unreachable!(),
        };
        assert!(matches!(log.wait(&request), Err(Error::Rpc(_))));
    }
}
