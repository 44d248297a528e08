use std::sync::Arc;
use std::time::{Duration, Instant};

use brickwire_frame::Reply;
use parking_lot::{Condvar, Mutex};

use crate::error::{ChannelError, Result};

enum Slot<T> {
    Empty,
    Full(T),
    Taken,
}

impl<T> Slot<T> {
    fn take(&mut self) -> Option<T> {
        match std::mem::replace(self, Slot::Taken) {
            Slot::Full(value) => Some(value),
            other => {
                *self = other;
                None
            }
        }
    }
}

/// A write-once cell that one thread completes and another waits on.
///
/// Only the first [`complete`](Self::complete) takes effect; later calls are
/// ignored and report `false`.
pub struct OneShot<T> {
    slot: Mutex<Slot<T>>,
    ready: Condvar,
}

impl<T> OneShot<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot::Empty),
            ready: Condvar::new(),
        }
    }

    /// Store `value` and wake waiters. Returns `false` if already completed.
    pub fn complete(&self, value: T) -> bool {
        let mut slot = self.slot.lock();
        if !matches!(*slot, Slot::Empty) {
            return false;
        }
        *slot = Slot::Full(value);
        drop(slot);
        self.ready.notify_all();
        true
    }

    /// Whether a value has been stored (taken or not).
    pub fn is_complete(&self) -> bool {
        !matches!(*self.slot.lock(), Slot::Empty)
    }

    /// Block until a value is available or `timeout` elapses, then take it.
    ///
    /// Returns `None` on timeout, or if the value was already taken.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now().checked_add(timeout);
        let mut slot = self.slot.lock();
        loop {
            if let Some(value) = slot.take() {
                return Some(value);
            }
            if matches!(*slot, Slot::Taken) {
                return None;
            }
            let timed_out = match deadline {
                Some(deadline) => self.ready.wait_until(&mut slot, deadline).timed_out(),
                None => {
                    self.ready.wait(&mut slot);
                    false
                }
            };
            if timed_out {
                return slot.take();
            }
        }
    }
}

impl<T> Default for OneShot<T> {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) type ReplyCell = Arc<OneShot<Result<Reply>>>;

/// Deferred result of a command sent with
/// [`Channel::send_with_reply`](crate::Channel::send_with_reply).
///
/// Resolves exactly once: with the brick's reply, or with the reason the
/// channel stopped waiting for it.
pub struct ReplyHandle {
    counter: u16,
    cell: ReplyCell,
    default_timeout: Duration,
}

impl ReplyHandle {
    pub(crate) fn new(counter: u16, cell: ReplyCell, default_timeout: Duration) -> Self {
        Self {
            counter,
            cell,
            default_timeout,
        }
    }

    /// Sequence counter the command went out with.
    pub fn counter(&self) -> u16 {
        self.counter
    }

    /// Whether the reply (or a failure) has arrived.
    pub fn is_resolved(&self) -> bool {
        self.cell.is_complete()
    }

    /// Wait for the reply using the channel's configured reply timeout.
    ///
    /// An error-status reply is still returned as `Ok`; use
    /// [`get_ok`](Self::get_ok) to turn it into an error.
    pub fn get(self) -> Result<Reply> {
        let timeout = self.default_timeout;
        self.get_timeout(timeout)
    }

    /// Wait for the reply for at most `timeout`.
    pub fn get_timeout(self, timeout: Duration) -> Result<Reply> {
        self.cell
            .wait_timeout(timeout)
            .unwrap_or(Err(ChannelError::Timeout(timeout)))
    }

    /// Wait for the reply and fail if the brick reported an error status.
    pub fn get_ok(self) -> Result<Reply> {
        Ok(self.get()?.into_result()?)
    }

    /// Cancellation is not supported for commands already sent; always `false`.
    pub fn cancel(&self) -> bool {
        false
    }
}

impl std::fmt::Debug for ReplyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplyHandle")
            .field("counter", &self.counter)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}
