//! Commands waiting for their reply, keyed by sequence counter.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Arc;

use brickwire_frame::Reply;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{ChannelError, Result};
use crate::promise::{OneShot, ReplyCell};

/// Shared by every channel in the process.
static NEXT_COUNTER: AtomicU16 = AtomicU16::new(0);

#[derive(Debug, Clone)]
pub(crate) enum CloseReason {
    Closed,
    Terminated(String),
}

impl CloseReason {
    fn to_error(&self) -> ChannelError {
        match self {
            CloseReason::Closed => ChannelError::Closed,
            CloseReason::Terminated(reason) => ChannelError::Terminated(reason.clone()),
        }
    }
}

#[derive(Default)]
struct Table {
    entries: HashMap<u16, ReplyCell>,
    closed: Option<CloseReason>,
}

/// State shared between callers and the spooler thread.
#[derive(Default)]
pub(crate) struct Correlation {
    table: Mutex<Table>,
    stop: AtomicBool,
}

impl Correlation {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Pick a counter for a new command without registering it.
    pub(crate) fn next_counter(&self) -> Result<u16> {
        let table = self.table.lock();
        if let Some(reason) = &table.closed {
            return Err(reason.to_error());
        }
        allocate(&table)
    }

    /// Pick a counter and register a cell for its reply.
    pub(crate) fn register(&self) -> Result<(u16, ReplyCell)> {
        let mut table = self.table.lock();
        if let Some(reason) = &table.closed {
            return Err(reason.to_error());
        }
        let counter = allocate(&table)?;
        let cell: ReplyCell = Arc::new(OneShot::new());
        table.entries.insert(counter, Arc::clone(&cell));
        Ok((counter, cell))
    }

    /// Drop a registration whose command never made it onto the wire.
    pub(crate) fn unregister(&self, counter: u16) {
        self.table.lock().entries.remove(&counter);
    }

    /// Resolve the waiter for `reply`. Replies nobody waits for are dropped.
    pub(crate) fn dispatch(&self, reply: Reply) {
        let counter = reply.counter();
        let cell = self.table.lock().entries.remove(&counter);
        match cell {
            Some(cell) => {
                debug!(counter, status = reply.status(), "reply matched");
                cell.complete(Ok(reply));
            }
            None => warn!(counter, "dropping reply with no pending command"),
        }
    }

    /// Refuse further sends and fail every waiter. The first reason sticks.
    pub(crate) fn close(&self, reason: CloseReason) {
        let (reason, drained) = {
            let mut table = self.table.lock();
            let reason = table.closed.get_or_insert(reason).clone();
            let drained: Vec<ReplyCell> = table.entries.drain().map(|(_, cell)| cell).collect();
            (reason, drained)
        };

        if !drained.is_empty() {
            debug!(count = drained.len(), "failing pending commands");
        }
        for cell in drained {
            cell.complete(Err(reason.to_error()));
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.table.lock().closed.is_some()
    }

    pub(crate) fn pending_count(&self) -> usize {
        self.table.lock().entries.len()
    }

    pub(crate) fn request_stop(&self) -> bool {
        self.stop.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

/// Next counter not currently in flight on this table.
fn allocate(table: &Table) -> Result<u16> {
    for _ in 0..=u16::MAX {
        let counter = NEXT_COUNTER.fetch_add(1, Ordering::Relaxed);
        if !table.entries.contains_key(&counter) {
            return Ok(counter);
        }
    }
    Err(ChannelError::CountersExhausted)
}
