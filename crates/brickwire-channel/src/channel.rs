use std::sync::Arc;
use std::thread::JoinHandle;

use brickwire_frame::{Bytecode, Command, FrameReader, FrameWriter, Reservation};
use brickwire_transport::{BrickStream, Transport};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::ChannelConfig;
use crate::error::{ChannelError, Result};
use crate::pending::{CloseReason, Correlation};
use crate::promise::ReplyHandle;
use crate::spooler::{self, RetryBudget};

const SPOOLER_THREAD_NAME: &str = "brickwire-spooler";

/// A command channel to one brick.
///
/// `Channel` is `Sync`: share it behind an `Arc` and send from any thread.
/// Writes are serialized, so frames never interleave on the wire, while
/// replies are matched back to their commands by sequence counter.
///
/// Dropping the channel closes it.
pub struct Channel<S: BrickStream> {
    writer: Mutex<FrameWriter<S>>,
    closer: Mutex<S>,
    correlation: Arc<Correlation>,
    spooler: Mutex<Option<JoinHandle<()>>>,
    config: ChannelConfig,
}

impl<S: BrickStream> Channel<S> {
    /// Take ownership of a connected stream and start the spooler.
    pub fn open(stream: S, config: ChannelConfig) -> Result<Self> {
        let reader = FrameReader::with_config_stream(stream.try_clone()?, config.frame.clone())?;
        let closer = stream.try_clone()?;
        let writer = FrameWriter::with_config_stream(stream, config.frame.clone())?;

        let correlation = Correlation::new();
        let shared = Arc::clone(&correlation);
        let budget = RetryBudget::new(config.retry_budget);
        let spooler = std::thread::Builder::new()
            .name(SPOOLER_THREAD_NAME.to_string())
            .spawn(move || spooler::run(reader, shared, budget))
            .map_err(ChannelError::Spawn)?;

        info!(
            retry_budget = config.retry_budget,
            read_timeout = ?config.frame.read_timeout,
            "channel open"
        );

        Ok(Self {
            writer: Mutex::new(writer),
            closer: Mutex::new(closer),
            correlation,
            spooler: Mutex::new(Some(spooler)),
            config,
        })
    }

    /// Connect through `transport` and open a channel on the new stream.
    pub fn connect<T>(transport: &mut T, config: ChannelConfig) -> Result<Self>
    where
        T: Transport<Stream = S>,
    {
        debug!(transport = transport.name(), "connecting");
        let stream = transport.connect()?;
        Self::open(stream, config)
    }

    /// Send a command that expects a reply.
    ///
    /// `global` bytes of device memory are reserved for the result and come
    /// back as the reply payload. Reservation bounds are checked before
    /// anything is written.
    pub fn send_with_reply(&self, bytecode: Bytecode, local: u16, global: u16) -> Result<ReplyHandle> {
        self.send_with_reservation(bytecode, Reservation::new(local, global)?)
    }

    /// Send a reply-expecting command with a pre-validated reservation.
    pub fn send_with_reservation(
        &self,
        bytecode: Bytecode,
        reservation: Reservation,
    ) -> Result<ReplyHandle> {
        warn_if_wrapping(reservation);
        let mut writer = self.writer.lock();
        let (counter, cell) = self.correlation.register()?;
        let command = Command::with_reservation(counter, true, reservation, bytecode);

        if let Err(err) = writer.write_command(&command) {
            self.correlation.unregister(counter);
            error!(counter, error = %err, "command write failed");
            return Err(err.into());
        }
        drop(writer);

        debug!(
            counter,
            local = reservation.local_bytes(),
            global = reservation.global_bytes(),
            "command sent"
        );
        Ok(ReplyHandle::new(counter, cell, self.config.reply_timeout))
    }

    /// Send a command without asking for a reply. Returns the counter used.
    pub fn send_no_reply(&self, bytecode: Bytecode, local: u16, global: u16) -> Result<u16> {
        let reservation = Reservation::new(local, global)?;
        warn_if_wrapping(reservation);
        let mut writer = self.writer.lock();
        let counter = self.correlation.next_counter()?;
        let command = Command::with_reservation(counter, false, reservation, bytecode);
        writer.write_command(&command)?;
        drop(writer);

        debug!(counter, "command sent without reply");
        Ok(counter)
    }

    /// Stop the spooler, shut the connection down, and fail outstanding handles
    /// with [`ChannelError::Closed`]. Safe to call more than once.
    ///
    /// Concurrent callers all block until the spooler has been joined and the
    /// pending handles have been failed.
    pub fn close(&self) {
        let mut spooler = self.spooler.lock();
        let first = !self.correlation.request_stop();
        if first {
            if let Err(err) = self.closer.lock().shutdown() {
                debug!(error = %err, "shutdown during close failed");
            }
        }
        if let Some(handle) = spooler.take() {
            if handle.join().is_err() {
                error!("spooler thread panicked");
            }
        }
        self.correlation.close(CloseReason::Closed);
        if first {
            info!("channel closed");
        }
    }

    /// `false` once closed or terminated by repeated read failures.
    pub fn is_open(&self) -> bool {
        !self.correlation.stop_requested() && !self.correlation.is_closed()
    }

    /// Reply-expecting commands still waiting for an answer.
    pub fn pending_count(&self) -> usize {
        self.correlation.pending_count()
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }
}

fn warn_if_wrapping(reservation: Reservation) {
    if reservation.wraps_on_wire() {
        warn!(
            local = reservation.local_bytes(),
            global = reservation.global_bytes(),
            "reservation at its upper bound encodes as zero"
        );
    }
}

impl<S: BrickStream> Drop for Channel<S> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<S: BrickStream> std::fmt::Debug for Channel<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("open", &self.is_open())
            .field("pending", &self.pending_count())
            .finish()
    }
}
