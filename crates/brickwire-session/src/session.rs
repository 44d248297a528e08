use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use brickwire_channel::{Channel, ChannelConfig};
use brickwire_transport::{BrickStream, Transport};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info};

use crate::brick::Brick;
use crate::error::{Result, SessionError, WorkerError};

const WORKER_THREAD_NAME: &str = "brickwire-worker";

/// Idle/Running state plus the cooperative cancellation flag.
pub(crate) struct SessionState {
    running: Mutex<bool>,
    idle: Condvar,
    cancelled: AtomicBool,
}

impl SessionState {
    pub(crate) fn new() -> Self {
        Self {
            running: Mutex::new(false),
            idle: Condvar::new(),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Idle -> Running. Clears the cancellation flag for the new worker.
    fn try_start(&self) -> bool {
        let mut running = self.running.lock();
        if *running {
            return false;
        }
        *running = true;
        self.cancelled.store(false, Ordering::SeqCst);
        true
    }

    fn finish(&self) {
        *self.running.lock() = false;
        self.idle.notify_all();
    }

    pub(crate) fn is_running(&self) -> bool {
        *self.running.lock()
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        let running = self.running.lock();
        !*running || self.cancelled.load(Ordering::SeqCst)
    }

    fn cancel(&self) -> bool {
        let running = self.running.lock();
        if *running {
            self.cancelled.store(true, Ordering::SeqCst);
        }
        *running
    }

    fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut running = self.running.lock();
        while *running {
            match deadline {
                Some(deadline) => {
                    if self.idle.wait_until(&mut running, deadline).timed_out() {
                        return !*running;
                    }
                }
                None => self.idle.wait(&mut running),
            }
        }
        true
    }
}

/// Returns the session to Idle however the worker exits.
struct IdleOnExit(Arc<SessionState>);

impl Drop for IdleOnExit {
    fn drop(&mut self) {
        self.0.finish();
    }
}

/// Runs at most one worker program against a brick.
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// use brickwire_channel::{Channel, ChannelConfig};
/// use brickwire_session::DeviceSession;
/// use brickwire_transport::TcpTransport;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut transport = TcpTransport::new("192.168.0.10:5555");
/// let channel = Channel::connect(&mut transport, ChannelConfig::default())?;
/// let session = DeviceSession::new(Arc::new(channel));
///
/// session.run(|brick| {
///     while !brick.is_cancelled() {
///         let volts = brick.battery_voltage()?;
///         println!("{volts:.2} V");
///         std::thread::sleep(Duration::from_secs(1));
///     }
///     Ok(())
/// })?;
/// # Ok(())
/// # }
/// ```
pub struct DeviceSession<S: BrickStream> {
    channel: Arc<Channel<S>>,
    state: Arc<SessionState>,
}

impl<S: BrickStream> DeviceSession<S> {
    pub fn new(channel: Arc<Channel<S>>) -> Self {
        Self {
            channel,
            state: Arc::new(SessionState::new()),
        }
    }

    /// Connect through `transport` and wrap the resulting channel.
    pub fn connect<T>(transport: &mut T, config: ChannelConfig) -> Result<Self>
    where
        T: Transport<Stream = S>,
    {
        Ok(Self::new(Arc::new(Channel::connect(transport, config)?)))
    }

    /// Start `program` on a worker thread.
    ///
    /// Fails with [`SessionError::AlreadyRunning`] while another worker is
    /// active, leaving that worker untouched. Errors returned by the program
    /// and panics inside it are logged; either way the session goes back to
    /// Idle when the program ends.
    pub fn run<F>(&self, program: F) -> Result<()>
    where
        F: FnOnce(Brick<S>) -> std::result::Result<(), WorkerError> + Send + 'static,
    {
        if !self.state.try_start() {
            return Err(SessionError::AlreadyRunning);
        }

        let brick = Brick::new(Arc::clone(&self.channel), Arc::clone(&self.state));
        let guard = IdleOnExit(Arc::clone(&self.state));
        let spawned = std::thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || {
                let _guard = guard;
                debug!("worker started");
                match catch_unwind(AssertUnwindSafe(|| program(brick))) {
                    Ok(Ok(())) => info!("worker finished"),
                    Ok(Err(WorkerError::Cancelled)) => info!("worker cancelled"),
                    Ok(Err(err)) => error!(error = %err, "worker failed"),
                    Err(panic) => error!(panic = panic_message(&*panic), "worker panicked"),
                }
            });

        // A failed spawn drops the closure, and with it the guard.
        spawned.map(|_| ()).map_err(SessionError::Spawn)
    }

    /// Ask the running worker to stop. No-op while Idle.
    pub fn cancel(&self) {
        if self.state.cancel() {
            debug!("worker cancellation requested");
        }
    }

    /// `true` while Idle, or once the current worker has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// Block until the session is Idle. Returns `false` if `timeout` elapsed first.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.state.wait_idle(timeout)
    }

    pub fn channel(&self) -> &Arc<Channel<S>> {
        &self.channel
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::os::unix::net::UnixStream;
    use std::sync::mpsc;

    use super::*;

    const WAIT: Duration = Duration::from_secs(5);

    fn session() -> (DeviceSession<UnixStream>, UnixStream) {
        let (host, brick) = UnixStream::pair().unwrap();
        let mut config = ChannelConfig::default();
        config.frame.read_timeout = Some(Duration::from_millis(50));
        let channel = Channel::open(host, config).unwrap();
        (DeviceSession::new(Arc::new(channel)), brick)
    }

    #[test]
    fn idle_session_reports_cancelled() {
        let (session, _brick) = session();
        assert!(!session.is_running());
        assert!(session.is_cancelled());
        session.cancel();
        assert!(session.is_cancelled());
    }

    #[test]
    fn second_run_is_rejected_while_first_is_active() {
        let (session, _brick) = session();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let (done_tx, done_rx) = mpsc::channel::<&'static str>();

        let first_done = done_tx.clone();
        session
            .run(move |_brick| {
                release_rx.recv().ok();
                first_done.send("first").ok();
                Ok(())
            })
            .unwrap();

        let err = session
            .run(move |_brick| {
                done_tx.send("second").ok();
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, SessionError::AlreadyRunning));
        assert!(session.is_running());

        release_tx.send(()).unwrap();
        assert_eq!(done_rx.recv_timeout(WAIT).unwrap(), "first");
        assert!(session.wait_idle(WAIT));
        assert!(done_rx.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn cancel_is_observed_by_worker_until_it_exits() {
        let (session, _brick) = session();
        let (started_tx, started_rx) = mpsc::channel();

        session
            .run(move |brick| {
                started_tx.send(()).ok();
                while !brick.is_cancelled() {
                    std::thread::sleep(Duration::from_millis(5));
                }
                Err(WorkerError::Cancelled)
            })
            .unwrap();

        started_rx.recv_timeout(WAIT).unwrap();
        assert!(!session.is_cancelled());
        session.cancel();
        assert!(session.is_cancelled());
        assert!(session.wait_idle(WAIT));
        assert!(session.is_cancelled());
    }

    #[test]
    fn new_run_clears_cancellation() {
        let (session, _brick) = session();
        session.run(|_| Ok(())).unwrap();
        assert!(session.wait_idle(WAIT));

        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        session
            .run(move |brick| {
                started_tx.send(brick.is_cancelled()).ok();
                release_rx.recv().ok();
                Ok(())
            })
            .unwrap();

        assert!(!started_rx.recv_timeout(WAIT).unwrap());
        assert!(!session.is_cancelled());
        release_tx.send(()).unwrap();
        assert!(session.wait_idle(WAIT));
    }

    #[test]
    fn failing_worker_returns_session_to_idle() {
        let (session, _brick) = session();
        session
            .run(|_| Err(WorkerError::Failed("sensor unplugged".into())))
            .unwrap();
        assert!(session.wait_idle(WAIT));
        session.run(|_| Ok(())).unwrap();
        assert!(session.wait_idle(WAIT));
    }

    #[test]
    fn panicking_worker_returns_session_to_idle() {
        let (session, _brick) = session();
        session.run(|_| panic!("worker bug")).unwrap();
        assert!(session.wait_idle(WAIT));
        assert!(!session.is_running());
        assert!(session.channel().is_open());
    }

    #[test]
    fn wait_idle_times_out_while_running() {
        let (session, _brick) = session();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        session
            .run(move |_| {
                release_rx.recv().ok();
                Ok(())
            })
            .unwrap();

        assert!(!session.wait_idle(Duration::from_millis(20)));
        release_tx.send(()).unwrap();
        assert!(session.wait_idle(WAIT));
    }

    #[test]
    fn panic_message_extracts_strings() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let borrowed: Box<dyn Any + Send> = Box::new("borrowed");
        let other: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(&*owned), "owned");
        assert_eq!(panic_message(&*borrowed), "borrowed");
        assert_eq!(panic_message(&*other), "non-string panic payload");
    }
}
