//! Background reader that feeds replies to their waiting commands.

use std::io::Read;
use std::sync::Arc;

use brickwire_frame::{decode_reply, FrameError, FrameReader};
use tracing::{debug, error, info, warn};

use crate::pending::{CloseReason, Correlation};

/// Classification of a read failure, used to spot a failure that keeps repeating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Underlying I/O error of the given kind.
    Io(std::io::ErrorKind),
    /// Peer hung up, possibly mid-frame.
    ConnectionClosed,
    /// Length prefix over the configured maximum.
    Oversized,
    /// A complete frame whose body could not be decoded as a reply.
    Malformed,
}

impl FailureKind {
    pub fn of(err: &FrameError) -> Self {
        match err {
            FrameError::Io(io) => FailureKind::Io(io.kind()),
            FrameError::ConnectionClosed => FailureKind::ConnectionClosed,
            FrameError::FrameTooLarge { .. } => FailureKind::Oversized,
            _ => FailureKind::Malformed,
        }
    }
}

/// Counts consecutive identical read failures.
///
/// A repeat of the previous kind spends one unit. A different kind starts a
/// fresh run, already one unit down. Any good frame restores the full budget.
/// With a budget of `n`, exactly `n` identical failures in a row exhaust it.
#[derive(Debug, Clone)]
pub struct RetryBudget {
    initial: u32,
    remaining: u32,
    last: Option<FailureKind>,
}

impl RetryBudget {
    pub fn new(initial: u32) -> Self {
        let initial = initial.max(1);
        Self {
            initial,
            remaining: initial,
            last: None,
        }
    }

    /// Record a failure. Returns `true` once the budget is exhausted.
    pub fn record_failure(&mut self, kind: FailureKind) -> bool {
        if self.last == Some(kind) {
            self.remaining = self.remaining.saturating_sub(1);
        } else {
            self.last = Some(kind);
            self.remaining = self.initial - 1;
        }
        self.remaining == 0
    }

    pub fn record_success(&mut self) {
        self.remaining = self.initial;
        self.last = None;
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }
}

/// Read frames until stopped or the retry budget runs out.
///
/// Idle read timeouts are not failures: they only give the loop a chance to
/// notice a stop request.
pub(crate) fn run<R: Read>(
    mut reader: FrameReader<R>,
    correlation: Arc<Correlation>,
    mut budget: RetryBudget,
) {
    info!("spooler started");

    while !correlation.stop_requested() {
        let result = match reader.poll_body() {
            Ok(None) => continue,
            Ok(Some(body)) => decode_reply(body),
            Err(err) => Err(err),
        };

        match result {
            Ok(reply) => {
                budget.record_success();
                correlation.dispatch(reply);
            }
            Err(err) => {
                if correlation.stop_requested() {
                    break;
                }
                let kind = FailureKind::of(&err);
                if budget.record_failure(kind) {
                    error!(error = %err, ?kind, "read failures exhausted retry budget");
                    correlation.close(CloseReason::Terminated(err.to_string()));
                    return;
                }
                warn!(
                    error = %err,
                    ?kind,
                    remaining = budget.remaining(),
                    "reply read failed"
                );
            }
        }
    }

    debug!("spooler stopped");
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io::ErrorKind;
    use std::thread;
    use std::time::Duration;

    use brickwire_frame::firmware::reply_status;
    use brickwire_frame::{encode_reply, FrameConfig, Reply};
    use bytes::BytesMut;

    use super::*;
    use crate::error::ChannelError;

    #[test]
    fn identical_failures_exhaust_after_budget() {
        let mut budget = RetryBudget::new(5);
        let kind = FailureKind::Io(ErrorKind::ConnectionReset);
        for _ in 0..4 {
            assert!(!budget.record_failure(kind));
        }
        assert!(budget.record_failure(kind));
        assert!(budget.is_exhausted());
    }

    #[test]
    fn different_kind_restarts_run() {
        let mut budget = RetryBudget::new(5);
        let reset = FailureKind::Io(ErrorKind::ConnectionReset);
        for _ in 0..4 {
            assert!(!budget.record_failure(reset));
        }
        assert_eq!(budget.remaining(), 1);
        assert!(!budget.record_failure(FailureKind::Malformed));
        assert_eq!(budget.remaining(), 4);
    }

    #[test]
    fn alternating_kinds_never_exhaust() {
        let mut budget = RetryBudget::new(2);
        for i in 0..50 {
            let kind = if i % 2 == 0 {
                FailureKind::ConnectionClosed
            } else {
                FailureKind::Oversized
            };
            assert!(!budget.record_failure(kind));
        }
    }

    #[test]
    fn success_restores_budget() {
        let mut budget = RetryBudget::new(5);
        for _ in 0..4 {
            budget.record_failure(FailureKind::Malformed);
        }
        budget.record_success();
        assert_eq!(budget.remaining(), 5);
        for _ in 0..4 {
            assert!(!budget.record_failure(FailureKind::Malformed));
        }
    }

    #[test]
    fn budget_of_one_ends_on_first_failure() {
        let mut budget = RetryBudget::new(1);
        assert!(budget.record_failure(FailureKind::Malformed));
    }

    #[test]
    fn classify_frame_errors() {
        assert_eq!(
            FailureKind::of(&FrameError::Io(ErrorKind::BrokenPipe.into())),
            FailureKind::Io(ErrorKind::BrokenPipe)
        );
        assert_eq!(
            FailureKind::of(&FrameError::ConnectionClosed),
            FailureKind::ConnectionClosed
        );
        assert_eq!(
            FailureKind::of(&FrameError::Truncated {
                needed: 3,
                available: 1
            }),
            FailureKind::Malformed
        );
    }

    enum Step {
        Fail(ErrorKind),
        Bytes(Vec<u8>),
        Idle,
    }

    /// Plays back a script, then reports idle timeouts forever.
    struct Scripted {
        steps: VecDeque<Step>,
    }

    impl Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match self.steps.pop_front() {
                Some(Step::Fail(kind)) => Err(kind.into()),
                Some(Step::Idle) => Err(ErrorKind::WouldBlock.into()),
                Some(Step::Bytes(mut data)) => {
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                    if n < data.len() {
                        self.steps.push_front(Step::Bytes(data.split_off(n)));
                    }
                    Ok(n)
                }
                None => {
                    thread::sleep(Duration::from_millis(5));
                    Err(ErrorKind::WouldBlock.into())
                }
            }
        }
    }

    fn reply_frame(counter: u16) -> Step {
        let mut wire = BytesMut::new();
        encode_reply(
            &Reply::new(counter, reply_status::DIRECT_OK, vec![0xAAu8]),
            &mut wire,
        )
        .unwrap();
        Step::Bytes(wire.to_vec())
    }

    fn spawn(
        correlation: &Arc<Correlation>,
        steps: Vec<Step>,
        budget: u32,
    ) -> thread::JoinHandle<()> {
        let reader = FrameReader::with_config(
            Scripted {
                steps: steps.into(),
            },
            FrameConfig::default(),
        );
        let shared = Arc::clone(correlation);
        thread::spawn(move || run(reader, shared, RetryBudget::new(budget)))
    }

    #[test]
    fn budget_failures_terminate_and_fail_pending() {
        let correlation = Correlation::new();
        let (_, cell) = correlation.register().unwrap();
        let steps = (0..5)
            .map(|_| Step::Fail(ErrorKind::ConnectionReset))
            .collect();

        spawn(&correlation, steps, 5).join().unwrap();

        assert!(correlation.is_closed());
        assert!(matches!(
            cell.wait_timeout(Duration::ZERO),
            Some(Err(ChannelError::Terminated(_)))
        ));
    }

    #[test]
    fn failures_below_budget_keep_delivering() {
        let correlation = Correlation::new();
        let (first, first_cell) = correlation.register().unwrap();
        let (second, second_cell) = correlation.register().unwrap();

        let mut steps: Vec<Step> = Vec::new();
        for counter in [first, second] {
            steps.extend((0..4).map(|_| Step::Fail(ErrorKind::ConnectionReset)));
            steps.push(reply_frame(counter));
        }
        let handle = spawn(&correlation, steps, 5);

        for (counter, cell) in [(first, first_cell), (second, second_cell)] {
            let reply = cell.wait_timeout(Duration::from_secs(5)).unwrap().unwrap();
            assert_eq!(reply.counter(), counter);
        }
        assert!(!correlation.is_closed());

        correlation.request_stop();
        handle.join().unwrap();
    }

    #[test]
    fn malformed_body_counts_as_failure() {
        let correlation = Correlation::new();
        let steps = vec![Step::Bytes(vec![0x01, 0x00, 0x07])];
        spawn(&correlation, steps, 1).join().unwrap();
        assert!(correlation.is_closed());
    }

    #[test]
    fn idle_timeouts_do_not_spend_budget() {
        let correlation = Correlation::new();
        let handle = spawn(&correlation, Vec::new(), 1);
        thread::sleep(Duration::from_millis(50));
        assert!(!correlation.is_closed());

        correlation.request_stop();
        handle.join().unwrap();
        assert!(!correlation.is_closed());
    }

    #[test]
    fn idle_timeouts_do_not_restore_budget() {
        let correlation = Correlation::new();
        let steps = vec![
            Step::Fail(ErrorKind::ConnectionReset),
            Step::Idle,
            Step::Idle,
            Step::Fail(ErrorKind::ConnectionReset),
        ];

        spawn(&correlation, steps, 2).join().unwrap();
        assert!(correlation.is_closed());
    }

    #[test]
    fn hangup_terminates_channel() {
        let correlation = Correlation::new();
        let reader = FrameReader::new(std::io::empty());
        run(reader, Arc::clone(&correlation), RetryBudget::new(3));
        assert!(correlation.is_closed());
    }
}
