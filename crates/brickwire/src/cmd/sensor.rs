use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use brickwire_channel::ChannelError;
use brickwire_session::WorkerError;

use crate::cmd::{open_session, parse_duration, with_brick, BrickSession, SensorArgs};
use crate::exit::{channel_error, session_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{now_unix_seconds, print_record, OutputFormat, SensorOutput};

/// Longest single sleep in the watch loop, so cancellation is noticed promptly.
const CANCEL_POLL: Duration = Duration::from_millis(50);

pub fn run(args: SensorArgs, format: OutputFormat) -> CliResult<i32> {
    let session = open_session(&args.connect)?;
    let endpoint = args.connect.endpoint.to_string();
    let (port, mode, count) = (args.port, args.mode, args.values);

    if !args.watch {
        let values = with_brick(&session, "sensor read failed", move |brick| {
            brick.sensor(port).read_si_values(mode, count)
        })?;
        print_record(&reading(endpoint, port, mode, values), format);
        return Ok(SUCCESS);
    }

    let interval = parse_duration(&args.interval)?;
    let session = Arc::new(session);
    install_ctrlc_handler(Arc::clone(&session))?;

    let (failure_tx, failure_rx) = mpsc::channel::<ChannelError>();
    let limit = args.count;
    session
        .run(move |brick| {
            let sensor = brick.sensor(port);
            let mut taken = 0usize;
            while !brick.is_cancelled() && limit.is_none_or(|limit| taken < limit) {
                match sensor.read_si_values(mode, count) {
                    Ok(values) => print_record(&reading(endpoint.clone(), port, mode, values), format),
                    Err(err) => {
                        let _ = failure_tx.send(err);
                        return Err(WorkerError::Failed("sensor read failed".into()));
                    }
                }
                taken += 1;
                sleep_unless_cancelled(interval, || brick.is_cancelled());
            }
            Ok(())
        })
        .map_err(|err| session_error("watch failed", err))?;

    if !session.wait_idle(Duration::MAX) {
        return Err(CliError::new(INTERNAL, "watch worker did not stop"));
    }
    match failure_rx.try_recv() {
        Ok(err) => Err(channel_error("sensor read failed", err)),
        Err(_) => Ok(SUCCESS),
    }
}

fn reading(endpoint: String, port: u8, mode: u8, values: Vec<f32>) -> SensorOutput {
    SensorOutput {
        endpoint,
        port,
        mode,
        values,
        timestamp: now_unix_seconds(),
    }
}

fn sleep_unless_cancelled(total: Duration, cancelled: impl Fn() -> bool) {
    let deadline = Instant::now() + total;
    loop {
        let now = Instant::now();
        if now >= deadline || cancelled() {
            return;
        }
        std::thread::sleep(CANCEL_POLL.min(deadline - now));
    }
}

fn install_ctrlc_handler(session: Arc<BrickSession>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        session.cancel();
    })
    .map_err(|err| {
        CliError::new(
            INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    #[test]
    fn sleep_returns_early_when_cancelled() {
        let cancelled = AtomicBool::new(false);
        let started = Instant::now();
        cancelled.store(true, Ordering::SeqCst);
        sleep_unless_cancelled(Duration::from_secs(10), || cancelled.load(Ordering::SeqCst));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn sleep_runs_full_interval() {
        let started = Instant::now();
        sleep_unless_cancelled(Duration::from_millis(60), || false);
        assert!(started.elapsed() >= Duration::from_millis(60));
    }
}
