use std::sync::mpsc;
use std::time::Duration;

use brickwire_channel::{ChannelConfig, ChannelError};
use brickwire_session::{Brick, DeviceSession};
use brickwire_transport::{AnyStream, Endpoint};
use clap::{ArgGroup, Args, Subcommand};
use tracing::info;

use crate::exit::{channel_error, session_error, transport_error, CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod battery;
pub mod motor;
pub mod sensor;
pub mod tone;
pub mod version;

pub type BrickSession = DeviceSession<AnyStream>;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Read battery voltage and charge level.
    Battery(BatteryArgs),
    /// Read an input port, once or continuously.
    Sensor(SensorArgs),
    /// Drive or stop output ports.
    Motor(MotorArgs),
    /// Play a tone on the brick speaker.
    Tone(ToneArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Battery(args) => battery::run(args, format),
        Command::Sensor(args) => sensor::run(args, format),
        Command::Motor(args) => motor::run(args, format),
        Command::Tone(args) => tone::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ConnectArgs {
    /// Brick endpoint: rfcomm://ADDR[/CHANNEL], a bare Bluetooth address,
    /// tcp://HOST:PORT or unix://PATH.
    pub endpoint: Endpoint,
    /// Maximum wait for each reply (e.g. 5s, 500ms).
    #[arg(long, default_value = "30s")]
    pub reply_timeout: String,
    /// Socket read timeout, also the idle poll interval of the reply reader.
    #[arg(long, default_value = "500ms")]
    pub read_timeout: String,
}

#[derive(Args, Debug)]
pub struct BatteryArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
}

#[derive(Args, Debug)]
pub struct SensorArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Input port (0-3, or 16-19 for a motor's tacho side).
    #[arg(long, short = 'p')]
    pub port: u8,
    /// Sensor mode.
    #[arg(long, short = 'm', default_value = "0")]
    pub mode: u8,
    /// Number of values to read (1-8).
    #[arg(long, default_value = "1", value_parser = clap::value_parser!(u8).range(1..=8))]
    pub values: u8,
    /// Keep reading until interrupted.
    #[arg(long)]
    pub watch: bool,
    /// Delay between readings with --watch (e.g. 1s, 250ms).
    #[arg(long, default_value = "1s")]
    pub interval: String,
    /// Stop after N readings with --watch.
    #[arg(long, requires = "watch")]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("action").required(true).args(["power", "speed", "stop"])))]
pub struct MotorArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Output ports, any of A, B, C, D (e.g. "BC").
    #[arg(long)]
    pub ports: String,
    /// Unregulated power, -100 to 100, then start.
    #[arg(long, allow_negative_numbers = true)]
    pub power: Option<i8>,
    /// Regulated speed, -100 to 100, then start.
    #[arg(long, allow_negative_numbers = true)]
    pub speed: Option<i8>,
    /// Stop the ports.
    #[arg(long)]
    pub stop: bool,
    /// Brake instead of coasting when stopping.
    #[arg(long, requires = "stop")]
    pub brake: bool,
}

#[derive(Args, Debug)]
pub struct ToneArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Frequency in Hz.
    #[arg(long, default_value = "440")]
    pub frequency: u16,
    /// Duration (e.g. 500ms, 1s).
    #[arg(long, default_value = "200ms")]
    pub duration: String,
    /// Volume, 0-100.
    #[arg(long, default_value = "50", value_parser = clap::value_parser!(u8).range(0..=100))]
    pub volume: u8,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Connect to the brick named by `args`.
pub fn open_session(args: &ConnectArgs) -> CliResult<BrickSession> {
    let mut config = ChannelConfig {
        reply_timeout: parse_duration(&args.reply_timeout)?,
        ..ChannelConfig::default()
    };
    config.frame.read_timeout = Some(parse_duration(&args.read_timeout)?);

    let mut transport = args
        .endpoint
        .transport()
        .map_err(|err| transport_error("invalid endpoint", err))?;
    info!(endpoint = %args.endpoint, "connecting");
    DeviceSession::connect(&mut transport, config)
        .map_err(|err| session_error("connect failed", err))
}

/// Run `task` as the session's worker and hand its result back to the caller.
pub fn with_brick<T, F>(session: &BrickSession, context: &str, task: F) -> CliResult<T>
where
    T: Send + 'static,
    F: FnOnce(&Brick<AnyStream>) -> Result<T, ChannelError> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    session
        .run(move |brick| {
            let _ = tx.send(task(&brick));
            Ok(())
        })
        .map_err(|err| session_error(context, err))?;

    let result = rx
        .recv()
        .map_err(|_| CliError::new(INTERNAL, format!("{context}: worker exited without a result")))?;
    result.map_err(|err| channel_error(context, err))
}

/// Parse a port list such as "BC" into an output port bitmask.
pub fn parse_ports(input: &str) -> CliResult<u8> {
    use brickwire_frame::firmware::output_port;

    let mut mask = 0u8;
    for ch in input.trim().chars() {
        mask |= match ch.to_ascii_uppercase() {
            'A' => output_port::A,
            'B' => output_port::B,
            'C' => output_port::C,
            'D' => output_port::D,
            ',' | ' ' => continue,
            other => {
                return Err(CliError::new(
                    USAGE,
                    format!("invalid port '{other}': expected A, B, C or D"),
                ))
            }
        };
    }
    if mask == 0 {
        return Err(CliError::new(USAGE, "at least one port is required"));
    }
    Ok(mask)
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

#[cfg(test)]
mod tests {
    use brickwire_frame::firmware::output_port;

    use super::*;

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_zero_and_garbage() {
        assert_eq!(parse_duration("0s").unwrap_err().code, USAGE);
        assert_eq!(parse_duration("fast").unwrap_err().code, USAGE);
        assert_eq!(parse_duration(" ").unwrap_err().code, USAGE);
    }

    #[test]
    fn parse_ports_builds_mask() {
        assert_eq!(parse_ports("bc").unwrap(), output_port::B | output_port::C);
        assert_eq!(parse_ports("A,D").unwrap(), output_port::A | output_port::D);
        assert_eq!(parse_ports("ABCD").unwrap(), output_port::ALL);
    }

    #[test]
    fn parse_ports_rejects_unknown_and_empty() {
        assert_eq!(parse_ports("E").unwrap_err().code, USAGE);
        assert_eq!(parse_ports("").unwrap_err().code, USAGE);
    }
}
