mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "brickwire", version, about = "Drive an EV3-class brick with direct commands")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "warn", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sensor_subcommand() {
        let cli = Cli::try_parse_from([
            "brickwire",
            "sensor",
            "tcp://127.0.0.1:5555",
            "--port",
            "2",
            "--mode",
            "1",
            "--values",
            "3",
        ])
        .expect("sensor args should parse");

        assert!(matches!(cli.command, Command::Sensor(_)));
    }

    #[test]
    fn rejects_power_with_stop() {
        let err = Cli::try_parse_from([
            "brickwire",
            "motor",
            "tcp://127.0.0.1:5555",
            "--ports",
            "A",
            "--power",
            "50",
            "--stop",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn rejects_malformed_endpoint() {
        let err = Cli::try_parse_from(["brickwire", "battery", "not-an-endpoint"])
            .expect_err("bad endpoint should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn parses_bare_bluetooth_address() {
        let cli = Cli::try_parse_from(["brickwire", "battery", "00:16:53:4f:a2:0c"])
            .expect("bluetooth address should parse");
        assert!(matches!(cli.command, Command::Battery(_)));
    }
}
