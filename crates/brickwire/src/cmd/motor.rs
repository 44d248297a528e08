use crate::cmd::{open_session, parse_ports, with_brick, MotorArgs};
use crate::exit::{CliResult, SUCCESS};
use crate::output::{now_unix_seconds, print_record, ActionOutput, OutputFormat};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Power(i8),
    Speed(i8),
    Stop { brake: bool },
}

impl Action {
    fn from_args(args: &MotorArgs) -> Self {
        match (args.power, args.speed) {
            (Some(power), _) => Action::Power(power),
            (None, Some(speed)) => Action::Speed(speed),
            (None, None) => Action::Stop { brake: args.brake },
        }
    }

    fn describe(self) -> (&'static str, String) {
        match self {
            Action::Power(power) => ("power", power.to_string()),
            Action::Speed(speed) => ("speed", speed.to_string()),
            Action::Stop { brake: true } => ("stop", "brake".to_string()),
            Action::Stop { brake: false } => ("stop", "coast".to_string()),
        }
    }
}

pub fn run(args: MotorArgs, format: OutputFormat) -> CliResult<i32> {
    let ports = parse_ports(&args.ports)?;
    let action = Action::from_args(&args);

    let session = open_session(&args.connect)?;
    with_brick(&session, "motor command failed", move |brick| {
        let motor = brick.motor(ports);
        match action {
            Action::Power(power) => {
                motor.set_power(power)?;
                motor.start()
            }
            Action::Speed(speed) => {
                motor.set_speed(speed)?;
                motor.start()
            }
            Action::Stop { brake } => motor.stop(brake),
        }
    })?;

    let (name, value) = action.describe();
    print_record(
        &ActionOutput {
            endpoint: args.connect.endpoint.to_string(),
            action: name,
            detail: format!("ports={} {name}={value}", args.ports.to_ascii_uppercase()),
            timestamp: now_unix_seconds(),
        },
        format,
    );
    Ok(SUCCESS)
}
