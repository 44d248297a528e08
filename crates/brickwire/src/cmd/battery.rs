use crate::cmd::{open_session, with_brick, BatteryArgs};
use crate::exit::{CliResult, SUCCESS};
use crate::output::{now_unix_seconds, print_record, BatteryOutput, OutputFormat};

pub fn run(args: BatteryArgs, format: OutputFormat) -> CliResult<i32> {
    let session = open_session(&args.connect)?;
    let (voltage, level_percent) = with_brick(&session, "battery read failed", |brick| {
        Ok((brick.battery_voltage()?, brick.battery_level()?))
    })?;

    print_record(
        &BatteryOutput {
            endpoint: args.connect.endpoint.to_string(),
            voltage,
            level_percent,
            timestamp: now_unix_seconds(),
        },
        format,
    );
    Ok(SUCCESS)
}
