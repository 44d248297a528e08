use crate::cmd::{open_session, parse_duration, with_brick, ToneArgs};
use crate::exit::{CliError, CliResult, SUCCESS, USAGE};
use crate::output::{now_unix_seconds, print_record, ActionOutput, OutputFormat};

pub fn run(args: ToneArgs, format: OutputFormat) -> CliResult<i32> {
    let duration = parse_duration(&args.duration)?;
    let duration_ms = u16::try_from(duration.as_millis())
        .map_err(|_| CliError::new(USAGE, "tone duration must be at most 65535ms"))?;

    let session = open_session(&args.connect)?;
    let (volume, frequency) = (args.volume, args.frequency);
    with_brick(&session, "tone failed", move |brick| {
        brick.play_tone(volume, frequency, duration_ms)
    })?;

    print_record(
        &ActionOutput {
            endpoint: args.connect.endpoint.to_string(),
            action: "tone",
            detail: format!("{frequency}Hz for {duration_ms}ms at volume {volume}"),
            timestamp: now_unix_seconds(),
        },
        format,
    );
    Ok(SUCCESS)
}
