//! In-process stand-in for a brick, for capability tests.

use std::os::unix::net::UnixStream;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use brickwire_channel::{Channel, ChannelConfig};
use brickwire_frame::firmware::reply_status;
use brickwire_frame::{Command, FrameReader, FrameWriter, Reply};

use crate::brick::Brick;
use crate::session::SessionState;

pub(crate) const WAIT: Duration = Duration::from_secs(5);

/// Start a device thread that answers every reply-expecting command with the
/// payload chosen by `respond`, and forwards each received command to the test.
pub(crate) fn brick<F>(respond: F) -> (Brick<UnixStream>, mpsc::Receiver<Command>)
where
    F: Fn(&Command) -> Vec<u8> + Send + 'static,
{
    let (host, device) = UnixStream::pair().unwrap();
    let (seen_tx, seen_rx) = mpsc::channel();

    thread::spawn(move || {
        let mut reader = FrameReader::new(device.try_clone().unwrap());
        let mut writer = FrameWriter::new(device);
        while let Ok(command) = reader.read_command() {
            if command.expects_reply() {
                let reply = Reply::new(command.counter(), reply_status::DIRECT_OK, respond(&command));
                if writer.write_reply(&reply).is_err() {
                    break;
                }
            }
            if seen_tx.send(command).is_err() {
                break;
            }
        }
    });

    let mut config = ChannelConfig::default();
    config.frame.read_timeout = Some(Duration::from_millis(50));
    config.reply_timeout = WAIT;
    let channel = Arc::new(Channel::open(host, config).unwrap());
    (Brick::new(channel, Arc::new(SessionState::new())), seen_rx)
}

/// Payload of zeros sized to the command's global reservation.
pub(crate) fn zeros(command: &Command) -> Vec<u8> {
    vec![0; usize::from(command.reservation().global_bytes())]
}
