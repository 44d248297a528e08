use std::sync::Arc;

use brickwire_channel::{Channel, Result};
use brickwire_frame::firmware::{op, sound, ui_read};
use brickwire_frame::{Bytecode, BytecodeBuilder, Reply};
use brickwire_transport::BrickStream;

use crate::motor::Motor;
use crate::sensor::Sensor;
use crate::session::SessionState;

/// Capability object handed to a worker program.
///
/// Getters send one reply-expecting command and decode the payload; setters
/// send one no-reply command.
pub struct Brick<S: BrickStream> {
    channel: Arc<Channel<S>>,
    state: Arc<SessionState>,
}

impl<S: BrickStream> Brick<S> {
    pub(crate) fn new(channel: Arc<Channel<S>>, state: Arc<SessionState>) -> Self {
        Self { channel, state }
    }

    /// Poll this from worker loops; `true` once the session asked the worker to stop.
    pub fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }

    /// Raw channel, for commands not covered by the typed helpers.
    pub fn channel(&self) -> &Channel<S> {
        &self.channel
    }

    /// Battery voltage in volts.
    pub fn battery_voltage(&self) -> Result<f32> {
        let code = BytecodeBuilder::new()
            .op(op::UI_READ)
            .param_u8(ui_read::GET_VBATT)
            .global_index(0)
            .build();
        Ok(self.query(code, 4)?.read_f32(0)?)
    }

    /// Battery charge in percent.
    pub fn battery_level(&self) -> Result<u8> {
        let code = BytecodeBuilder::new()
            .op(op::UI_READ)
            .param_u8(ui_read::GET_LBATT)
            .global_index(0)
            .build();
        Ok(self.query(code, 1)?.read_u8(0)?)
    }

    /// Input port 0..=3 (or 16..=19 to read a motor's sensor side).
    pub fn sensor(&self, port: u8) -> Sensor<'_, S> {
        Sensor::new(self, port)
    }

    /// Output ports as a bitmask of `firmware::output_port` values.
    pub fn motor(&self, ports: u8) -> Motor<'_, S> {
        Motor::new(self, ports)
    }

    /// Play a tone. `volume` is 0..=100, `frequency` in Hz, `duration_ms` in milliseconds.
    pub fn play_tone(&self, volume: u8, frequency: u16, duration_ms: u16) -> Result<()> {
        let code = BytecodeBuilder::new()
            .op(op::SOUND)
            .param_u8(sound::TONE)
            .param_u8(volume)
            .param_u16(frequency)
            .param_u16(duration_ms)
            .build();
        self.command(code)
    }

    pub fn stop_sound(&self) -> Result<()> {
        let code = BytecodeBuilder::new()
            .op(op::SOUND)
            .param_u8(sound::BREAK)
            .build();
        self.command(code)
    }

    /// Send `code` with `global` reply bytes and wait for a successful reply.
    pub(crate) fn query(&self, code: Bytecode, global: u16) -> Result<Reply> {
        self.channel.send_with_reply(code, 0, global)?.get_ok()
    }

    pub(crate) fn command(&self, code: Bytecode) -> Result<()> {
        self.channel.send_no_reply(code, 0, 0).map(|_| ())
    }
}

impl<S: BrickStream> std::fmt::Debug for Brick<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Brick")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
