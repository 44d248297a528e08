use brickwire_channel::Result;
use brickwire_frame::firmware::{input_device, op, LAYER_MASTER, TYPE_KEEP};
use brickwire_frame::BytecodeBuilder;
use brickwire_transport::BrickStream;

use crate::brick::Brick;

/// Most values a single `READY_*` request returns.
pub const MAX_VALUES: u8 = 8;

/// One input port of the brick.
#[derive(Debug)]
pub struct Sensor<'a, S: BrickStream> {
    brick: &'a Brick<S>,
    port: u8,
}

impl<'a, S: BrickStream> Sensor<'a, S> {
    pub(crate) fn new(brick: &'a Brick<S>, port: u8) -> Self {
        Self { brick, port }
    }

    pub fn port(&self) -> u8 {
        self.port
    }

    /// First value of `mode`, in SI units.
    pub fn read_si(&self, mode: u8) -> Result<f32> {
        Ok(self.read_si_values(mode, 1)?.first().copied().unwrap_or_default())
    }

    /// Up to [`MAX_VALUES`] values of `mode`, in SI units.
    pub fn read_si_values(&self, mode: u8, count: u8) -> Result<Vec<f32>> {
        let count = count.clamp(1, MAX_VALUES);
        let code = (0..u16::from(count)).fold(
            self.ready(input_device::READY_SI, mode, count),
            |code, i| code.global_index(i * 4),
        );
        let reply = self.brick.query(code.build(), u16::from(count) * 4)?;
        Ok(reply.read_f32s(0, usize::from(count))?)
    }

    /// First value of `mode`, as a percentage.
    pub fn read_percent(&self, mode: u8) -> Result<u8> {
        let code = self
            .ready(input_device::READY_PCT, mode, 1)
            .global_index(0)
            .build();
        Ok(self.brick.query(code, 1)?.read_u8(0)?)
    }

    /// Device type and current mode reported for this port.
    pub fn type_mode(&self) -> Result<(u8, u8)> {
        let code = BytecodeBuilder::new()
            .op(op::INPUT_DEVICE)
            .param_u8(input_device::GET_TYPEMODE)
            .param_u8(LAYER_MASTER)
            .param_u8(self.port)
            .global_index(0)
            .global_index(1)
            .build();
        let reply = self.brick.query(code, 2)?;
        Ok((reply.read_u8(0)?, reply.read_u8(1)?))
    }

    fn ready(&self, subcommand: u8, mode: u8, count: u8) -> BytecodeBuilder {
        BytecodeBuilder::new()
            .op(op::INPUT_DEVICE)
            .param_u8(subcommand)
            .param_u8(LAYER_MASTER)
            .param_u8(self.port)
            .param_u8(TYPE_KEEP)
            .param_u8(mode)
            .param_u8(count)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use brickwire_frame::firmware::tag;

    use super::*;
    use crate::fake::{self, WAIT};

    #[test]
    fn read_si_encodes_ready_si_and_decodes_float() {
        let (brick, seen) = fake::brick(|_| 23.5f32.to_le_bytes().to_vec());

        let value = brick.sensor(2).read_si(1).unwrap();
        assert_eq!(value, 23.5);

        let command = seen.recv_timeout(WAIT).unwrap();
        assert_eq!(command.reservation().global_bytes(), 4);
        assert_eq!(
            command.bytecode().as_ref(),
            &[
                op::INPUT_DEVICE,
                tag::LC1,
                input_device::READY_SI,
                tag::LC1,
                LAYER_MASTER,
                tag::LC1,
                2,
                tag::LC1,
                TYPE_KEEP,
                tag::LC1,
                1,
                tag::LC1,
                1,
                tag::GV1,
                0,
            ]
        );
    }

    #[test]
    fn read_si_values_reserves_four_bytes_each() {
        let (brick, seen) = fake::brick(|command| {
            let count = usize::from(command.reservation().global_bytes()) / 4;
            (0..count).flat_map(|i| (i as f32).to_le_bytes()).collect()
        });

        let values = brick.sensor(0).read_si_values(0, 3).unwrap();
        assert_eq!(values, vec![0.0, 1.0, 2.0]);

        let command = seen.recv_timeout(WAIT).unwrap();
        assert_eq!(command.reservation().global_bytes(), 12);
        assert!(command
            .bytecode()
            .as_ref()
            .ends_with(&[tag::GV1, 0, tag::GV1, 4, tag::GV1, 8]));
    }

    #[test]
    fn read_percent_and_type_mode() {
        let (brick, _seen) = fake::brick(|command| {
            if command.reservation().global_bytes() == 2 {
                vec![29, 3]
            } else {
                vec![87]
            }
        });
        let sensor = brick.sensor(3);
        assert_eq!(sensor.read_percent(0).unwrap(), 87);
        assert_eq!(sensor.type_mode().unwrap(), (29, 3));
    }

    #[test]
    fn short_payload_is_an_error() {
        let (brick, _seen) = fake::brick(|_| vec![0x01]);
        assert!(brick.sensor(0).read_si(0).is_err());
    }
}
