use brickwire_channel::Result;
use brickwire_frame::firmware::{op, LAYER_MASTER};
use brickwire_frame::BytecodeBuilder;
use brickwire_transport::BrickStream;

use crate::brick::Brick;

/// Rotation direction applied by `OUTPUT_POLARITY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Backward,
    Toggle,
    Forward,
}

impl Polarity {
    fn wire(self) -> i8 {
        match self {
            Polarity::Backward => -1,
            Polarity::Toggle => 0,
            Polarity::Forward => 1,
        }
    }
}

/// One or more output ports driven together.
#[derive(Debug)]
pub struct Motor<'a, S: BrickStream> {
    brick: &'a Brick<S>,
    ports: u8,
}

impl<'a, S: BrickStream> Motor<'a, S> {
    pub(crate) fn new(brick: &'a Brick<S>, ports: u8) -> Self {
        Self { brick, ports }
    }

    pub fn ports(&self) -> u8 {
        self.ports
    }

    /// Power without speed regulation, -100..=100.
    pub fn set_power(&self, power: i8) -> Result<()> {
        self.brick
            .command(self.output(op::OUTPUT_POWER).param_i8(power).build())
    }

    /// Regulated speed, -100..=100.
    pub fn set_speed(&self, speed: i8) -> Result<()> {
        self.brick
            .command(self.output(op::OUTPUT_SPEED).param_i8(speed).build())
    }

    pub fn start(&self) -> Result<()> {
        self.brick.command(self.output(op::OUTPUT_START).build())
    }

    /// Stop, either braking or coasting.
    pub fn stop(&self, brake: bool) -> Result<()> {
        self.brick.command(
            self.output(op::OUTPUT_STOP)
                .param_u8(u8::from(brake))
                .build(),
        )
    }

    pub fn set_polarity(&self, polarity: Polarity) -> Result<()> {
        self.brick.command(
            self.output(op::OUTPUT_POLARITY)
                .param_i8(polarity.wire())
                .build(),
        )
    }

    /// Tacho count in degrees of the lowest port in the set. An empty set is
    /// rejected by the brick.
    pub fn tacho_count(&self) -> Result<i32> {
        let code = BytecodeBuilder::new()
            .op(op::OUTPUT_GET_COUNT)
            .param_u8(LAYER_MASTER)
            .param_u8(self.ports.trailing_zeros() as u8)
            .global_index(0)
            .build();
        Ok(self.brick.query(code, 4)?.read_i32(0)?)
    }

    pub fn clear_count(&self) -> Result<()> {
        self.brick.command(self.output(op::OUTPUT_CLR_COUNT).build())
    }

    fn output(&self, opcode: u8) -> BytecodeBuilder {
        BytecodeBuilder::new()
            .op(opcode)
            .param_u8(LAYER_MASTER)
            .param_u8(self.ports)
    }
}
