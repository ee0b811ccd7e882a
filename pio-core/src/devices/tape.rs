//! Magtape controller stub ('14).
//!
//! No tape is ever mounted. Status and control pulses are accepted without
//! effect; a transfer only fails when the program would wait for it forever.

use log::warn;

use crate::dispatch::{Device, IoContext};
use crate::error::{PioError, PioResult};

#[derive(Debug, Default, Clone, Copy)]
pub struct Tape;

impl Tape {
    fn transfer(&self, io: &IoContext<'_>) -> PioResult<()> {
        if io.will_retry() {
            return Err(PioError::DeviceHang(io.device));
        }
        warn!("tape: transfer on '{:02o} ignored, no drive attached", io.device);
        Ok(())
    }
}

impl Device for Tape {
    fn name(&self) -> &'static str {
        "tape"
    }

    fn control(&mut self, _io: &mut IoContext<'_>) -> PioResult<()> {
        Ok(())
    }

    fn sense(&mut self, _io: &mut IoContext<'_>) -> PioResult<()> {
        Ok(())
    }

    fn input(&mut self, io: &mut IoContext<'_>) -> PioResult<()> {
        self.transfer(io)
    }

    fn output(&mut self, io: &mut IoContext<'_>) -> PioResult<()> {
        self.transfer(io)
    }
}
