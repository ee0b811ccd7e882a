//! Device that answers at every unmapped address.

use crate::dispatch::{Device, IoContext};
use crate::error::PioResult;

/// Always-ready device that accepts only function 0 (and OTA function 1).
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDevice;

impl Device for NullDevice {
    fn name(&self) -> &'static str {
        "null"
    }

    fn control(&mut self, io: &mut IoContext<'_>) -> PioResult<()> {
        match io.func {
            0 => Ok(()),
            _ => Err(io.unsupported()),
        }
    }

    fn sense(&mut self, io: &mut IoContext<'_>) -> PioResult<()> {
        match io.func {
            0 => {
                io.skip();
                Ok(())
            }
            _ => Err(io.unsupported()),
        }
    }

    fn input(&mut self, io: &mut IoContext<'_>) -> PioResult<()> {
        // Accepted, but there is never any data so it doesn't skip
        match io.func {
            0 => Ok(()),
            _ => Err(io.unsupported()),
        }
    }

    fn output(&mut self, io: &mut IoContext<'_>) -> PioResult<()> {
        match io.func {
            0 | 1 => {
                io.skip();
                Ok(())
            }
            _ => Err(io.unsupported()),
        }
    }
}
