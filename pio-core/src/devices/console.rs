//! System console ('04).
//!
//! Only the parts of the serial controller that programs actually use are
//! modelled: character in, character out, the receive-ready test, and the
//! device id / control word reads. Mode-setting OCPs are accepted and
//! ignored.

use std::time::Duration;

use log::{debug, trace};

use crate::dispatch::{Device, IoContext};
use crate::error::PioResult;
use crate::terminal::Terminal;

/// How long SKS '0704 waits for a character before giving up.
pub const POLL_TIMEOUT: Duration = Duration::from_millis(100);

const SKS_RECV_READY: u8 = 0o7;
const INA_OR_CHAR: u8 = 0o0;
const INA_CLEAR_CHAR: u8 = 0o10;
const INA_DEVICE_ID: u8 = 0o11;
const INA_CONTROL_WORD: u8 = 0o12;
const OTA_CHAR: u8 = 0o0;
const OTA_CONTROL_WORD: u8 = 0o1;

/// System console backed by a host terminal.
pub struct Console<T: Terminal> {
    terminal: T,
}

impl<T: Terminal> Console<T> {
    /// INA '1104 result.
    pub const DEVICE_ID: u16 = 0o4;
    /// INA '1204 result.
    pub const CONTROL_WORD: u16 = 0o4110;

    pub fn new(terminal: T) -> Self {
        Self { terminal }
    }

    pub fn terminal(&self) -> &T {
        &self.terminal
    }

    pub fn terminal_mut(&mut self) -> &mut T {
        &mut self.terminal
    }

    fn read_char(&mut self, io: &mut IoContext<'_>) -> PioResult<()> {
        let blocking = io.will_retry();
        let Some(ch) = self.terminal.read_byte(blocking)? else {
            trace!("console: no character ready (blocking={blocking})");
            return Ok(());
        };

        if io.func == INA_CLEAR_CHAR {
            io.machine.set_a(0);
        }
        let a = io.machine.a() | ch as u16 | 0x80;
        io.machine.set_a(a);
        debug!("console: character read='{a:o}: {:?}", (a & 0x7f) as u8 as char);
        io.skip();
        Ok(())
    }
}

impl<T: Terminal> Device for Console<T> {
    fn name(&self) -> &'static str {
        "console"
    }

    fn control(&mut self, _io: &mut IoContext<'_>) -> PioResult<()> {
        Ok(())
    }

    fn sense(&mut self, io: &mut IoContext<'_>) -> PioResult<()> {
        let ready = match io.func {
            // Transmitter side and status bits are always fine
            f if f < SKS_RECV_READY => true,
            SKS_RECV_READY => self.terminal.poll_input(POLL_TIMEOUT),
            _ => false,
        };
        if ready {
            io.skip();
        }
        Ok(())
    }

    fn input(&mut self, io: &mut IoContext<'_>) -> PioResult<()> {
        match io.func {
            INA_OR_CHAR | INA_CLEAR_CHAR => return self.read_char(io),
            INA_DEVICE_ID => io.machine.set_a(Self::DEVICE_ID),
            INA_CONTROL_WORD => io.machine.set_a(Self::CONTROL_WORD),
            _ => return Err(io.unsupported()),
        }
        io.skip();
        Ok(())
    }

    fn output(&mut self, io: &mut IoContext<'_>) -> PioResult<()> {
        match io.func {
            OTA_CHAR => {
                let ch = (io.machine.a() & 0x7f) as u8;
                debug!("console: char to write='{:o}: {:?}", io.machine.a(), ch as char);
                if ch > 0 {
                    self.terminal.write_byte(ch)?;
                }
            }
            OTA_CONTROL_WORD => {}
            _ => return Err(io.unsupported()),
        }
        io.skip();
        Ok(())
    }
}
