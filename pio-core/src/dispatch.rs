//! Device dispatch contract.
//!
//! Every programmed-I/O instruction names a class (OCP, SKS, INA, OTA), a
//! 4-bit function code and a 6-bit device address. The [`DeviceBus`] routes
//! it to the [`Device`] registered at that address. Devices report success
//! through [`IoContext::skip`] and reject anything they don't implement with
//! [`IoContext::unsupported`].

use std::collections::HashMap;
use std::fmt;

use log::debug;

use crate::devices::NullDevice;
use crate::error::{PioError, PioResult};
use crate::machine::{detect_retry_loop, io_skip, Machine, RetryDetector};

/// Highest device address.
pub const MAX_DEVICE: u8 = 0o77;

/// The four programmed-I/O instruction classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum IoClass {
    /// 0: OCP, output control pulse
    Control = 0,
    /// 1: SKS, skip if condition satisfied
    Sense = 1,
    /// 2: INA, input to A
    Input = 2,
    /// 3: OTA, output from A
    Output = 3,
}

impl IoClass {
    pub fn mnemonic(self) -> &'static str {
        match self {
            IoClass::Control => "OCP",
            IoClass::Sense => "SKS",
            IoClass::Input => "INA",
            IoClass::Output => "OTA",
        }
    }
}

impl TryFrom<u8> for IoClass {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Control),
            1 => Ok(Self::Sense),
            2 => Ok(Self::Input),
            3 => Ok(Self::Output),
            _ => Err(value),
        }
    }
}

impl fmt::Display for IoClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// A decoded programmed-I/O instruction word.
///
/// Layout: bits 15..14 class, bits 13..10 `0b1100`, bits 9..6 function,
/// bits 5..0 device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PioInstruction {
    pub class: IoClass,
    pub func: u8,
    pub device: u8,
}

impl PioInstruction {
    const OPCODE_MASK: u16 = 0o36000;
    const OPCODE: u16 = 0o30000;

    /// Decode an instruction word. Returns None if it isn't an I/O
    /// instruction.
    pub fn decode(word: u16) -> Option<Self> {
        if word & Self::OPCODE_MASK != Self::OPCODE {
            return None;
        }
        let class = IoClass::try_from((word >> 14) as u8).ok()?;
        Some(Self {
            class,
            func: ((word >> 6) & 0o17) as u8,
            device: (word & 0o77) as u8,
        })
    }

    pub fn encode(self) -> u16 {
        ((self.class as u16) << 14)
            | Self::OPCODE
            | (((self.func & 0o17) as u16) << 6)
            | (self.device & MAX_DEVICE) as u16
    }
}

impl fmt::Display for PioInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{:02o}{:02o}", self.class, self.func, self.device)
    }
}

/// Everything a device handler gets to see while executing one instruction.
pub struct IoContext<'a> {
    pub machine: &'a mut dyn Machine,
    pub class: IoClass,
    pub func: u8,
    pub device: u8,
    retry: RetryDetector,
}

impl<'a> IoContext<'a> {
    pub fn new(
        machine: &'a mut dyn Machine,
        class: IoClass,
        func: u8,
        device: u8,
        retry: RetryDetector,
    ) -> Self {
        Self {
            machine,
            class,
            func,
            device,
            retry,
        }
    }

    /// Signal success.
    pub fn skip(&mut self) {
        io_skip(self.machine);
    }

    /// True if the program spins on this instruction until it succeeds.
    pub fn will_retry(&self) -> bool {
        (self.retry)(&*self.machine)
    }

    /// The error for a function code this device doesn't implement.
    pub fn unsupported(&self) -> PioError {
        PioError::Unsupported {
            class: self.class,
            func: self.func,
            device: self.device,
        }
    }
}

/// A peripheral reachable through programmed I/O.
///
/// All four classes must be handled. A function code a device doesn't know
/// is an error, not a silent no-op.
pub trait Device: Send {
    /// Short name for diagnostics.
    fn name(&self) -> &'static str;

    /// OCP: reset or mode-set side effects. Never skips.
    fn control(&mut self, io: &mut IoContext<'_>) -> PioResult<()>;

    /// SKS: skip if the device condition holds.
    fn sense(&mut self, io: &mut IoContext<'_>) -> PioResult<()>;

    /// INA: load A from the device, skip on success.
    fn input(&mut self, io: &mut IoContext<'_>) -> PioResult<()>;

    /// OTA: send A to the device (or start an operation), skip on success.
    fn output(&mut self, io: &mut IoContext<'_>) -> PioResult<()>;
}

/// Device registry keyed by device address.
pub struct DeviceBus {
    devices: HashMap<u8, Box<dyn Device>>,
    null: NullDevice,
    retry: RetryDetector,
}

impl Default for DeviceBus {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceBus {
    pub fn new() -> Self {
        Self {
            devices: HashMap::new(),
            null: NullDevice,
            retry: detect_retry_loop,
        }
    }

    /// Register a device. Replaces whatever was attached at that address.
    pub fn attach(&mut self, device: u8, handler: impl Device + 'static) -> PioResult<()> {
        if device > MAX_DEVICE {
            return Err(PioError::Config(format!(
                "device address '{device:o} out of range"
            )));
        }
        self.devices.insert(device, Box::new(handler));
        Ok(())
    }

    /// Name of the device that answers at `device`.
    pub fn device_name(&self, device: u8) -> &'static str {
        self.devices
            .get(&device)
            .map(|d| d.name())
            .unwrap_or_else(|| self.null.name())
    }

    /// Replace the busy-loop detector used by blocking devices.
    pub fn set_retry_detector(&mut self, retry: RetryDetector) {
        self.retry = retry;
    }

    /// Route one I/O operation to its device.
    pub fn dispatch(
        &mut self,
        machine: &mut dyn Machine,
        class: IoClass,
        func: u8,
        device: u8,
    ) -> PioResult<()> {
        let ins = PioInstruction {
            class,
            func,
            device,
        };
        let handler: &mut dyn Device = match self.devices.get_mut(&device) {
            Some(d) => d.as_mut(),
            None => &mut self.null,
        };
        debug!("{ins} ({})", handler.name());

        let mut io = IoContext::new(machine, class, func, device, self.retry);
        match class {
            IoClass::Control => handler.control(&mut io),
            IoClass::Sense => handler.sense(&mut io),
            IoClass::Input => handler.input(&mut io),
            IoClass::Output => handler.output(&mut io),
        }
    }

    /// Decode and execute an I/O instruction word.
    pub fn execute(&mut self, machine: &mut dyn Machine, word: u16) -> PioResult<()> {
        let ins = PioInstruction::decode(word).ok_or(PioError::NotIoInstruction(word))?;
        self.dispatch(machine, ins.class, ins.func, ins.device)
    }
}
