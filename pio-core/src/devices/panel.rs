//! Control panel switches and lights ('20).

use log::debug;

use crate::dispatch::{Device, IoContext};
use crate::error::PioResult;

/// INA '1620: read sense switches.
const INA_SWITCHES: u8 = 0o16;
/// OTA '1720: write lights.
const OTA_LIGHTS: u8 = 0o17;

#[derive(Debug, Default, Clone, Copy)]
pub struct ControlPanel {
    switches: u16,
    lights: u16,
}

impl ControlPanel {
    pub fn new(switches: u16) -> Self {
        Self {
            switches,
            lights: 0,
        }
    }

    /// Last value written to the lights.
    pub fn lights(&self) -> u16 {
        self.lights
    }
}

impl Device for ControlPanel {
    fn name(&self) -> &'static str {
        "control panel"
    }

    fn control(&mut self, io: &mut IoContext<'_>) -> PioResult<()> {
        Err(io.unsupported())
    }

    fn sense(&mut self, io: &mut IoContext<'_>) -> PioResult<()> {
        Err(io.unsupported())
    }

    fn input(&mut self, io: &mut IoContext<'_>) -> PioResult<()> {
        match io.func {
            // The switch read never skips
            INA_SWITCHES => {
                io.machine.set_a(self.switches);
                Ok(())
            }
            _ => Err(io.unsupported()),
        }
    }

    fn output(&mut self, io: &mut IoContext<'_>) -> PioResult<()> {
        match io.func {
            OTA_LIGHTS => {
                self.lights = io.machine.a();
                debug!("panel: lights='{:o}", self.lights);
                io.skip();
                Ok(())
            }
            _ => Err(io.unsupported()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::IoClass;
    use crate::machine::{detect_retry_loop, CoreMachine, Machine};

    #[test]
    fn test_switches_and_lights() {
        let mut panel = ControlPanel::new(0o1234);
        let mut m = CoreMachine::new();
        m.set_rp(0o10);

        let mut io = IoContext::new(&mut m, IoClass::Input, 0o16, 0o20, detect_retry_loop);
        panel.input(&mut io).unwrap();
        assert_eq!(m.a(), 0o1234);
        assert_eq!(m.rp(), 0o10);

        m.set_a(0o777);
        let mut io = IoContext::new(&mut m, IoClass::Output, 0o17, 0o20, detect_retry_loop);
        panel.output(&mut io).unwrap();
        assert_eq!(panel.lights(), 0o777);
        assert_eq!(m.rp(), 0o11);
    }

    #[test]
    fn test_panel_rejects_control_and_sense() {
        let mut panel = ControlPanel::default();
        let mut m = CoreMachine::new();
        let mut io = IoContext::new(&mut m, IoClass::Control, 0, 0o20, detect_retry_loop);
        assert!(panel.control(&mut io).is_err());
        let mut io = IoContext::new(&mut m, IoClass::Sense, 0, 0o20, detect_retry_loop);
        assert!(panel.sense(&mut io).is_err());
        let mut io = IoContext::new(&mut m, IoClass::Input, 0o14, 0o20, detect_retry_loop);
        assert!(panel.input(&mut io).is_err());
    }
}
