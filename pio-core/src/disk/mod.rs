//! Disk controller ('26, '27).
//!
//! The controller is driven by channel programs: OTA '17 loads the Order
//! Address Register from A and the controller runs orders out of memory
//! until it reaches a halt. See [`order`] for the order formats and
//! [`channel`] for the interpreter.
//!
//! ```text
//! OCP '1626 = reset interrupt
//! OCP '1726 = reset controller
//! INA '0126 = input ID, clear A first
//! INA '1126 = input ID, don't clear A first
//! INA '1726 = read status
//! OTA '1726 = load OAR, ie, run channel program
//! ```

pub mod channel;
pub mod geometry;
pub mod order;

use log::debug;

use crate::dispatch::{Device, IoContext};
use crate::error::PioResult;
use crate::store::{DiskStore, UnitSlot};

pub use channel::{ChannelOutcome, ChannelState, STATUS_NOT_READY, STATUS_READY};
pub use geometry::DiskGeometry;
pub use order::{Order, Transfer};

const OCP_RESET_INTERRUPT: u8 = 0o16;
const OCP_RESET_CONTROLLER: u8 = 0o17;
const INA_ID: u8 = 0o01;
const INA_ID_OR: u8 = 0o11;
const INA_STATUS: u8 = 0o17;
const OTA_LOAD_OAR: u8 = 0o17;

/// A disk controller with up to four units behind it.
///
/// Only one unit image is open at a time. It stays open across channel
/// programs and is closed when another unit is selected or the controller
/// is dropped.
pub struct DiskController<S: DiskStore> {
    store: S,
    slot: UnitSlot,
    geometry: DiskGeometry,
}

impl<S: DiskStore> DiskController<S> {
    pub fn new(store: S) -> Self {
        Self::with_geometry(store, DiskGeometry::default())
    }

    pub fn with_geometry(store: S, geometry: DiskGeometry) -> Self {
        Self {
            store,
            slot: UnitSlot::new(),
            geometry,
        }
    }

    /// Name of the unit image currently open.
    pub fn open_unit(&self) -> Option<&str> {
        self.slot.name()
    }

    /// Close the open unit image.
    pub fn release(&mut self) {
        self.slot.release();
    }
}

impl<S: DiskStore> Device for DiskController<S> {
    fn name(&self) -> &'static str {
        "disk"
    }

    fn control(&mut self, io: &mut IoContext<'_>) -> PioResult<()> {
        match io.func {
            OCP_RESET_INTERRUPT => debug!("disk '{:02o}: reset interrupt", io.device),
            OCP_RESET_CONTROLLER => debug!("disk '{:02o}: reset controller", io.device),
            _ => {}
        }
        Ok(())
    }

    fn sense(&mut self, _io: &mut IoContext<'_>) -> PioResult<()> {
        // The controller never reports through SKS; programs poll status instead
        Ok(())
    }

    fn input(&mut self, io: &mut IoContext<'_>) -> PioResult<()> {
        let device = io.device as u16;
        let a = io.machine.a();
        match io.func {
            INA_ID => io.machine.set_a(device),
            INA_ID_OR => io.machine.set_a(a | device),
            INA_STATUS => io.machine.set_a(STATUS_READY),
            _ => return Err(io.unsupported()),
        }
        io.skip();
        Ok(())
    }

    fn output(&mut self, io: &mut IoContext<'_>) -> PioResult<()> {
        if io.func != OTA_LOAD_OAR {
            return Err(io.unsupported());
        }
        let oar = io.machine.a();
        let outcome = self.run_channel_program(io.machine, io.device, oar)?;
        debug!(
            "disk '{:02o}: channel program done, {} orders, status='{:o}",
            io.device, outcome.executed, outcome.status
        );
        io.skip();
        Ok(())
    }
}
