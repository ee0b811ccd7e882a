//! Machine configuration.
//!
//! Describes which device sits at which address and where the disk
//! controllers find their unit images. Stored as JSON:
//!
//! ```json
//! {
//!   "diskDir": "/var/lib/prime/disks",
//!   "senseSwitches": 0,
//!   "devices": { "04": "console", "14": "tape", "20": "panel", "26": "disk" }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::devices::{addr, Console, ControlPanel, NullDevice, Tape};
use crate::disk::{DiskController, DiskGeometry};
use crate::dispatch::{DeviceBus, MAX_DEVICE};
use crate::error::{PioError, PioResult};
use crate::store::DirectoryStore;
use crate::terminal::Terminal;

/// Handler kind for a device address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Console,
    Tape,
    Panel,
    Disk,
    Null,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineConfig {
    /// Directory holding `dev<NN>u<U>` unit images
    #[serde(default = "default_disk_dir")]
    pub disk_dir: PathBuf,
    #[serde(default)]
    pub geometry: DiskGeometry,
    /// Initial control panel switch setting
    #[serde(default)]
    pub sense_switches: u16,
    /// Octal device address to handler kind
    #[serde(default = "default_devices")]
    pub devices: BTreeMap<String, DeviceKind>,
}

fn default_disk_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_devices() -> BTreeMap<String, DeviceKind> {
    [
        (addr::CONSOLE, DeviceKind::Console),
        (addr::TAPE, DeviceKind::Tape),
        (addr::CONTROL_PANEL, DeviceKind::Panel),
        (addr::DISK0, DeviceKind::Disk),
        (addr::DISK1, DeviceKind::Disk),
    ]
    .into_iter()
    .map(|(device, kind)| (format!("{device:02o}"), kind))
    .collect()
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            disk_dir: default_disk_dir(),
            geometry: DiskGeometry::default(),
            sense_switches: 0,
            devices: default_devices(),
        }
    }
}

/// Load a configuration file. The disk geometry is checked before it is
/// returned.
pub fn load_config(path: impl AsRef<Path>) -> PioResult<MachineConfig> {
    let text = std::fs::read_to_string(path.as_ref())?;
    let config: MachineConfig = serde_json::from_str(&text)?;
    config.geometry.validate()?;
    Ok(config)
}

/// Parse an octal device address, with or without a leading `'`.
pub fn parse_device(key: &str) -> PioResult<u8> {
    let digits = key.strip_prefix('\'').unwrap_or(key);
    match u8::from_str_radix(digits, 8) {
        Ok(device) if device <= MAX_DEVICE => Ok(device),
        _ => Err(PioError::Config(format!(
            "invalid device address {key:?}, expected octal 0-77"
        ))),
    }
}

impl MachineConfig {
    /// Devices in address order.
    pub fn device_map(&self) -> PioResult<Vec<(u8, DeviceKind)>> {
        self.devices
            .iter()
            .map(|(key, kind)| Ok((parse_device(key)?, *kind)))
            .collect()
    }

    /// Build the device bus. The terminal goes to the console; at most one
    /// console may be configured. Fails on an unusable disk geometry.
    pub fn build_bus<T: Terminal + 'static>(&self, terminal: T) -> PioResult<DeviceBus> {
        self.geometry.validate()?;
        let mut bus = DeviceBus::new();
        let mut terminal = Some(terminal);
        for (device, kind) in self.device_map()? {
            debug!("attach {kind:?} at '{device:02o}");
            match kind {
                DeviceKind::Console => {
                    let terminal = terminal.take().ok_or_else(|| {
                        PioError::Config(format!("second console at '{device:02o}"))
                    })?;
                    bus.attach(device, Console::new(terminal))?;
                }
                DeviceKind::Tape => bus.attach(device, Tape)?,
                DeviceKind::Panel => bus.attach(device, ControlPanel::new(self.sense_switches))?,
                DeviceKind::Disk => {
                    let store = DirectoryStore::new(&self.disk_dir);
                    bus.attach(device, DiskController::with_geometry(store, self.geometry))?;
                }
                DeviceKind::Null => bus.attach(device, NullDevice)?,
            }
        }
        Ok(bus)
    }
}
