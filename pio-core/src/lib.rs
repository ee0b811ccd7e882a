//! Programmed-I/O device layer for a 16-bit minicomputer emulator
//!
//! This crate provides the I/O side of the machine:
//! - Decoding and dispatch of OCP/SKS/INA/OTA instructions
//! - Console, tape, control panel and null device handlers
//! - A disk controller that runs channel programs out of main memory
//!
//! # Architecture
//!
//! The CPU is not part of this crate. It owns memory and registers and
//! exposes them through the [`Machine`] trait:
//! - `DeviceBus`: routes an I/O instruction to the `Device` at its address
//! - `Terminal` trait: character I/O behind the console
//! - `DiskStore` trait: where disk unit images come from
//! - `MachineConfig`: JSON description of the device map

pub mod config;
pub mod devices;
pub mod disk;
pub mod dispatch;
pub mod error;
pub mod machine;
pub mod store;
pub mod terminal;

pub use config::{load_config, DeviceKind, MachineConfig};
pub use devices::{Console, ControlPanel, NullDevice, Tape};
pub use disk::{ChannelOutcome, DiskController, DiskGeometry, Order, Transfer};
pub use dispatch::{Device, DeviceBus, IoClass, IoContext, PioInstruction};
pub use error::{PioError, PioResult};
pub use machine::{detect_retry_loop, io_skip, CoreMachine, Machine};
pub use store::{unit_file_name, DirectoryStore, DiskImage, DiskStore, MemoryStore};
pub use terminal::{HeadlessTerminal, Terminal};
