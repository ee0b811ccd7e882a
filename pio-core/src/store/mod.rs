//! Backing storage for disk units.
//!
//! This module provides the layered backing-store architecture:
//! - `DiskStore`: resolves a unit file name to an open image
//! - `DirectoryStore`: real files under a directory, opened read-only
//! - `MemoryStore`: in-memory images
//! - `UnitSlot`: the one image a controller may hold open at a time

mod directory;
mod memory;
mod slot;

use std::io::{self, Read, Seek};

pub use directory::DirectoryStore;
pub use memory::MemoryStore;
pub use slot::UnitSlot;

/// An open unit image. Dropping it closes it.
pub trait DiskImage: Read + Seek + Send {}

impl<T: Read + Seek + Send> DiskImage for T {}

/// Source of unit images.
pub trait DiskStore: Send {
    /// Open the named unit image for reading.
    fn open_unit(&mut self, name: &str) -> io::Result<Box<dyn DiskImage>>;
}

impl<S: DiskStore + ?Sized> DiskStore for Box<S> {
    fn open_unit(&mut self, name: &str) -> io::Result<Box<dyn DiskImage>> {
        (**self).open_unit(name)
    }
}

/// File name of a unit image: `dev<octal device>u<unit>`.
///
/// # Examples
/// ```
/// use pio_core::unit_file_name;
/// assert_eq!(unit_file_name(0o26, 0), "dev26u0");
/// assert_eq!(unit_file_name(0o27, 3), "dev27u3");
/// ```
pub fn unit_file_name(device: u8, unit: u8) -> String {
    format!("dev{:o}u{}", device, unit)
}
