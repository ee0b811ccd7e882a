//! Unit images stored as files in a host directory.

use std::fs::File;
use std::io;
use std::path::PathBuf;

use super::{DiskImage, DiskStore};

/// Opens `<root>/<unit file name>` read-only.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl DiskStore for DirectoryStore {
    fn open_unit(&mut self, name: &str) -> io::Result<Box<dyn DiskImage>> {
        let file = File::open(self.root.join(name))?;
        Ok(Box::new(file))
    }
}
