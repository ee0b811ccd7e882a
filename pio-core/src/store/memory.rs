//! In-memory unit images.

use std::collections::HashMap;
use std::io::{self, Cursor};
use std::sync::Arc;

use super::{DiskImage, DiskStore};

/// Unit images held in memory, keyed by unit file name.
#[derive(Default, Clone)]
pub struct MemoryStore {
    images: HashMap<String, Arc<[u8]>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with initial images.
    pub fn with_images<I, S>(images: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<u8>)>,
        S: Into<String>,
    {
        let images = images
            .into_iter()
            .map(|(k, v)| (k.into(), Arc::from(v)))
            .collect();
        Self { images }
    }

    /// Add or replace an image.
    pub fn add_image(&mut self, name: &str, data: impl Into<Vec<u8>>) {
        self.images.insert(name.to_string(), Arc::from(data.into()));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.images.contains_key(name)
    }
}

impl DiskStore for MemoryStore {
    fn open_unit(&mut self, name: &str) -> io::Result<Box<dyn DiskImage>> {
        match self.images.get(name) {
            Some(data) => Ok(Box::new(Cursor::new(Arc::clone(data)))),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no image named {name}"),
            )),
        }
    }
}
