//! The single open unit image owned by a disk controller.

use log::{debug, warn};

use super::{DiskImage, DiskStore};

struct OpenUnit {
    name: String,
    image: Box<dyn DiskImage>,
}

/// Holds at most one open image.
///
/// Selecting the unit that is already open does nothing. Selecting any
/// other unit closes the current image before the new one is opened, so a
/// failed open never leaves the old image behind.
#[derive(Default)]
pub struct UnitSlot {
    current: Option<OpenUnit>,
}

impl UnitSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `name` the open image. Returns false if it could not be opened,
    /// in which case nothing is open.
    pub fn select(&mut self, store: &mut dyn DiskStore, name: &str) -> bool {
        if self.name() == Some(name) {
            return true;
        }

        if let Some(old) = self.current.take() {
            debug!("closing {}", old.name);
        }

        match store.open_unit(name) {
            Ok(image) => {
                debug!("opened {name}");
                self.current = Some(OpenUnit {
                    name: name.to_string(),
                    image,
                });
                true
            }
            Err(e) => {
                warn!("unable to open {name}: {e}");
                false
            }
        }
    }

    pub fn is_open(&self) -> bool {
        self.current.is_some()
    }

    /// Name of the open image.
    pub fn name(&self) -> Option<&str> {
        self.current.as_ref().map(|u| u.name.as_str())
    }

    /// The open image and its name.
    pub fn image_mut(&mut self) -> Option<(&str, &mut Box<dyn DiskImage>)> {
        self.current
            .as_mut()
            .map(|u| (u.name.as_str(), &mut u.image))
    }

    /// Close the open image, if any.
    pub fn release(&mut self) {
        if let Some(old) = self.current.take() {
            debug!("closing {}", old.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_select_and_reselect() {
        let mut store = MemoryStore::with_images([("dev26u0", vec![0; 8]), ("dev26u1", vec![0; 8])]);
        let mut slot = UnitSlot::new();
        assert!(!slot.is_open());

        assert!(slot.select(&mut store, "dev26u0"));
        assert_eq!(slot.name(), Some("dev26u0"));
        assert!(slot.select(&mut store, "dev26u0"));
        assert!(slot.select(&mut store, "dev26u1"));
        assert_eq!(slot.name(), Some("dev26u1"));

        slot.release();
        assert!(!slot.is_open());
    }

    #[test]
    fn test_failed_select_leaves_slot_empty() {
        let mut store = MemoryStore::with_images([("dev26u0", vec![0; 8])]);
        let mut slot = UnitSlot::new();
        assert!(slot.select(&mut store, "dev26u0"));
        assert!(!slot.select(&mut store, "dev26u2"));
        assert!(!slot.is_open());
        assert!(slot.image_mut().is_none());
    }
}
