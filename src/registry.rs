//! Process-wide drive registry (§4.5 "Drive registry"): a fixed-capacity array of drive records
//! with a high-water mark, a whitelist that filters enumeration, and the single-flight `scan`
//! operation.
//!
//! §1 explicitly excludes the low-level ATA/SG device-probing heuristics from this crate's scope
//! ("ATA/SG device enumeration"); `scan_paths` only discovers candidate device paths via the
//! `cdio` collaborator and filters them, leaving the actual open/inquire/release sequence to the
//! caller (normally `Library::scan`, §4.5).

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::drive::Drive;

/// §4.5 "process-wide fixed-capacity array (≥ 255 slots)".
pub const DEFAULT_CAPACITY: usize = 255;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    #[error("drive registry is full ({0} slots)")]
    Full(usize),
    #[error("a scan is already in progress")]
    ScanInProgress,
    #[error("no drive registered at slot {0}")]
    NoSuchSlot(usize),
}

pub struct DriveRegistry {
    slots: Mutex<Vec<Option<Arc<Drive>>>>,
    high_water_mark: AtomicUsize,
    whitelist: Mutex<Vec<String>>,
    scanning: AtomicBool,
}

impl DriveRegistry {
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            slots: Mutex::new(slots),
            high_water_mark: AtomicUsize::new(0),
            whitelist: Mutex::new(Vec::new()),
            scanning: AtomicBool::new(false),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.lock().unwrap().len()
    }

    pub fn high_water_mark(&self) -> usize {
        self.high_water_mark.load(Ordering::Acquire)
    }

    pub fn set_whitelist(&self, paths: Vec<String>) {
        *self.whitelist.lock().unwrap() = paths;
    }

    pub fn whitelist(&self) -> Vec<String> {
        self.whitelist.lock().unwrap().clone()
    }

    fn is_whitelisted(&self, path: &str) -> bool {
        let whitelist = self.whitelist.lock().unwrap();
        whitelist.is_empty() || whitelist.iter().any(|w| w == path)
    }

    /// Registers a drive in the first free slot, assigning its `global_index`. Grows the
    /// high-water mark but never the backing array past `capacity()`.
    pub fn register(&self, drive: Arc<Drive>) -> Result<usize, RegistryError> {
        let mut slots = self.slots.lock().unwrap();
        let idx = slots.iter().position(Option::is_none).ok_or(RegistryError::Full(slots.len()))?;

        drive.set_global_index(idx as i32);
        slots[idx] = Some(drive);

        let hwm = self.high_water_mark.load(Ordering::Acquire);
        if idx + 1 > hwm {
            self.high_water_mark.store(idx + 1, Ordering::Release);
        }
        Ok(idx)
    }

    /// Frees a slot; per §3 the drive marks itself free via `global_index = -1` rather than the
    /// registry bookkeeping a separate liveness flag.
    pub fn free(&self, index: usize) -> Result<(), RegistryError> {
        let mut slots = self.slots.lock().unwrap();
        let slot = slots.get_mut(index).ok_or(RegistryError::NoSuchSlot(index))?;
        let drive = slot.take().ok_or(RegistryError::NoSuchSlot(index))?;
        drive.set_global_index(-1);
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<Arc<Drive>> {
        self.slots.lock().unwrap().get(index).and_then(Clone::clone)
    }

    /// All currently-registered drives, in slot order.
    pub fn drives(&self) -> Vec<Arc<Drive>> {
        self.slots.lock().unwrap().iter().flatten().cloned().collect()
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::Acquire)
    }

    /// Discovers candidate device paths, filtered by the whitelist (§4.5 "Enumeration is filtered
    /// by the whitelist if non-empty"). Single-flight: refuses to run concurrently with another
    /// scan.
    pub fn scan_paths(&self) -> Result<Vec<String>, RegistryError> {
        if self.scanning.swap(true, Ordering::AcqRel) {
            return Err(RegistryError::ScanInProgress);
        }

        let paths = crate::cdio::list_drives().into_iter().filter(|p| self.is_whitelisted(p)).collect();

        self.scanning.store(false, Ordering::Release);
        Ok(paths)
    }
}

impl Default for DriveRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::null::NullBackend;
    use crate::drive::DriveRole;

    fn test_drive() -> Arc<Drive> {
        Arc::new(Drive::new("TEST", "DRIVE", "1.0", DriveRole::Null, Box::new(NullBackend)))
    }

    #[test]
    fn register_assigns_global_index() {
        let registry = DriveRegistry::new(4);
        let drive = test_drive();
        let idx = registry.register(drive.clone()).unwrap();
        assert_eq!(idx, 0);
        assert_eq!(drive.global_index(), 0);
        assert_eq!(registry.high_water_mark(), 1);
    }

    #[test]
    fn free_resets_global_index_to_sentinel() {
        let registry = DriveRegistry::new(4);
        let drive = test_drive();
        let idx = registry.register(drive.clone()).unwrap();
        registry.free(idx).unwrap();
        assert_eq!(drive.global_index(), -1);
        assert!(registry.get(idx).is_none());
    }

    #[test]
    fn full_registry_refuses_registration() {
        let registry = DriveRegistry::new(1);
        registry.register(test_drive()).unwrap();
        assert_eq!(registry.register(test_drive()), Err(RegistryError::Full(1)));
    }

    #[test]
    fn whitelist_filters_scan_paths() {
        let registry = DriveRegistry::new(4);
        registry.set_whitelist(vec!["/dev/sr0".to_string()]);
        assert!(registry.is_whitelisted("/dev/sr0"));
        assert!(!registry.is_whitelisted("/dev/sr1"));
    }
}
