//! The `Library` context (Design Notes "Static registries and global mutable state"): a single
//! explicitly-initialized handle bundling the message queue, drive registry, worker list, and
//! shutdown token that the C original kept as hidden process-global statics. One `Library` is
//! created by [`Library::initialize`] and shared (typically behind an `Arc`) by every entry point;
//! dropping it is the one teardown order every caller needs.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use i24::U24;

use crate::drive::Drive;
use crate::message::{Message, MessageQueue, Severity, NO_DRIVE};
use crate::registry::{DriveRegistry, RegistryError, DEFAULT_CAPACITY};
use crate::signal::{burn_abort, ShutdownToken};
use crate::worker::{WorkerError, WorkerKind, WorkerList};

/// `initialize()`/`finish()` bundle (§4.5, §4.6, Design Notes).
pub struct Library {
    pub messages: Mutex<MessageQueue>,
    pub registry: DriveRegistry,
    pub workers: WorkerList,
    pub shutdown: Arc<ShutdownToken>,
}

impl Library {
    /// `initialize()`: builds a fresh, empty context. There is no global singleton; a process
    /// that wants one constructs it once and shares the `Arc`.
    pub fn initialize() -> Arc<Self> {
        Arc::new(Self {
            messages: Mutex::new(MessageQueue::new()),
            registry: DriveRegistry::new(DEFAULT_CAPACITY),
            workers: WorkerList::new(),
            shutdown: ShutdownToken::new(),
        })
    }

    pub fn submit_message(&self, code: u32, severity: Severity, priority: i32, os_errno: i32, text: impl Into<String>, drive_global_index: i32) {
        let code = U24::try_from(code).unwrap_or(U24::try_from(0u32).unwrap());
        self.messages.lock().unwrap().submit(code, severity, priority, os_errno, text, drive_global_index);
    }

    pub fn obtain_message(&self, min_sev: Severity) -> Option<Message> {
        self.messages.lock().unwrap().obtain(min_sev)
    }

    /// `drive_scan`: discovers and registers candidate drives, refusing to run concurrently with
    /// any other drive operation (§4.5 "Scan exclusion").
    pub fn scan(&self) -> Result<Vec<String>, RegistryError> {
        if !self.workers.is_empty() {
            // "at most one scan may run concurrently with no other drive operations" (§4.5).
            return Err(RegistryError::ScanInProgress);
        }
        self.registry.scan_paths()
    }

    pub fn require_no_scan_in_progress(&self) -> Result<(), WorkerError> {
        if self.workers.scan_going() {
            return Err(WorkerError::ScanInProgress);
        }
        Ok(())
    }

    pub fn spawn_worker(&self, kind: WorkerKind, drive: &Drive, job: impl FnOnce() + Send + 'static) -> Result<(), WorkerError> {
        self.workers.add_worker(kind, Some(drive.global_index()), job)?;
        Ok(())
    }

    pub fn is_aborting(&self) -> bool {
        self.shutdown.is_aborting()
    }

    /// `burn_abort(patience, pacifier, handle)` run across every currently registered drive
    /// (§4.5). Also flips the shutdown token so any loop consulting it independently observes the
    /// same decision.
    pub fn abort(&self, patience: Duration, pacifier: impl FnMut(Duration)) -> Vec<i32> {
        self.shutdown.trigger();
        let drives = self.registry.drives();
        let forgotten = burn_abort(&drives, patience, pacifier);
        for index in &forgotten {
            self.submit_message(0, Severity::Warning, 0, 0, format!("forgot unresponsive stdio drive at slot {index}"), *index);
        }
        forgotten
    }

    /// `finish()`: releases every still-grabbed drive and forgets the registry contents. Intended
    /// to run once as the last thing a process does with this `Library`, mirroring the teardown
    /// order the Design Notes call out.
    pub fn finish(&self) {
        for drive in self.registry.drives() {
            if !drive.is_released() {
                let _ = drive.release(false);
            }
            drive.set_global_index(-1);
        }
    }
}

impl Drop for Library {
    fn drop(&mut self) {
        self.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_starts_with_empty_registry_and_queue() {
        let lib = Library::initialize();
        assert_eq!(lib.registry.high_water_mark(), 0);
        assert!(lib.obtain_message(Severity::Never).is_none());
        assert!(!lib.is_aborting());
    }

    #[test]
    fn abort_sets_shutdown_token() {
        let lib = Library::initialize();
        lib.abort(Duration::from_millis(10), |_| {});
        assert!(lib.is_aborting());
    }

    #[test]
    fn submit_and_obtain_round_trip_a_message() {
        let lib = Library::initialize();
        lib.messages.lock().unwrap().set_severities(Severity::Note, Severity::Abort);
        lib.submit_message(7, Severity::Warning, 0, 0, "heads up", NO_DRIVE);
        let msg = lib.obtain_message(Severity::Note).unwrap();
        assert_eq!(msg.text, "heads up");
    }
}
