//! Async worker pool (§4.5 "Async worker pool"): one detached thread per scan/erase/format/write
//! job, plus the fifo shoveller threads owned separately by `source::fifo`. A single list tracks
//! every live worker so `add_worker` can enforce "one worker per drive" and the scan-exclusion
//! rule without a central scheduler.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerKind {
    Scan,
    Erase,
    Format,
    Write,
    Fifo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerId(u64);

struct WorkerRecord {
    id: WorkerId,
    kind: WorkerKind,
    /// The registry slot of the drive this worker acts on, or `None` for a drive-less fifo
    /// shoveller (§4.2).
    drive_global_index: Option<i32>,
    handle: Option<JoinHandle<()>>,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerError {
    #[error("a scan is in progress; refusing to start another drive operation")]
    ScanInProgress,
    #[error("an operation is already running on this drive")]
    DriveAlreadyBusy,
}

/// The process-wide linked list of worker records (§4.5). New records go to the head, so
/// [`WorkerList::scan_going`] only has to look at the front.
#[derive(Default)]
pub struct WorkerList {
    records: Mutex<Vec<WorkerRecord>>,
    next_id: AtomicU64,
}

impl WorkerList {
    pub fn new() -> Self {
        Self { records: Mutex::new(Vec::new()), next_id: AtomicU64::new(1) }
    }

    /// `SCAN_GOING`: true exactly when the worker-list head is a scan (§4.5).
    pub fn scan_going(&self) -> bool {
        matches!(self.records.lock().unwrap().first(), Some(r) if r.kind == WorkerKind::Scan)
    }

    fn drive_busy(&self, global_index: i32) -> bool {
        self.records.lock().unwrap().iter().any(|r| r.drive_global_index == Some(global_index))
    }

    /// `add_worker(type, drive, fn, payload)`: refuses to start while a scan is going (unless this
    /// itself is the scan), and refuses a second worker on the same drive.
    pub fn add_worker(
        &self,
        kind: WorkerKind,
        drive_global_index: Option<i32>,
        job: impl FnOnce() + Send + 'static,
    ) -> Result<WorkerId, WorkerError> {
        if kind != WorkerKind::Scan && self.scan_going() {
            return Err(WorkerError::ScanInProgress);
        }
        if let Some(idx) = drive_global_index {
            if self.drive_busy(idx) {
                return Err(WorkerError::DriveAlreadyBusy);
            }
        }

        let id = WorkerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let handle = std::thread::spawn(job);

        self.records.lock().unwrap().insert(0, WorkerRecord { id, kind, drive_global_index, handle: Some(handle) });
        Ok(id)
    }

    /// Removes a finished worker's record from the list. Joins its thread if still attached (a
    /// no-op join, since the worker calls this from its own completion path).
    pub fn retire(&self, id: WorkerId) {
        let removed = {
            let mut records = self.records.lock().unwrap();
            records.iter().position(|r| r.id == id).map(|i| records.remove(i))
        };
        if let Some(mut record) = removed {
            if let Some(handle) = record.handle.take() {
                let _ = handle.join();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn scan_excludes_other_drive_operations() {
        let list = WorkerList::new();
        let (tx, rx) = mpsc::channel::<()>();
        let scan_id = list.add_worker(WorkerKind::Scan, None, move || {
            let _ = rx.recv();
        }).unwrap();

        assert!(list.scan_going());
        assert_eq!(list.add_worker(WorkerKind::Write, Some(0), || {}), Err(WorkerError::ScanInProgress));

        tx.send(()).unwrap();
        list.retire(scan_id);
        assert!(!list.scan_going());
    }

    #[test]
    fn one_worker_per_drive() {
        let list = WorkerList::new();
        let (tx, rx) = mpsc::channel::<()>();
        let id = list.add_worker(WorkerKind::Write, Some(3), move || {
            let _ = rx.recv();
        }).unwrap();

        assert_eq!(list.add_worker(WorkerKind::Erase, Some(3), || {}), Err(WorkerError::DriveAlreadyBusy));

        tx.send(()).unwrap();
        list.retire(id);
        assert!(list.add_worker(WorkerKind::Erase, Some(3), || {}).is_ok());
    }
}
