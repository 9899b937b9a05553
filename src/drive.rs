//! Drive model and lifecycle (§3, §4.5): identity, media state, busy state, progress, and the
//! grab/release/cancel operations every write/erase/format/scan worker shares.
//!
//! Per the Design Notes ("function-pointer dispatch table on the drive"), a `Drive` owns a
//! `Box<dyn Backend>` rather than ~25 raw function pointers; the write engine programs only
//! against [`crate::backend::Backend`].

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Mutex;

use thiserror::Error;

use crate::backend::{Backend, MediaInfo};
use crate::error::{ProgrammerError, TransportError};

/// §3 `drive_role`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveRole {
    Null,
    Mmc,
    StdioReadWrite,
    StdioWriteOnlySequential,
    StdioReadOnly,
    StdioWriteOnlyRandomAccess,
}

impl DriveRole {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Mmc => 1,
            Self::StdioReadWrite => 2,
            Self::StdioWriteOnlySequential => 3,
            Self::StdioReadOnly => 4,
            Self::StdioWriteOnlyRandomAccess => 5,
        }
    }

    pub fn is_stdio(self) -> bool {
        matches!(
            self,
            Self::StdioReadWrite
                | Self::StdioWriteOnlySequential
                | Self::StdioReadOnly
                | Self::StdioWriteOnlyRandomAccess
        )
    }
}

/// §3 `status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaStatus {
    Unready,
    Blank,
    Empty,
    Appendable,
    Full,
    Ungrabbed,
    Unsuitable,
}

/// §3 `busy-state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusyState {
    Idle,
    Spawning,
    Reading,
    Writing,
    WritingLeadIn,
    WritingLeadOut,
    WritingPregap,
    Erasing,
    Formatting,
    Grabbing,
    ClosingTrack,
    ClosingSession,
    ReadingSync,
    WritingSync,
}

impl BusyState {
    /// Whether `cancel` applied while in this state is safe to act on immediately (§4.5
    /// "checked at loop boundaries"). Mid-command states still get the flag, they just cannot
    /// react until their current SCSI round-trip returns.
    pub fn is_cancellable(self) -> bool {
        !matches!(self, Self::Idle)
    }
}

/// §3 `progress`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub sessions_total: u32,
    pub sessions: u32,
    pub tracks_total: u32,
    pub tracks: u32,
    pub indices_total: u32,
    pub indices: u32,
    pub start_sector: i32,
    pub sectors: u32,
    pub sector: u32,
    pub buffer_capacity: u32,
    pub buffer_fill: u32,
    pub buffer_min_fill: u32,
    pub buffered_bytes: u64,
}

impl Progress {
    pub fn reset_for_new_write(&mut self) {
        *self = Self {
            buffer_min_fill: u32::MAX,
            ..Default::default()
        };
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrabError {
    #[error("drive is already grabbed")]
    AlreadyGrabbed,
    #[error("grab aborted: cancellation requested before completion")]
    Aborted,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseError {
    #[error("drive is not grabbed")]
    NotGrabbed,
}

struct DriveState {
    profile: u16,
    status: MediaStatus,
    busy: BusyState,
    progress: Progress,
    nwa: i32,
    alba: i32,
    needs_sync_cache: bool,
}

/// A grabbed/ungrabbed optical drive or stdio pseudo-drive (§3).
pub struct Drive {
    pub vendor: String,
    pub product: String,
    pub revision: String,
    pub role: DriveRole,
    pub(crate) backend: Mutex<Box<dyn Backend>>,
    state: Mutex<DriveState>,
    /// Written by the worker thread, read by the control thread; kept lock-free per the Design
    /// Notes ("the write is atomic", no fine-grained mutex needed around `cancel`).
    cancel: AtomicBool,
    released: AtomicBool,
    wrote_well: AtomicBool,
    /// Process-wide slot index in the drive registry, or -1 if unassigned/freed.
    global_index: AtomicI32,
}

impl Drive {
    pub fn new(vendor: impl Into<String>, product: impl Into<String>, revision: impl Into<String>, role: DriveRole, backend: Box<dyn Backend>) -> Self {
        Self {
            vendor: vendor.into(),
            product: product.into(),
            revision: revision.into(),
            role,
            backend: Mutex::new(backend),
            state: Mutex::new(DriveState {
                profile: 0xFFFF,
                status: MediaStatus::Ungrabbed,
                busy: BusyState::Idle,
                progress: Progress::default(),
                nwa: 0,
                alba: 0,
                needs_sync_cache: false,
            }),
            cancel: AtomicBool::new(false),
            released: AtomicBool::new(true),
            wrote_well: AtomicBool::new(true),
            global_index: AtomicI32::new(-1),
        }
    }

    pub fn global_index(&self) -> i32 {
        self.global_index.load(Ordering::Acquire)
    }

    pub fn set_global_index(&self, idx: i32) {
        self.global_index.store(idx, Ordering::Release);
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// `grab` (§4.5): loads media, locks the tray, starts the unit, inquires media info, sends a
    /// default write-parameters page for CD/DVD-R-ish profiles. Aborts early and returns
    /// [`GrabError::Aborted`] if cancellation is already requested, matching the "safe point"
    /// check the spec calls out.
    pub fn grab(&self) -> Result<(), GrabError> {
        if !self.released.swap(false, Ordering::AcqRel) {
            return Err(GrabError::AlreadyGrabbed);
        }
        if self.cancel.load(Ordering::Acquire) {
            self.released.store(true, Ordering::Release);
            return Err(GrabError::Aborted);
        }

        self.set_busy(BusyState::Grabbing);

        let media = {
            let mut backend = self.backend.lock().unwrap();
            backend.grab().and_then(|()| backend.read_media_info())
        };

        let mut state = self.state.lock().unwrap();
        match media {
            Ok(MediaInfo { profile, status, nwa, alba, .. }) => {
                state.profile = profile;
                state.status = status;
                state.nwa = nwa;
                state.alba = alba;
            }
            Err(_) => {
                state.status = MediaStatus::Unready;
            }
        }
        state.busy = BusyState::Idle;
        drop(state);

        self.wrote_well.store(true, Ordering::Release);
        Ok(())
    }

    /// `release(eject?)` (§4.5): syncs the cache if dirty, unlocks, optionally ejects, then
    /// releases. `mark_unready` is folded in as the post-release state.
    pub fn release(&self, eject: bool) -> Result<(), ReleaseError> {
        if self.released.load(Ordering::Acquire) {
            return Err(ReleaseError::NotGrabbed);
        }

        if self.state.lock().unwrap().needs_sync_cache {
            let _ = self.backend.lock().unwrap().sync_cache();
        }
        let _ = self.backend.lock().unwrap().release(eject);

        self.mark_unready();
        self.released.store(true, Ordering::Release);
        Ok(())
    }

    /// Invalidates cached media state without a full release (§4.5).
    pub fn mark_unready(&self) {
        let mut state = self.state.lock().unwrap();
        state.status = MediaStatus::Unready;
        state.needs_sync_cache = false;
    }

    pub fn profile(&self) -> u16 {
        self.state.lock().unwrap().profile
    }

    pub fn status(&self) -> MediaStatus {
        self.state.lock().unwrap().status
    }

    pub fn nwa(&self) -> i32 {
        self.state.lock().unwrap().nwa
    }

    pub fn set_nwa(&self, nwa: i32) {
        self.state.lock().unwrap().nwa = nwa;
    }

    pub fn alba(&self) -> i32 {
        self.state.lock().unwrap().alba
    }

    pub fn busy_state(&self) -> BusyState {
        self.state.lock().unwrap().busy
    }

    pub fn set_busy(&self, busy: BusyState) {
        self.state.lock().unwrap().busy = busy;
    }

    pub fn set_needs_sync_cache(&self, needs: bool) {
        self.state.lock().unwrap().needs_sync_cache = needs;
    }

    /// `get_drive_status`: a snapshot copy of the progress struct, taken under the state mutex
    /// per §5 ("progress struct is copied out under a mutex on every read").
    pub fn get_status(&self) -> (BusyState, Progress) {
        let state = self.state.lock().unwrap();
        (state.busy, state.progress)
    }

    pub fn with_progress_mut<R>(&self, f: impl FnOnce(&mut Progress) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state.progress)
    }

    /// `burn_drive_cancel`: sets the cancel flag. Checked at every loop boundary in the write
    /// engine (§4.1, §5); a single atomic store, intentionally un-mutexed.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    pub fn reset_cancel(&self) {
        self.cancel.store(false, Ordering::Release);
    }

    /// `wrote_well(drive)` (§7): false if `cancel` was ever set during the most recent write.
    pub fn wrote_well(&self) -> bool {
        self.wrote_well.load(Ordering::Acquire) && !self.is_cancelled()
    }

    pub fn set_wrote_well(&self, well: bool) {
        self.wrote_well.store(well, Ordering::Release);
    }

    pub fn require_grabbed(&self) -> Result<(), ProgrammerError> {
        if self.is_released() {
            return Err(ProgrammerError::NotGrabbed);
        }
        Ok(())
    }

    pub fn require_idle(&self) -> Result<(), ProgrammerError> {
        if self.busy_state() != BusyState::Idle {
            return Err(ProgrammerError::DriveAlreadyBusy);
        }
        Ok(())
    }

    pub(crate) fn with_backend_mut<R>(&self, f: impl FnOnce(&mut dyn Backend) -> Result<R, TransportError>) -> Result<R, TransportError> {
        let mut backend = self.backend.lock().unwrap();
        f(backend.as_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::null::NullBackend;

    fn test_drive() -> Drive {
        Drive::new("TEST", "DRIVE", "1.0", DriveRole::Null, Box::new(NullBackend))
    }

    #[test]
    fn grab_then_release_round_trips() {
        let d = test_drive();
        assert!(d.is_released());
        d.grab().unwrap();
        assert!(!d.is_released());
        d.release(false).unwrap();
        assert!(d.is_released());
    }

    #[test]
    fn double_grab_is_rejected() {
        let d = test_drive();
        d.grab().unwrap();
        assert_eq!(d.grab(), Err(GrabError::AlreadyGrabbed));
    }

    #[test]
    fn cancel_is_observed_without_a_lock_around_it() {
        let d = test_drive();
        assert!(!d.is_cancelled());
        d.cancel();
        assert!(d.is_cancelled());
        assert!(!d.wrote_well());
    }

    #[test]
    fn release_without_grab_is_rejected() {
        let d = test_drive();
        assert_eq!(d.release(false), Err(ReleaseError::NotGrabbed));
    }
}
