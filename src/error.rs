//! Crate-level error taxonomy (§7): every fallible public entry point returns
//! [`Result<T, Error>`]; a matching [`message::Message`] is always queued before a synchronous
//! API returns failure, and async APIs (§4.5) surface the same variants via
//! `Drive::get_status`/`wrote_well` instead of a return value.

use thiserror::Error;

use crate::mmc_error::MMCError;
use crate::sgio::SCSIError;

/// Configuration rejection: a `precheck` failure, enumerated to match §4.1's list of
/// substring-testable reasons. No SCSI traffic and no drive state change precede this error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrecheckError {
    #[error("no writeable media")]
    NoWriteableMedia,
    #[error("write type SAO works only on blank media")]
    SaoRequiresBlankMedia,
    #[error("multi session capability lacking")]
    MultiSessionUnsupported,
    #[error("multi track capability lacking")]
    MultiTrackUnsupported,
    #[error("track size unpredictable")]
    TrackSizeUnpredictable,
    #[error("tracks of different modes mixed")]
    MixedTrackModes,
    #[error("non-data track on non-cd")]
    NonDataTrackOnNonCd,
    #[error("drive dislikes block type")]
    UnsupportedBlockType,
    #[error("CD-TEXT supported only with pure audio CD media")]
    CdTextRequiresPureAudio,
    #[error("write start address not supported")]
    UnsupportedWriteStartAddress,
    #[error("write start address not properly aligned to {0}")]
    MisalignedWriteStartAddress(u32),
    #[error("no suitable media profile detected")]
    NoSuitableProfile,
    #[error("simulation of write job not supported by drive and media")]
    SimulationUnsupported,
    #[error("unsuitable track mode found")]
    UnsuitableTrackMode,
}

/// Programmer error: the API was called in the wrong state. Surfaced as a specific message, no
/// state change.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProgrammerError {
    #[error("drive is not grabbed")]
    NotGrabbed,
    #[error("drive is busy: {0}")]
    Busy(&'static str),
    #[error("a scan is in progress; refusing to start another drive operation")]
    ScanInProgress,
    #[error("an operation is already running on this drive")]
    DriveAlreadyBusy,
    #[error("track does not belong to any session")]
    TrackNotAttached,
    #[error("session index out of range: {0}")]
    SessionIndexOutOfRange(usize),
    #[error("track index out of range: {0}")]
    TrackIndexOutOfRange(usize),
    #[error("first_track + num_tracks - 1 exceeds 99")]
    TooManyTracks,
}

/// Protocol invariant violated by the drive or the caller's data, always fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolInvariantError {
    #[error("drive tells NWA smaller than last written address: reported {reported}, expected at least {expected}")]
    NwaRegressed { reported: i32, expected: i32 },
    #[error("media changed profile mid-burn: was 0x{before:04X}, now 0x{after:04X}")]
    ProfileChangedMidBurn { before: u16, after: u16 },
    #[error("too many CD-TEXT packs: {count} exceeds the cap of {cap}")]
    TooManyCdTextPacks { count: usize, cap: usize },
    #[error("CUE file references unknown FILE type: {0}")]
    UnknownCueFileType(String),
    #[error("finalize-damaged-track requires next_track_damaged or the force flag")]
    TrackNotDamaged,
    #[error("profile 0x{0:04X} has no finalize-damaged-track sequence")]
    NoFinalizeSequenceForProfile(u16),
    #[error("offset source predecessor overlaps: prev ends at {prev_end}, this starts at {start}")]
    OverlappingOffsetSources { prev_end: i64, start: i64 },
}

/// Top-level crate error (§7 taxonomy).
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration rejected: {0}")]
    Configuration(#[from] PrecheckError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("source error: {0}")]
    Source(#[from] SourceError),

    #[error("protocol invariant violated: {0}")]
    ProtocolInvariant(#[from] ProtocolInvariantError),

    #[error("operation cancelled")]
    Cancelled,

    #[error("programmer error: {0}")]
    ProgrammerError(#[from] ProgrammerError),
}

/// Transport-layer failure: a SCSI command returned an error or timed out, or the stdio backend
/// hit an I/O error. Recovered locally only when the command is idempotent (e.g. READ TRACK
/// INFORMATION retried silently); otherwise surfaced and the burn run is aborted.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error(transparent)]
    Scsi(#[from] SCSIError),
    #[error(transparent)]
    Mmc(#[from] MMCError),
    #[error("stdio backend I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("command timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// `burn_source::read` returned < 0, or a short count before EOF where the contract required a
/// full-buffer read (§4.2).
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("source read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("source returned a short read before EOF: requested {requested}, got {got}")]
    ShortRead { requested: usize, got: usize },
    #[error("fifo input error: {0}")]
    FifoInput(std::io::Error),
    #[error("fifo ring buffer too large: {requested} bytes exceeds the 1 GiB cap")]
    FifoRingTooLarge { requested: usize },
    #[error("fifo needs at least 2 chunks, got {0}")]
    FifoTooFewChunks(usize),
    #[error("track size is unpredictable and no default_size was set")]
    UnpredictableSize,
}

impl Error {
    /// True if this error should surface to the caller as a cancellation rather than a failure,
    /// per §7's "Cancellation" taxonomy entry.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}
