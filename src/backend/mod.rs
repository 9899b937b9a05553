//! Backend capability interface (Design Notes: "function-pointer dispatch table on the drive").
//!
//! §1 explicitly scopes the SCSI transport adapter's own implementation out of this crate
//! ("`drive.grab/release/write/read/send_cue_sheet/close_track_session/format_unit/sync_cache/
//! get_nwa/…`. The core invokes these named operations"); this trait is exactly that named
//! operation set, so the write engine can program against it without caring whether the concrete
//! drive is a real MMC target or a stdio pseudo-drive.

pub mod mmc;
pub mod null;
pub mod stdio;

use crate::addressing::Lba;
use crate::commands::write_ops::CloseFunction;
use crate::drive::MediaStatus;
use crate::error::TransportError;

/// The subset of READ DISC INFORMATION / READ TOC a `grab` needs to populate a [`crate::Drive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaInfo {
    pub profile: u16,
    pub status: MediaStatus,
    pub nwa: i32,
    pub alba: i32,
    pub erasable: bool,
    /// 0 = not formatting, 1 = in progress, 2 = complete (profile 0x1A background format).
    pub bg_format_status: u8,
}

/// `read_buffer_capacity` (§4.1 "Buffer backpressure").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferCapacity {
    pub total_bytes: u32,
    pub free_bytes: u32,
}

/// The write-parameters (mode page 5) fields the engine needs to set per track/session (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteParameters {
    pub write_type: u8,
    pub track_mode: u8,
    pub data_block_type: u8,
    pub multi_session: u8,
    pub simulate: bool,
    /// WRITE12 + Streaming bit instead of WRITE10 (§4.1 "Stream recording").
    pub stream_recording: bool,
}

/// Capability interface every drive role implements (Design Notes). Mirrors the named operations
/// of §1's out-of-scope transport collaborator plus the profile-specific lifecycle calls §4.1's
/// per-profile table names.
pub trait Backend: Send {
    fn grab(&mut self) -> Result<(), TransportError>;
    fn release(&mut self, eject: bool) -> Result<(), TransportError>;
    fn read_media_info(&mut self) -> Result<MediaInfo, TransportError>;

    fn get_nwa(&mut self) -> Result<i32, TransportError>;
    fn set_write_parameters(&mut self, params: WriteParameters) -> Result<(), TransportError>;
    fn send_cue_sheet(&mut self, records: &[u8]) -> Result<(), TransportError>;
    fn reserve_track(&mut self, size_sectors: u32) -> Result<(), TransportError>;

    /// `drive.write(lba, buffer)`: writes one accumulated output block.
    fn write(&mut self, lba: Lba, data: &[u8]) -> Result<(), TransportError>;
    fn read(&mut self, lba: Lba, sector_len: u32, count: u32) -> Result<Vec<u8>, TransportError>;

    fn close_track(&mut self, track_number: u16, function: CloseFunction) -> Result<(), TransportError>;
    fn close_session(&mut self, function: CloseFunction) -> Result<(), TransportError>;
    fn format_unit(&mut self, quick_grow_to_bytes: Option<u64>) -> Result<(), TransportError>;
    fn sync_cache(&mut self) -> Result<(), TransportError>;

    fn read_buffer_capacity(&mut self) -> Result<BufferCapacity, TransportError>;

    /// Whether this drive/media combination advertises simulated-write support (§4.1 precheck
    /// "simulation of write job not supported by drive and media").
    fn supports_simulation(&self) -> bool {
        false
    }

    /// Maximum single output-block size this transport can carry (caps `Libburn_cd_obS` /
    /// `Libburn_dvd_obS`, §4.1).
    fn max_transfer_len(&self) -> u32 {
        32 * 1024
    }
}
