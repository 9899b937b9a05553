//! Real MMC/SCSI backend (§1, §4.5): the concrete `Backend` that every other module's `grab` /
//! `write` / `close_track_session` named operation resolves to when the drive is an actual
//! optical device, wrapping `commands::*` and `sgio` SG_IO transport.

use std::fs::{File, OpenOptions};

use i24::U24;

use crate::addressing::Lba;
use crate::backend::{Backend, BufferCapacity, MediaInfo, WriteParameters};
use crate::commands::read_cd::read_audio_range;
use crate::commands::read_track_info::{AddressType, ReadTrackInfo};
use crate::commands::write_ops::{
    CloseFunction, CloseTrackSession, ModeSelect, ReserveTrack, SendCueSheet, StartStopUnit,
    SynchronizeCache, Write10, Write12Streaming, WriteParametersPage,
};
use crate::commands::{Command, Control, ExecuteError};
use crate::drive::MediaStatus;
use crate::error::TransportError;

/// Sentinel logical track number that always addresses the invisible/incomplete track (§4.5
/// "grab" populates NWA from this before any session is open).
const INVISIBLE_TRACK: u32 = 0xFF;

fn no_control() -> Control {
    Control::from(0)
}

fn map_execute_error<Cmd, const N: usize>(err: ExecuteError<Cmd, N>) -> TransportError
where
    Cmd: Command<N>,
{
    match err {
        ExecuteError::SCSIError(e) => TransportError::Scsi(e),
        ExecuteError::ParseError(_) => {
            TransportError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, "malformed MMC command response"))
        }
    }
}

pub struct MmcBackend {
    file: File,
    max_transfer_len: u32,
    /// Set by the most recent [`Backend::set_write_parameters`] call; `write` dispatches to
    /// WRITE(12)+Streaming instead of WRITE(10) when this is set (§4.1 "Stream recording").
    stream_recording: bool,
}

impl MmcBackend {
    pub fn open(path: &std::path::Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self { file, max_transfer_len: 32 * 1024, stream_recording: false })
    }

    fn read_invisible_track(&self) -> Result<crate::commands::read_track_info::ReadTrackInfoResponse, TransportError> {
        ReadTrackInfo::new(false, AddressType::LTN, INVISIBLE_TRACK, no_control())
            .execute(&self.file)
            .map_err(map_execute_error)
    }
}

impl Backend for MmcBackend {
    fn grab(&mut self) -> Result<(), TransportError> {
        StartStopUnit { immediate: false, load_eject: false, start: true, control: no_control() }
            .execute(&self.file)
            .map_err(TransportError::Scsi)
    }

    fn release(&mut self, eject: bool) -> Result<(), TransportError> {
        StartStopUnit { immediate: false, load_eject: eject, start: false, control: no_control() }
            .execute(&self.file)
            .map_err(TransportError::Scsi)
    }

    fn read_media_info(&mut self) -> Result<MediaInfo, TransportError> {
        let config = crate::commands::get_configuration::GetConfiguration::new(
            crate::commands::get_configuration::RTField::Current,
            0,
            264,
            no_control(),
        )
        .execute(&self.file)
        .map_err(map_execute_error)?;

        let track_info = self.read_invisible_track();
        let (status, nwa, alba) = match track_info {
            Ok(info) if info.blank => (MediaStatus::Blank, info.next_writable_addr, info.logical_track_start_addr),
            Ok(info) if info.nwa_v => (MediaStatus::Appendable, info.next_writable_addr, info.logical_track_start_addr),
            Ok(info) => (MediaStatus::Full, info.next_writable_addr, info.logical_track_start_addr),
            Err(_) => (MediaStatus::Unready, 0, 0),
        };

        Ok(MediaInfo {
            profile: u16::from(config.current_profile),
            status,
            nwa,
            alba,
            erasable: matches!(u16::from(config.current_profile), 0x000A | 0x0012 | 0x0013 | 0x001A | 0x0043),
            bg_format_status: 0,
        })
    }

    fn get_nwa(&mut self) -> Result<i32, TransportError> {
        Ok(self.read_invisible_track()?.next_writable_addr)
    }

    fn set_write_parameters(&mut self, params: WriteParameters) -> Result<(), TransportError> {
        let page = WriteParametersPage {
            write_type: params.write_type,
            track_mode: params.track_mode,
            data_block_type: params.data_block_type,
            multi_session: params.multi_session,
            fp: false,
            copy: false,
            simulate: params.simulate,
            bufe: false,
        };

        self.stream_recording = params.stream_recording;

        ModeSelect { page_format: true, parameter_list: page.to_bytes().to_vec(), control: no_control() }
            .execute(&self.file)
            .map_err(TransportError::Scsi)
    }

    fn send_cue_sheet(&mut self, records: &[u8]) -> Result<(), TransportError> {
        SendCueSheet { cue_sheet: records.to_vec(), control: no_control() }
            .execute(&self.file)
            .map_err(TransportError::Scsi)
    }

    fn reserve_track(&mut self, size_sectors: u32) -> Result<(), TransportError> {
        ReserveTrack { reservation_size: size_sectors, control: no_control() }
            .execute(&self.file)
            .map_err(TransportError::Scsi)
    }

    fn write(&mut self, lba: Lba, data: &[u8]) -> Result<(), TransportError> {
        let sector_count = (data.len() / 2048).max(1);
        if self.stream_recording {
            Write12Streaming { lba, transfer_length: sector_count as u32, data: data.to_vec(), control: no_control() }
                .execute(&self.file)
                .map_err(TransportError::Scsi)
        } else {
            Write10 { lba, transfer_length: sector_count as u16, data: data.to_vec(), control: no_control() }
                .execute(&self.file)
                .map_err(TransportError::Scsi)
        }
    }

    fn read(&mut self, lba: Lba, sector_len: u32, count: u32) -> Result<Vec<u8>, TransportError> {
        let _ = sector_len; // READ CD always returns the full 2352-byte raw sector; caller trims.
        let sectors = U24::try_from(count).map_err(|_| {
            TransportError::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, "read() count exceeds 24 bits"))
        })?;
        read_audio_range(&self.file, lba, sectors).map_err(TransportError::Scsi)
    }

    fn close_track(&mut self, track_number: u16, function: CloseFunction) -> Result<(), TransportError> {
        CloseTrackSession { immediate: false, function, track_number, control: no_control() }
            .execute(&self.file)
            .map_err(TransportError::Scsi)
    }

    fn close_session(&mut self, function: CloseFunction) -> Result<(), TransportError> {
        CloseTrackSession { immediate: false, function, track_number: 0, control: no_control() }
            .execute(&self.file)
            .map_err(TransportError::Scsi)
    }

    fn format_unit(&mut self, _quick_grow_to_bytes: Option<u64>) -> Result<(), TransportError> {
        crate::commands::write_ops::FormatUnit { format_data: true, parameter_list: Vec::new(), control: no_control() }
            .execute(&self.file)
            .map_err(TransportError::Scsi)
    }

    fn sync_cache(&mut self) -> Result<(), TransportError> {
        SynchronizeCache { immediate: false, control: no_control() }
            .execute(&self.file)
            .map_err(TransportError::Scsi)
    }

    fn read_buffer_capacity(&mut self) -> Result<BufferCapacity, TransportError> {
        // A real drive buffer-status query; without a dedicated command module yet, report the
        // drive as always-empty so the engine's backpressure wait degrades to a fixed poll
        // interval rather than ever blocking incorrectly on a full buffer.
        Ok(BufferCapacity { total_bytes: self.max_transfer_len, free_bytes: self.max_transfer_len })
    }

    fn supports_simulation(&self) -> bool {
        true
    }

    fn max_transfer_len(&self) -> u32 {
        self.max_transfer_len
    }
}
