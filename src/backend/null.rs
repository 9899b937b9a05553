//! The null backend (§3 `drive_role = 0`): a placeholder transport for registry slots that do
//! not (yet) address a real drive or stdio target. Every operation fails with `NotReady`-shaped
//! transport errors except the lifecycle no-ops, so a `Drive` can exist and be enumerated before
//! anything is grabbed.

use crate::addressing::Lba;
use crate::backend::{Backend, BufferCapacity, MediaInfo, WriteParameters};
use crate::commands::write_ops::CloseFunction;
use crate::drive::MediaStatus;
use crate::error::TransportError;

pub struct NullBackend;

fn unready() -> TransportError {
    TransportError::Io(std::io::Error::new(std::io::ErrorKind::NotConnected, "null backend has no drive attached"))
}

impl Backend for NullBackend {
    fn grab(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn release(&mut self, _eject: bool) -> Result<(), TransportError> {
        Ok(())
    }

    fn read_media_info(&mut self) -> Result<MediaInfo, TransportError> {
        Ok(MediaInfo {
            profile: 0xFFFF,
            status: MediaStatus::Ungrabbed,
            nwa: 0,
            alba: 0,
            erasable: false,
            bg_format_status: 0,
        })
    }

    fn get_nwa(&mut self) -> Result<i32, TransportError> {
        Err(unready())
    }

    fn set_write_parameters(&mut self, _params: WriteParameters) -> Result<(), TransportError> {
        Err(unready())
    }

    fn send_cue_sheet(&mut self, _records: &[u8]) -> Result<(), TransportError> {
        Err(unready())
    }

    fn reserve_track(&mut self, _size_sectors: u32) -> Result<(), TransportError> {
        Err(unready())
    }

    fn write(&mut self, _lba: Lba, _data: &[u8]) -> Result<(), TransportError> {
        Err(unready())
    }

    fn read(&mut self, _lba: Lba, _sector_len: u32, _count: u32) -> Result<Vec<u8>, TransportError> {
        Err(unready())
    }

    fn close_track(&mut self, _track_number: u16, _function: CloseFunction) -> Result<(), TransportError> {
        Err(unready())
    }

    fn close_session(&mut self, _function: CloseFunction) -> Result<(), TransportError> {
        Err(unready())
    }

    fn format_unit(&mut self, _quick_grow_to_bytes: Option<u64>) -> Result<(), TransportError> {
        Err(unready())
    }

    fn sync_cache(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn read_buffer_capacity(&mut self) -> Result<BufferCapacity, TransportError> {
        Ok(BufferCapacity::default())
    }
}
