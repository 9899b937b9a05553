//! Stdio pseudo-drive backend (§1, §3 `drive_role` 2/3/4/5; §4.1 table's `stdio (roles 2/5)`
//! row): regular files, block devices, or already-open file descriptors addressed directly,
//! without any SCSI round-trip. Profile is always reported as `0xFFFF`, "the libburn invention
//! for stdio pseudo-drives" (§3).

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

use crate::addressing::Lba;
use crate::backend::{Backend, BufferCapacity, MediaInfo, WriteParameters};
use crate::commands::write_ops::CloseFunction;
use crate::drive::{DriveRole, MediaStatus};
use crate::error::TransportError;

/// fsync cadence, in 2 KiB blocks, per the §4.1 table ("fsync every `stdio_fsync_size` × 2 KiB
/// blocks").
pub const DEFAULT_FSYNC_BLOCKS: u32 = 512; // 1 MiB

pub struct StdioBackend {
    file: File,
    role: DriveRole,
    sector_size: u32,
    start_byte: u64,
    fsync_every_bytes: u64,
    bytes_since_fsync: u64,
    cursor: u64,
}

impl StdioBackend {
    pub fn new(file: File, role: DriveRole, sector_size: u32, start_byte: u64) -> Self {
        assert!(role.is_stdio(), "StdioBackend requires a stdio drive role");
        Self {
            file,
            role,
            sector_size,
            start_byte,
            fsync_every_bytes: u64::from(DEFAULT_FSYNC_BLOCKS) * 2048,
            bytes_since_fsync: 0,
            cursor: start_byte,
        }
    }

    pub fn with_fsync_blocks(mut self, blocks: u32) -> Self {
        self.fsync_every_bytes = u64::from(blocks) * 2048;
        self
    }

    fn current_len(&self) -> std::io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn maybe_fsync(&mut self, written: u64) -> Result<(), TransportError> {
        self.bytes_since_fsync += written;
        if self.bytes_since_fsync >= self.fsync_every_bytes {
            self.file.sync_data().map_err(TransportError::Io)?;
            self.bytes_since_fsync = 0;
        }
        Ok(())
    }
}

impl Backend for StdioBackend {
    fn grab(&mut self) -> Result<(), TransportError> {
        match self.role {
            DriveRole::StdioReadWrite => {
                self.file.seek(SeekFrom::Start(self.start_byte)).map_err(TransportError::Io)?;
                self.cursor = self.start_byte;
            }
            DriveRole::StdioWriteOnlyRandomAccess => {
                // `role_5_nwa`: append at current end of file on appendable media.
                let nwa_byte = self.current_len().map_err(TransportError::Io)?;
                self.file.seek(SeekFrom::Start(nwa_byte)).map_err(TransportError::Io)?;
                self.cursor = nwa_byte;
            }
            _ => {}
        }
        Ok(())
    }

    fn release(&mut self, _eject: bool) -> Result<(), TransportError> {
        self.sync_cache()
    }

    fn read_media_info(&mut self) -> Result<MediaInfo, TransportError> {
        let len = self.current_len().map_err(TransportError::Io)?;
        let status = if len == 0 { MediaStatus::Blank } else { MediaStatus::Appendable };
        let nwa = (len / u64::from(self.sector_size)) as i32;
        Ok(MediaInfo { profile: 0xFFFF, status, nwa, alba: 0, erasable: true, bg_format_status: 0 })
    }

    fn get_nwa(&mut self) -> Result<i32, TransportError> {
        let len = self.current_len().map_err(TransportError::Io)?;
        Ok((len / u64::from(self.sector_size)) as i32)
    }

    fn set_write_parameters(&mut self, _params: WriteParameters) -> Result<(), TransportError> {
        Ok(())
    }

    fn send_cue_sheet(&mut self, _records: &[u8]) -> Result<(), TransportError> {
        // Stdio pseudo-drives receive only the raw sector stream; there is no on-medium Lead-in
        // to encode a cue sheet into.
        Ok(())
    }

    fn reserve_track(&mut self, size_sectors: u32) -> Result<(), TransportError> {
        if matches!(self.role, DriveRole::StdioReadWrite | DriveRole::StdioWriteOnlyRandomAccess) {
            let want = self.cursor + u64::from(size_sectors) * u64::from(self.sector_size);
            self.file.set_len(want).map_err(TransportError::Io)?;
        }
        Ok(())
    }

    fn write(&mut self, lba: Lba, data: &[u8]) -> Result<(), TransportError> {
        match self.role {
            DriveRole::StdioReadWrite | DriveRole::StdioWriteOnlyRandomAccess => {
                let offset = self.start_byte + (i64::from(lba.raw()).max(0) as u64) * u64::from(self.sector_size);
                self.file.seek(SeekFrom::Start(offset)).map_err(TransportError::Io)?;
                self.file.write_all(data).map_err(TransportError::Io)?;
                self.cursor = offset + data.len() as u64;
            }
            DriveRole::StdioWriteOnlySequential => {
                self.file.write_all(data).map_err(TransportError::Io)?;
                self.cursor += data.len() as u64;
            }
            DriveRole::StdioReadOnly | DriveRole::Null | DriveRole::Mmc => {
                return Err(TransportError::Io(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "this stdio role does not support writing",
                )));
            }
        }
        self.maybe_fsync(data.len() as u64)
    }

    fn read(&mut self, lba: Lba, sector_len: u32, count: u32) -> Result<Vec<u8>, TransportError> {
        if matches!(self.role, DriveRole::StdioWriteOnlySequential | DriveRole::StdioWriteOnlyRandomAccess) {
            return Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "this stdio role does not support reading",
            )));
        }
        let offset = self.start_byte + (i64::from(lba.raw()).max(0) as u64) * u64::from(sector_len);
        self.file.seek(SeekFrom::Start(offset)).map_err(TransportError::Io)?;
        let mut buf = vec![0u8; (sector_len * count) as usize];
        self.file.read_exact(&mut buf).map_err(TransportError::Io)?;
        Ok(buf)
    }

    fn close_track(&mut self, _track_number: u16, _function: CloseFunction) -> Result<(), TransportError> {
        self.sync_cache()
    }

    fn close_session(&mut self, _function: CloseFunction) -> Result<(), TransportError> {
        self.sync_cache()
    }

    fn format_unit(&mut self, quick_grow_to_bytes: Option<u64>) -> Result<(), TransportError> {
        if let Some(len) = quick_grow_to_bytes {
            self.file.set_len(len).map_err(TransportError::Io)?;
        }
        Ok(())
    }

    fn sync_cache(&mut self) -> Result<(), TransportError> {
        self.file.sync_data().map_err(TransportError::Io)?;
        self.bytes_since_fsync = 0;
        Ok(())
    }

    fn read_buffer_capacity(&mut self) -> Result<BufferCapacity, TransportError> {
        // Stdio targets have no drive write cache to report on; treat them as always-empty so
        // the engine's backpressure wait never blocks on a stdio write.
        Ok(BufferCapacity { total_bytes: u32::MAX, free_bytes: u32::MAX })
    }

    fn max_transfer_len(&self) -> u32 {
        64 * 1024
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;

    fn scratch_file() -> File {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let path = tmp.into_temp_path();
        let file = OpenOptions::new().read(true).write(true).create(true).truncate(true).open(&path).unwrap();
        std::mem::forget(path); // keep the backing file alive for the test's duration
        file
    }

    #[test]
    fn random_access_write_then_read_round_trips() {
        let mut backend = StdioBackend::new(scratch_file(), DriveRole::StdioReadWrite, 2048, 0);
        backend.write(Lba::new_unchecked(0), &[7u8; 2048]).unwrap();
        let data = backend.read(Lba::new_unchecked(0), 2048, 1).unwrap();
        assert_eq!(data, vec![7u8; 2048]);
    }

    #[test]
    fn sequential_role_rejects_reads() {
        let mut backend = StdioBackend::new(scratch_file(), DriveRole::StdioWriteOnlySequential, 2048, 0);
        backend.write(Lba::new_unchecked(0), &[1u8; 2048]).unwrap();
        assert!(backend.read(Lba::new_unchecked(0), 2048, 1).is_err());
    }

    #[test]
    fn read_only_role_rejects_writes() {
        let mut backend = StdioBackend::new(scratch_file(), DriveRole::StdioReadOnly, 2048, 0);
        assert!(backend.write(Lba::new_unchecked(0), &[1u8; 2048]).is_err());
    }
}
