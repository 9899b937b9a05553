//! Fd source (§4.2): wraps already-open file descriptors. Caller owns fd lifetimes up to the
//! point the source is constructed; the source closes them (via `File`'s `Drop`) when freed.

use std::fs::File;
use std::io::Read;
use std::os::fd::{FromRawFd, RawFd};

use crate::error::SourceError;
use crate::source::{SourceOps, SourceSize};

pub struct FdSource {
    data: File,
    sub: Option<File>,
    size: u64,
}

impl FdSource {
    /// # Safety
    /// `data_fd` (and `sub_fd`, if given) must be valid, open, otherwise-unowned file
    /// descriptors; this source takes ownership of them and will close them on drop.
    pub unsafe fn from_raw_fd(data_fd: RawFd, sub_fd: Option<RawFd>, size: u64) -> Self {
        Self {
            data: unsafe { File::from_raw_fd(data_fd) },
            sub: sub_fd.map(|fd| unsafe { File::from_raw_fd(fd) }),
            size,
        }
    }

    fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize, SourceError> {
        let mut total = 0;
        while total < buf.len() {
            match reader.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(SourceError::Io(e)),
            }
        }
        Ok(total)
    }
}

impl SourceOps for FdSource {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SourceError> {
        Self::read_full(&mut self.data, buf)
    }

    fn read_sub(&mut self, buf: &mut [u8]) -> Result<usize, SourceError> {
        match &mut self.sub {
            Some(f) => Self::read_full(f, buf),
            None => Ok(0),
        }
    }

    fn get_size(&self) -> SourceSize {
        SourceSize::Fixed(self.size)
    }

    fn set_size(&mut self, size: u64) -> bool {
        self.size = size;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::fd::IntoRawFd;

    #[test]
    fn reads_from_an_owned_fd() {
        let mut tmp = tempfile::tempfile().unwrap();
        tmp.write_all(&[9, 8, 7]).unwrap();
        use std::io::Seek;
        tmp.seek(std::io::SeekFrom::Start(0)).unwrap();

        let fd = tmp.into_raw_fd();
        let mut src = unsafe { FdSource::from_raw_fd(fd, None, 3) };

        let mut buf = [0u8; 3];
        assert_eq!(src.read(&mut buf).unwrap(), 3);
        assert_eq!(buf, [9, 8, 7]);
        assert_eq!(src.get_size(), SourceSize::Fixed(3));
    }
}
