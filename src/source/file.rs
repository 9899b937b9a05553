//! File source (§4.2): opens a path read-only, with an optional subchannel side-file and an
//! optional `fixed_size` override.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::SourceError;
use crate::source::{SourceOps, SourceSize};

pub struct FileSource {
    path: PathBuf,
    file: File,
    sub_path: Option<PathBuf>,
    sub_file: Option<File>,
    fixed_size: Option<u64>,
}

impl FileSource {
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        Ok(Self {
            path,
            file,
            sub_path: None,
            sub_file: None,
            fixed_size: None,
        })
    }

    pub fn open_with_subchannel(
        path: impl AsRef<Path>,
        sub_path: impl AsRef<Path>,
    ) -> std::io::Result<Self> {
        let mut src = Self::open(path)?;
        let sub_path = sub_path.as_ref().to_path_buf();
        src.sub_file = Some(File::open(&sub_path)?);
        src.sub_path = Some(sub_path);
        Ok(src)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `st_size` for a regular file, otherwise `None` ("unpredictable" per §4.2).
    fn file_size(&self) -> Option<u64> {
        self.file.metadata().ok().and_then(|m| {
            if m.is_file() { Some(m.len()) } else { None }
        })
    }

    /// Performs the full-buffer-read loop required by §4.2: only the final chunk may come back
    /// short, everything before EOF must fill the caller's buffer.
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

impl SourceOps for FileSource {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SourceError> {
        Self::read_full(&mut self.file, buf)
    }

    fn read_sub(&mut self, buf: &mut [u8]) -> Result<usize, SourceError> {
        match &mut self.sub_file {
            Some(f) => Self::read_full(f, buf),
            None => Ok(0),
        }
    }

    fn get_size(&self) -> SourceSize {
        match self.fixed_size.or_else(|| self.file_size()) {
            Some(n) => SourceSize::Fixed(n),
            None => SourceSize::Unpredictable,
        }
    }

    fn set_size(&mut self, size: u64) -> bool {
        self.fixed_size = Some(size);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_full_file_contents() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&[1, 2, 3, 4, 5]).unwrap();

        let mut src = FileSource::open(tmp.path()).unwrap();
        let mut buf = [0u8; 5];
        assert_eq!(src.read(&mut buf).unwrap(), 5);
        assert_eq!(buf, [1, 2, 3, 4, 5]);
        assert_eq!(src.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn short_read_only_happens_at_eof() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&[1, 2, 3]).unwrap();

        let mut src = FileSource::open(tmp.path()).unwrap();
        let mut buf = [0u8; 5];
        assert_eq!(src.read(&mut buf).unwrap(), 3);
    }

    #[test]
    fn fixed_size_overrides_metadata() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&[0u8; 10]).unwrap();

        let mut src = FileSource::open(tmp.path()).unwrap();
        assert_eq!(src.get_size(), SourceSize::Fixed(10));
        src.set_size(42);
        assert_eq!(src.get_size(), SourceSize::Fixed(42));
    }
}
