//! Offset source (§4.2, §8 invariant 8): exposes bytes `[start, start+size)` of an inner stream,
//! discarding everything before `start` on first use. Offset sources on the same inner stream may
//! chain as ordered, non-overlapping neighbours (CUE-file ingestion builds one offset source per
//! track over a single shared `FILE`).

use crate::error::SourceError;
use crate::source::{Source, SourceOps, SourceSize};

pub struct OffsetSource {
    inner: Source,
    start: u64,
    size: u64,
    /// Whether `set_size` may actually change `size` (vs. only affecting `get_size`'s reply).
    size_adjustable: bool,
    delivered: u64,
    /// The previous offset source's `start + size` in the same chain, or 0 for the first link.
    /// `prime` discards only `[prev_end, start)` from `inner`, since `inner`'s cursor already
    /// sits at `prev_end` once the previous link in the chain has been consumed.
    prev_end: u64,
    /// Have we discarded the `[prev_end, start)` prefix from `inner` yet?
    primed: bool,
}

impl OffsetSource {
    /// `prev_end` is the previous offset source's `start + size` in the same chain, or 0 if this
    /// is the first link; the constructor rejects an overlap per §4.2's invariant.
    pub fn new(
        inner: Source,
        start: u64,
        size: u64,
        size_adjustable: bool,
        prev_end: u64,
    ) -> Result<Self, crate::error::ProtocolInvariantError> {
        if prev_end > start {
            return Err(
                crate::error::ProtocolInvariantError::OverlappingOffsetSources {
                    prev_end: prev_end as i64,
                    start: start as i64,
                },
            );
        }

        Ok(Self {
            inner,
            start,
            size,
            size_adjustable,
            delivered: 0,
            prev_end,
            primed: false,
        })
    }

    fn prime(&mut self) -> Result<(), SourceError> {
        if self.primed {
            return Ok(());
        }
        let mut to_discard = self.start.saturating_sub(self.prev_end);
        let mut scratch = [0u8; 4096];
        while to_discard > 0 {
            let chunk = (to_discard as usize).min(scratch.len());
            let n = self.inner.read(&mut scratch[..chunk])?;
            if n == 0 {
                break;
            }
            to_discard -= n as u64;
        }
        self.primed = true;
        Ok(())
    }
}

impl SourceOps for OffsetSource {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SourceError> {
        self.prime()?;

        let remaining = self.size.saturating_sub(self.delivered);
        if remaining == 0 {
            return Ok(0);
        }

        let want = (buf.len() as u64).min(remaining) as usize;
        let n = self.inner.read(&mut buf[..want])?;
        self.delivered += n as u64;
        Ok(n)
    }

    fn read_sub(&mut self, buf: &mut [u8]) -> Result<usize, SourceError> {
        self.inner.read_sub(buf)
    }

    fn get_size(&self) -> SourceSize {
        SourceSize::Fixed(self.size)
    }

    fn set_size(&mut self, size: u64) -> bool {
        if self.size_adjustable {
            self.size = size;
            true
        } else {
            false
        }
    }

    fn cancel(&mut self) {
        self.inner.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::file::FileSource;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    fn shared_file(bytes: &[u8]) -> Source {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(bytes).unwrap();
        Source::File(Arc::new(Mutex::new(FileSource::open(tmp.path()).unwrap())))
    }

    #[test]
    fn delivers_exactly_the_requested_interval() {
        let inner = shared_file(b"0123456789");
        let mut off = OffsetSource::new(inner, 3, 4, false, 0).unwrap();

        let mut buf = [0u8; 10];
        let n = off.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"3456");
        assert_eq!(off.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn chain_of_offsets_partitions_the_stream() {
        let inner = shared_file(b"abcdefghij");
        let mut first = OffsetSource::new(inner.clone(), 0, 3, false, 0).unwrap();
        let mut buf = [0u8; 16];
        let n = first.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"abc");

        let mut second = OffsetSource::new(inner, 3, 7, false, 3).unwrap();
        let n = second.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"defghij");
    }

    #[test]
    fn rejects_overlap_with_predecessor() {
        let inner = shared_file(b"abcdefghij");
        assert!(OffsetSource::new(inner, 2, 3, false, 5).is_err());
    }

    #[test]
    fn set_size_respects_adjustable_flag() {
        let inner = shared_file(b"abcdefghij");
        let mut off = OffsetSource::new(inner, 0, 5, false, 0).unwrap();
        assert!(!off.set_size(9));
        assert_eq!(off.get_size(), SourceSize::Fixed(5));

        let inner2 = shared_file(b"abcdefghij");
        let mut adjustable = OffsetSource::new(inner2, 0, 5, true, 0).unwrap();
        assert!(adjustable.set_size(9));
        assert_eq!(adjustable.get_size(), SourceSize::Fixed(9));
    }
}
