//! JTE ("jigdo template") sideband (§1): out of scope as an implementation — this crate owns only
//! the write-path tap interface the real JTE machinery would sit behind, plus the digest engines
//! it is consumed through ("MD5/SHA/SHA256/SHA512 are consumed as named digest engines").
//!
//! `write_engine` takes an `&mut dyn JteSink` alongside a track's data and reports match records
//! (byte ranges that came from a known, already-hashed template) and unmatched ranges (raw bytes
//! that must be carried verbatim in a `.template`). The compression, `.jigdo`/`.template` file
//! emission and MD5/SHA accumulation bookkeeping themselves are the out-of-scope collaborator;
//! [`NullJteSink`] is the only body this crate carries.

/// A byte range within one track's logical data stream, in track-relative bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub len: u64,
}

/// A run of bytes that matched a block already known to the jigdo template (e.g. a file also
/// present verbatim in some other, already-hashed source).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRecord {
    pub range: ByteRange,
    /// Digest of the matched block, hex-encoded, as the `.jigdo` file would reference it.
    pub digest_hex: String,
}

/// The write-path tap (§1): the write engine calls `on_track_start`/`on_match`/`on_unmatched`/
/// `on_track_end` as it streams a track's sectors, in source order, covering the track's data
/// exactly once with no gaps or overlaps between match and unmatched ranges.
pub trait JteSink: Send {
    fn on_track_start(&mut self, track_number: u16) {
        let _ = track_number;
    }

    fn on_match(&mut self, record: MatchRecord) {
        let _ = record;
    }

    fn on_unmatched(&mut self, range: ByteRange, data: &[u8]) {
        let _ = (range, data);
    }

    fn on_track_end(&mut self, track_number: u16) {
        let _ = track_number;
    }
}

/// Default no-op tap; used whenever a caller doesn't wire up real JTE sideband processing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullJteSink;

impl JteSink for NullJteSink {}

/// The named digest engines §1 lists as consumed, not implemented, by the JTE sideband. Kept as a
/// thin enum over the crate's own hashing dependencies so a real `JteSink` can pick one per
/// template block without this crate having to re-derive MD5/SHA from scratch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestKind {
    Md5,
    Sha1,
    Sha256,
    Sha512,
}

/// A running digest accumulator over one template block's bytes, dispatching to whichever crate
/// backs `kind`.
pub enum DigestEngine {
    Md5(md5::Context),
    Sha1(sha1::Sha1),
    Sha256(sha2::Sha256),
    Sha512(sha2::Sha512),
}

impl DigestEngine {
    pub fn new(kind: DigestKind) -> Self {
        use sha1::Digest as _;
        use sha2::Digest as _;
        match kind {
            DigestKind::Md5 => Self::Md5(md5::Context::new()),
            DigestKind::Sha1 => Self::Sha1(sha1::Sha1::new()),
            DigestKind::Sha256 => Self::Sha256(sha2::Sha256::new()),
            DigestKind::Sha512 => Self::Sha512(sha2::Sha512::new()),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        use sha1::Digest as _;
        use sha2::Digest as _;
        match self {
            Self::Md5(ctx) => ctx.consume(data),
            Self::Sha1(h) => h.update(data),
            Self::Sha256(h) => h.update(data),
            Self::Sha512(h) => h.update(data),
        }
    }

    /// Lower-case hex digest, the form a `.jigdo` file's block reference uses.
    pub fn finalize_hex(self) -> String {
        use sha1::Digest as _;
        use sha2::Digest as _;
        match self {
            Self::Md5(ctx) => format!("{:x}", ctx.compute()),
            Self::Sha1(h) => hex_encode(&h.finalize()),
            Self::Sha256(h) => hex_encode(&h.finalize()),
            Self::Sha512(h) => hex_encode(&h.finalize()),
        }
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_sink_accepts_every_callback_without_panicking() {
        let mut sink = NullJteSink;
        sink.on_track_start(1);
        sink.on_match(MatchRecord { range: ByteRange { start: 0, len: 10 }, digest_hex: "abc".into() });
        sink.on_unmatched(ByteRange { start: 10, len: 4 }, &[0u8; 4]);
        sink.on_track_end(1);
    }

    #[test]
    fn digest_engines_produce_stable_known_hashes() {
        let mut md5 = DigestEngine::new(DigestKind::Md5);
        md5.update(b"abc");
        assert_eq!(md5.finalize_hex(), "900150983cd24fb0d6963f7d28e17f72");

        let mut sha1 = DigestEngine::new(DigestKind::Sha1);
        sha1.update(b"abc");
        assert_eq!(sha1.finalize_hex(), "a9993e364706816aba3e25717850c26c9cd0d89d");

        let mut sha256 = DigestEngine::new(DigestKind::Sha256);
        sha256.update(b"abc");
        assert_eq!(
            sha256.finalize_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
