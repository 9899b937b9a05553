//! Audio-extraction helper (§1): "consumed only as 'open WAV, return raw-PCM fd, byte order,
//! size'" — CUE ingestion (`cue_file::parse_cue_sheet`, `FILE "x.wav" WAVE`) calls through an
//! [`AudioSource`] to get at a WAV (or AU) container's raw PCM payload; decoding the container
//! itself is this crate's one piece of the helper it does own, since locating the `data` chunk
//! and its byte order is a small, self-contained parse that doesn't need the out-of-scope
//! collaborator's full implementation to specify.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use thiserror::Error;

/// Byte order of the samples inside the payload range `AudioSource` reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

/// What CUE ingestion needs from an opened audio container: a raw-PCM file descriptor, the byte
/// order of its samples, and the payload size in bytes (§1: "open WAV, return raw-PCM fd, byte
/// order, size").
pub trait AudioSource {
    fn byte_order(&self) -> ByteOrder;
    fn payload_len(&self) -> u64;
    fn payload_offset(&self) -> u64;
}

#[derive(Error, Debug)]
pub enum WavError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("not a RIFF/WAVE file (missing {0:?} chunk id)")]
    MissingChunk(&'static str),
    #[error("unsupported WAVE format tag {0}")]
    UnsupportedFormatTag(u16),
    #[error("not a .snd/.au file (missing magic)")]
    NotAu,
}

/// A WAV (RIFF/WAVE, PCM) container: scans chunks for `fmt ` (to confirm PCM and read channel/
/// sample-rate metadata, unused by CUE ingestion itself but kept for callers that want it) and
/// `data` (the raw-PCM payload §1 names).
pub struct WavSource {
    file: File,
    data_offset: u64,
    data_len: u64,
    channels: u16,
    sample_rate: u32,
    bits_per_sample: u16,
}

const WAVE_FORMAT_PCM: u16 = 1;
const WAVE_FORMAT_EXTENSIBLE: u16 = 0xFFFE;

impl WavSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, WavError> {
        let mut file = File::open(path)?;

        let mut riff_header = [0u8; 12];
        file.read_exact(&mut riff_header)?;
        if &riff_header[0..4] != b"RIFF" || &riff_header[8..12] != b"WAVE" {
            return Err(WavError::MissingChunk("RIFF/WAVE"));
        }

        let mut channels = 0u16;
        let mut sample_rate = 0u32;
        let mut bits_per_sample = 0u16;
        let mut saw_fmt = false;
        let mut data_offset = None;
        let mut data_len = 0u64;

        loop {
            let mut chunk_header = [0u8; 8];
            if file.read_exact(&mut chunk_header).is_err() {
                break;
            }
            let chunk_id = &chunk_header[0..4];
            let chunk_size = u32::from_le_bytes(chunk_header[4..8].try_into().unwrap());

            if chunk_id == b"fmt " {
                let mut fmt = vec![0u8; chunk_size as usize];
                file.read_exact(&mut fmt)?;
                let format_tag = u16::from_le_bytes([fmt[0], fmt[1]]);
                if format_tag != WAVE_FORMAT_PCM && format_tag != WAVE_FORMAT_EXTENSIBLE {
                    return Err(WavError::UnsupportedFormatTag(format_tag));
                }
                channels = u16::from_le_bytes([fmt[2], fmt[3]]);
                sample_rate = u32::from_le_bytes([fmt[4], fmt[5], fmt[6], fmt[7]]);
                bits_per_sample = u16::from_le_bytes([fmt[14], fmt[15]]);
                saw_fmt = true;
            } else if chunk_id == b"data" {
                data_offset = Some(file.stream_position()?);
                data_len = chunk_size as u64;
                file.seek(SeekFrom::Current(chunk_size as i64))?;
            } else {
                file.seek(SeekFrom::Current(chunk_size as i64))?;
            }

            // Chunks are word-aligned; skip the pad byte on an odd-sized chunk.
            if chunk_size % 2 == 1 {
                file.seek(SeekFrom::Current(1))?;
            }
        }

        if !saw_fmt {
            return Err(WavError::MissingChunk("fmt "));
        }
        let data_offset = data_offset.ok_or(WavError::MissingChunk("data"))?;

        Ok(Self {
            file,
            data_offset,
            data_len,
            channels,
            sample_rate,
            bits_per_sample,
        })
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.bits_per_sample
    }

    /// Hands back the already-positioned file, for a caller that wants to build a
    /// [`crate::source::file::FileSource`]/[`crate::source::fd::FdSource`] directly over the PCM
    /// payload range.
    pub fn into_file(self) -> File {
        self.file
    }
}

impl AudioSource for WavSource {
    fn byte_order(&self) -> ByteOrder {
        ByteOrder::Little
    }

    fn payload_len(&self) -> u64 {
        self.data_len
    }

    fn payload_offset(&self) -> u64 {
        self.data_offset
    }
}

/// Minimal `.au`/`.snd` preamble reader (§1's "WAV/AU preambles" non-goal boundary: decoding is
/// out of scope beyond locating the PCM payload, same as [`WavSource`]).
pub struct AuSource {
    file: File,
    data_offset: u64,
    data_len: u64,
}

impl AuSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, WavError> {
        let mut file = File::open(path)?;
        let mut header = [0u8; 24];
        file.read_exact(&mut header)?;
        if &header[0..4] != b".snd" {
            return Err(WavError::NotAu);
        }
        let data_offset = u32::from_be_bytes(header[4..8].try_into().unwrap()) as u64;
        let data_size = u32::from_be_bytes(header[8..12].try_into().unwrap());
        let total_len = file.metadata()?.len();
        let data_len = if data_size == 0xFFFF_FFFF { total_len - data_offset } else { data_size as u64 };

        Ok(Self { file, data_offset, data_len })
    }

    pub fn into_file(self) -> File {
        self.file
    }
}

impl AudioSource for AuSource {
    fn byte_order(&self) -> ByteOrder {
        // .au / .snd payloads are always big-endian (the format's Sun/NeXT origin).
        ByteOrder::Big
    }

    fn payload_len(&self) -> u64 {
        self.data_len
    }

    fn payload_offset(&self) -> u64 {
        self.data_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_minimal_wav(path: &Path, pcm: &[u8]) {
        let mut f = File::create(path).unwrap();
        let fmt_chunk_size = 16u32;
        let data_chunk_size = pcm.len() as u32;
        let riff_size = 4 + (8 + fmt_chunk_size) + (8 + data_chunk_size);

        f.write_all(b"RIFF").unwrap();
        f.write_all(&riff_size.to_le_bytes()).unwrap();
        f.write_all(b"WAVE").unwrap();

        f.write_all(b"fmt ").unwrap();
        f.write_all(&fmt_chunk_size.to_le_bytes()).unwrap();
        f.write_all(&1u16.to_le_bytes()).unwrap(); // PCM
        f.write_all(&2u16.to_le_bytes()).unwrap(); // stereo
        f.write_all(&44100u32.to_le_bytes()).unwrap();
        f.write_all(&176400u32.to_le_bytes()).unwrap(); // byte rate
        f.write_all(&4u16.to_le_bytes()).unwrap(); // block align
        f.write_all(&16u16.to_le_bytes()).unwrap(); // bits per sample

        f.write_all(b"data").unwrap();
        f.write_all(&data_chunk_size.to_le_bytes()).unwrap();
        f.write_all(pcm).unwrap();
    }

    #[test]
    fn locates_data_chunk_and_reports_pcm_metadata() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let pcm = vec![0xABu8; 2352 * 4];
        write_minimal_wav(tmp.path(), &pcm);

        let wav = WavSource::open(tmp.path()).unwrap();
        assert_eq!(wav.channels(), 2);
        assert_eq!(wav.sample_rate(), 44100);
        assert_eq!(wav.bits_per_sample(), 16);
        assert_eq!(wav.payload_len(), pcm.len() as u64);
        assert_eq!(wav.byte_order(), ByteOrder::Little);

        let mut file = wav.into_file();
        file.seek(SeekFrom::Start(0)).unwrap();
        let mut whole = Vec::new();
        file.read_to_end(&mut whole).unwrap();
        let payload = &whole[24 + 8..];
        assert_eq!(payload, pcm.as_slice());
    }

    #[test]
    fn rejects_non_riff_file() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), b"not a wav file at all").unwrap();
        assert!(matches!(WavSource::open(tmp.path()), Err(WavError::MissingChunk("RIFF/WAVE"))));
    }
}
