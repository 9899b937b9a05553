//! CDRWIN `.cue` file ingestion (§4.4, §6): a line-oriented grammar describing a disc program as
//! `CATALOG`/`FILE`/`TRACK`/`INDEX`/`PREGAP`/`POSTGAP`/`FLAGS`/`ISRC`/title-ish commands.
//!
//! One `FILE` is shared by every track via a single fifo-wrapped source (§4.4's "A single fifo
//! wraps the shared FILE source"); each track gets an [`OffsetSource`] over that fifo, with
//! `INDEX 01` defining its start and the next track's `INDEX 01` (or end of file) its end.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::addressing::{BlockAddressError, Msf};
use crate::cdtext::CdTextBlock;
use crate::error::ProtocolInvariantError;
use crate::session::Session;
use crate::source::fifo::FifoSource;
use crate::source::offset::OffsetSource;
use crate::source::{file::FileSource, Source};
use crate::track::{GapSize, Track, TrackMode};

#[derive(Error, Debug)]
pub enum CueFileError {
    #[error("line {line}: {kind}")]
    Syntax { line: usize, kind: SyntaxErrorKind },
    #[error("FILE must appear exactly once, before any TRACK")]
    FileMustPrecedeTracks,
    #[error("mixing AUDIO and MODE1/2048 tracks in one CUE file is not supported")]
    MixedTrackModes,
    #[error(transparent)]
    Address(#[from] BlockAddressError),
    #[error(transparent)]
    ProtocolInvariant(#[from] ProtocolInvariantError),
    #[error("I/O error reading the FILE payload: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Source(#[from] crate::error::SourceError),
    #[error(transparent)]
    Catalog(#[from] crate::session::CatalogError),
    #[error(transparent)]
    Programmer(#[from] crate::error::ProgrammerError),
}

#[derive(Error, Debug)]
pub enum SyntaxErrorKind {
    #[error("unrecognized command {0:?}")]
    UnknownCommand(String),
    #[error("TRACK requires a track number and a mode")]
    BadTrack,
    #[error("unsupported track mode {0:?}")]
    UnsupportedTrackMode(String),
    #[error("expected an MM:SS:FF timestamp, got {0:?}")]
    BadTimestamp(String),
    #[error("FILE requires a path and a type")]
    BadFile,
    #[error("unsupported FILE type {0:?}")]
    UnsupportedFileType(String),
    #[error("unrecognized FLAGS value {0:?}")]
    UnknownFlag(String),
}

fn strip_quotes(s: &str) -> &str {
    s.strip_prefix('"').and_then(|s| s.strip_suffix('"')).unwrap_or(s)
}

fn parse_msf(line: usize, s: &str) -> Result<Msf, CueFileError> {
    let fields: Vec<&str> = s.split(':').collect();
    let [m, sec, f] = fields[..] else {
        return Err(CueFileError::Syntax {
            line,
            kind: SyntaxErrorKind::BadTimestamp(s.to_string()),
        });
    };
    let parse = |v: &str| {
        v.parse::<u8>().map_err(|_| CueFileError::Syntax {
            line,
            kind: SyntaxErrorKind::BadTimestamp(s.to_string()),
        })
    };
    Ok(Msf::new(parse(m)?, parse(sec)?, parse(f)?)?)
}

/// Parses a CDRWIN `.cue` file's *text* (the grammar only; `FILE`'s referenced audio/binary
/// payload is opened separately by the caller and passed in as `file_source`).
pub fn parse_cue_sheet(text: &str, file_source: Source, block_size: usize) -> Result<Session, CueFileError> {
    let mut session = Session::new();
    let mut file_seen = false;
    let mut saw_mode: Option<bool> = None; // Some(true) = audio seen, Some(false) = data seen.

    // One fifo-backed reader shared by every track's offset source (§4.4).
    let fifo = Arc::new(FifoSource::new(file_source, block_size, 4)?);
    let shared = Source::Fifo(fifo);

    let mut tracks: Vec<Track> = Vec::new();
    let mut track_starts: Vec<u64> = Vec::new();
    let mut current_track_index: Option<usize> = None;
    let mut current_offset_bytes: Option<u64> = None;
    let mut session_title_pending: Option<String> = None;

    for (idx, raw_line) in text.lines().enumerate() {
        let line = idx + 1;
        let trimmed = raw_line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let mut parts = trimmed.splitn(2, char::is_whitespace);
        let command = parts.next().unwrap_or("").to_ascii_uppercase();
        let rest = parts.next().unwrap_or("").trim();

        match command.as_str() {
            "CATALOG" => {
                session.set_catalog(rest)?;
            }
            "CDTEXTFILE" => {
                // Referenced CD-TEXT pack file is ingested separately; the grammar only records
                // that one was named.
            }
            "FILE" => {
                if file_seen {
                    return Err(CueFileError::FileMustPrecedeTracks);
                }
                let mut fparts = rest.rsplitn(2, char::is_whitespace);
                let ftype = fparts.next().unwrap_or("");
                let _path: PathBuf = strip_quotes(fparts.next().unwrap_or("").trim()).into();
                if !["BINARY", "MOTOROLA", "WAVE"].contains(&ftype.to_ascii_uppercase().as_str()) {
                    return Err(CueFileError::Syntax {
                        line,
                        kind: SyntaxErrorKind::UnsupportedFileType(ftype.to_string()),
                    });
                }
                file_seen = true;
            }
            "TRACK" => {
                if !file_seen {
                    return Err(CueFileError::FileMustPrecedeTracks);
                }
                let mut tparts = rest.split_whitespace();
                let (Some(_num), Some(mode_str)) = (tparts.next(), tparts.next()) else {
                    return Err(CueFileError::Syntax { line, kind: SyntaxErrorKind::BadTrack });
                };

                let is_audio = match mode_str {
                    "AUDIO" => true,
                    "MODE1/2048" => false,
                    other => {
                        return Err(CueFileError::Syntax {
                            line,
                            kind: SyntaxErrorKind::UnsupportedTrackMode(other.to_string()),
                        });
                    }
                };

                match saw_mode {
                    None => saw_mode = Some(is_audio),
                    Some(prev) if prev != is_audio => return Err(CueFileError::MixedTrackModes),
                    _ => {}
                }

                if let Some(prev_idx) = current_track_index {
                    // Previous track's size is bounded by this track's start (set below once we
                    // see its INDEX 01), or by FILE end if this is the last track — finalized
                    // after the loop.
                    let _ = prev_idx;
                }

                let mode = if is_audio { TrackMode::AUDIO } else { TrackMode::MODE1 };
                let mut track = Track::new(mode);
                if let Some(title) = session_title_pending.take() {
                    let mut block = CdTextBlock::default();
                    block.set(0x80, title.into_bytes(), false);
                    track.cdtext[0] = block;
                }
                tracks.push(track);
                track_starts.push(0);
                current_track_index = Some(tracks.len() - 1);
                current_offset_bytes = None;
            }
            "INDEX" => {
                let mut iparts = rest.split_whitespace();
                let (Some(n_str), Some(msf_str)) = (iparts.next(), iparts.next()) else {
                    return Err(CueFileError::Syntax { line, kind: SyntaxErrorKind::BadTrack });
                };
                let n: u8 = n_str.parse().map_err(|_| CueFileError::Syntax {
                    line,
                    kind: SyntaxErrorKind::BadTrack,
                })?;
                let msf = parse_msf(line, msf_str)?;
                let frames = i64::from(msf.0) * 60 * 75 + i64::from(msf.1) * 75 + i64::from(msf.2);
                let byte_offset = frames as u64 * u64::from(block_size_per_frame(&tracks, current_track_index));

                if n == 1 {
                    current_offset_bytes = Some(byte_offset);
                    if let Some(i) = current_track_index {
                        track_starts[i] = byte_offset;
                    }
                } else if let Some(i) = current_track_index {
                    let base = current_offset_bytes.unwrap_or(byte_offset);
                    let relative_frames = ((byte_offset - base) / u64::from(block_size_per_frame(&tracks, Some(i)))) as i32;
                    let _ = tracks[i].set_index(n as usize, crate::addressing::Lba::new_unchecked(relative_frames));
                }
            }
            "PREGAP" => {
                let msf = parse_msf(line, rest)?;
                let sectors = u32::from(msf.0) * 60 * 75 + u32::from(msf.1) * 75 + u32::from(msf.2);
                if let Some(i) = current_track_index {
                    tracks[i].pregap2 = GapSize::Sectors(sectors);
                }
            }
            "POSTGAP" => {
                let msf = parse_msf(line, rest)?;
                let sectors = u32::from(msf.0) * 60 * 75 + u32::from(msf.1) * 75 + u32::from(msf.2);
                if let Some(i) = current_track_index {
                    tracks[i].postgap = GapSize::Sectors(sectors);
                }
            }
            "FLAGS" => {
                for flag in rest.split_whitespace() {
                    let bit = match flag {
                        "DCP" => TrackMode::COPY,
                        "4CH" => TrackMode::FOUR_CH,
                        "PRE" => TrackMode::PREEMPHASIS,
                        "SCMS" => TrackMode::SCMS,
                        other => {
                            return Err(CueFileError::Syntax {
                                line,
                                kind: SyntaxErrorKind::UnknownFlag(other.to_string()),
                            });
                        }
                    };
                    if let Some(i) = current_track_index {
                        tracks[i].mode |= bit;
                    }
                }
            }
            "ISRC" => {
                if let Some(i) = current_track_index {
                    tracks[i].isrc = crate::isrc::Isrc::parse(strip_quotes(rest)).ok();
                }
            }
            "TITLE" | "PERFORMER" | "SONGWRITER" | "COMPOSER" | "ARRANGER" | "MESSAGE" => {
                let pack_type = match command.as_str() {
                    "TITLE" => 0x80,
                    "PERFORMER" => 0x81,
                    "SONGWRITER" => 0x82,
                    "COMPOSER" => 0x83,
                    "ARRANGER" => 0x84,
                    "MESSAGE" => 0x85,
                    _ => unreachable!(),
                };
                let text = strip_quotes(rest).as_bytes().to_vec();
                if let Some(i) = current_track_index {
                    tracks[i].cdtext[0].set(pack_type, text, false);
                } else {
                    session_title_pending = Some(strip_quotes(rest).to_string());
                    session.cdtext_blocks[0].set(pack_type, text, false);
                }
            }
            other => {
                return Err(CueFileError::Syntax {
                    line,
                    kind: SyntaxErrorKind::UnknownCommand(other.to_string()),
                });
            }
        }
    }

    // Resolve each track's size from the next track's start, or leave open-ended for the last
    // (the fifo-backed file source reports its real size once read).
    let n = tracks.len();
    for i in 0..n {
        let start = track_starts[i];
        let end = track_starts.get(i + 1).copied();
        // Tracks are contiguous over the shared FILE source: track i's interval begins exactly
        // where track i-1's ended, so the shared cursor is already at `start` once track i-1 has
        // been primed/consumed. There is no gap to discard beyond the very first track.
        let prev_end = if i == 0 { 0 } else { start };

        let size = end.map(|e| e - start).unwrap_or(u64::MAX);
        let adjustable = end.is_none();
        let offset = OffsetSource::new(shared.clone(), start, size, adjustable, prev_end)?;
        tracks[i].attach_source(Source::Offset(Arc::new(Mutex::new(offset))));
    }

    for track in tracks {
        session.add_track(track, None)?;
    }

    Ok(session)
}

fn block_size_per_frame(tracks: &[Track], idx: Option<usize>) -> u32 {
    idx.and_then(|i| tracks.get(i))
        .map(|t| t.sector_length())
        .unwrap_or(2352)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn shared_file(bytes: &[u8]) -> Source {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(bytes).unwrap();
        Source::File(Arc::new(Mutex::new(FileSource::open(tmp.path()).unwrap())))
    }

    #[test]
    fn two_track_audio_cue_produces_two_tracks() {
        let cue = r#"
CATALOG 1234567890123
FILE "audio.wav" WAVE
  TRACK 01 AUDIO
    TITLE "Song A"
    INDEX 01 00:00:00
  TRACK 02 AUDIO
    TITLE "Song B"
    PREGAP 00:02:00
    INDEX 01 03:30:00
"#;
        let payload = vec![0u8; 2352 * 15750];
        let source = shared_file(&payload);
        let session = parse_cue_sheet(cue, source, 2352 * 75).unwrap();

        assert_eq!(session.catalog(), Some("1234567890123"));
        assert_eq!(session.num_tracks(), 2);
        assert_eq!(session.track(1).unwrap().pregap2, GapSize::Sectors(150));
    }

    #[test]
    fn mixing_audio_and_data_tracks_is_rejected() {
        let cue = r#"
FILE "x.bin" BINARY
  TRACK 01 AUDIO
    INDEX 01 00:00:00
  TRACK 02 MODE1/2048
    INDEX 01 00:00:00
"#;
        let source = shared_file(&[0u8; 4096]);
        assert!(matches!(
            parse_cue_sheet(cue, source, 2048 * 4),
            Err(CueFileError::MixedTrackModes)
        ));
    }

    #[test]
    fn track_before_file_is_rejected() {
        let cue = "TRACK 01 AUDIO\n";
        let source = shared_file(&[0u8; 16]);
        assert!(matches!(
            parse_cue_sheet(cue, source, 2352 * 75),
            Err(CueFileError::FileMustPrecedeTracks)
        ));
    }
}
