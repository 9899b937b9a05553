//! Session model (§3, §4.3): an ordered sequence of tracks plus the session-wide CD-TEXT blocks
//! and media catalog.

use thiserror::Error;

use crate::cdtext::{CdTextBlock, CdTextBlockMeta, NUM_BLOCKS};
use crate::error::ProgrammerError;
use crate::track::Track;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogError {
    #[error("media catalog number must be exactly 13 decimal digits")]
    InvalidFormat,
}

pub struct Session {
    pub first_track: u8,
    tracks: Vec<Track>,
    catalog: Option<[u8; 13]>,
    pub cdtext_blocks: [CdTextBlock; NUM_BLOCKS],
    pub cdtext_meta: [CdTextBlockMeta; NUM_BLOCKS],
}

/// `None` appends at the end — the "end sentinel" position the spec's accessors describe.
pub const END: Option<usize> = None;

impl Session {
    pub fn new() -> Self {
        Self {
            first_track: 1,
            tracks: Vec::new(),
            catalog: None,
            cdtext_blocks: Default::default(),
            cdtext_meta: std::array::from_fn(CdTextBlockMeta::default_for_block),
        }
    }

    pub fn num_tracks(&self) -> usize {
        self.tracks.len()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn track_mut(&mut self, index: usize) -> Option<&mut Track> {
        self.tracks.get_mut(index)
    }

    /// Inserts `track` at `position` (`None` appends at the end). Rejects if
    /// `first_track + num_tracks − 1 > 99` afterwards (§3 invariant).
    pub fn add_track(&mut self, track: Track, position: Option<usize>) -> Result<(), ProgrammerError> {
        if usize::from(self.first_track) + self.tracks.len() > 99 {
            return Err(ProgrammerError::TooManyTracks);
        }

        match position {
            Some(i) if i <= self.tracks.len() => self.tracks.insert(i, track),
            _ => self.tracks.push(track),
        }
        Ok(())
    }

    pub fn remove_track(&mut self, index: usize) -> Result<Track, ProgrammerError> {
        if index >= self.tracks.len() {
            return Err(ProgrammerError::TrackIndexOutOfRange(index));
        }
        Ok(self.tracks.remove(index))
    }

    /// 13 decimal digits, per §3.
    pub fn set_catalog(&mut self, catalog: &str) -> Result<(), CatalogError> {
        let bytes = catalog.as_bytes();
        if bytes.len() != 13 || !bytes.iter().all(u8::is_ascii_digit) {
            return Err(CatalogError::InvalidFormat);
        }
        let mut arr = [0u8; 13];
        arr.copy_from_slice(bytes);
        self.catalog = Some(arr);
        Ok(())
    }

    pub fn catalog(&self) -> Option<&str> {
        self.catalog.as_ref().map(|c| std::str::from_utf8(c).unwrap())
    }

    /// Sum of every track's sector count (§4.3: "sector counters propagate upward by
    /// summation").
    pub fn sectors(&self) -> Result<u32, crate::error::SourceError> {
        self.tracks.iter().try_fold(0u32, |acc, t| Ok(acc + t.sectors()?))
    }

    /// Applies the first-track pregap2 floor (§3) to track 0, if present.
    pub fn apply_first_track_defaults(&mut self) {
        if let Some(first) = self.tracks.first_mut() {
            first.apply_first_track_defaults();
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::TrackMode;

    #[test]
    fn add_track_respects_99_track_cap() {
        let mut session = Session::new();
        session.first_track = 98;
        session.add_track(Track::new(TrackMode::AUDIO), None).unwrap();
        session.add_track(Track::new(TrackMode::AUDIO), None).unwrap();
        assert!(session.add_track(Track::new(TrackMode::AUDIO), None).is_err());
    }

    #[test]
    fn catalog_requires_thirteen_digits() {
        let mut session = Session::new();
        assert!(session.set_catalog("123").is_err());
        session.set_catalog("1234567890123").unwrap();
        assert_eq!(session.catalog(), Some("1234567890123"));
    }

    #[test]
    fn insert_at_position_and_remove() {
        let mut session = Session::new();
        session.add_track(Track::new(TrackMode::AUDIO), None).unwrap();
        session.add_track(Track::new(TrackMode::MODE1), Some(0)).unwrap();
        assert_eq!(session.num_tracks(), 2);
        assert!(session.track(0).unwrap().mode.contains(TrackMode::MODE1));

        session.remove_track(0).unwrap();
        assert_eq!(session.num_tracks(), 1);
        assert!(session.track(0).unwrap().mode.contains(TrackMode::AUDIO));
    }
}
