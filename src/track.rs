//! Track model (§3): mode flags, source attachment, padding, gaps, indices, ISRC, CD-TEXT and
//! sizing/EOF semantics.

use bitflags::bitflags;

use crate::addressing::Lba;
use crate::cdtext::CdTextBlock;
use crate::isrc::Isrc;
use crate::source::{Source, SourceOps as _, SourceSize};

bitflags! {
    /// Track mode bitfield (§3). `MODE0`..`AUDIO` are mutually exclusive for a valid track; the
    /// rest are independent modifiers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TrackMode: u32 {
        const MODE0        = 1 << 0;
        const MODE1        = 1 << 1;
        const MODE2        = 1 << 2;
        const AUDIO        = 1 << 3;
        const MODE_RAW     = 1 << 4;
        const FORM1        = 1 << 5;
        const FORM2        = 1 << 6;
        const FOUR_CH      = 1 << 7;
        const COPY         = 1 << 8;
        const PREEMPHASIS  = 1 << 9;
        const SUBCODE_P16  = 1 << 10;
        const SUBCODE_P96  = 1 << 11;
        const SUBCODE_R96  = 1 << 12;
        const SCMS         = 1 << 13;
    }
}

const EXCLUSIVE_MASK: TrackMode = TrackMode::MODE0
    .union(TrackMode::MODE1)
    .union(TrackMode::MODE2)
    .union(TrackMode::AUDIO);

impl TrackMode {
    /// True if at most one of `{MODE0, MODE1, MODE2, AUDIO}` is set, per §3's mutual-exclusion
    /// invariant.
    pub fn has_valid_exclusive_group(self) -> bool {
        (self & EXCLUSIVE_MASK).bits().count_ones() <= 1
    }

    pub fn is_audio(self) -> bool {
        self.contains(TrackMode::AUDIO)
    }

    pub fn is_data(self) -> bool {
        self.intersects(TrackMode::MODE0 | TrackMode::MODE1 | TrackMode::MODE2)
    }
}

/// Sector payload length in bytes for a given mode, per §8 invariant 2.
pub fn sector_length(mode: TrackMode) -> u32 {
    if mode.is_audio() || mode.contains(TrackMode::MODE_RAW) {
        2352
    } else if mode.contains(TrackMode::MODE2) && mode.contains(TrackMode::FORM2) {
        2324
    } else {
        // MODE1, or MODE2/FORM1, or bare MODE0/MODE2 (formless), all carry a 2048-byte user area.
        2048
    }
}

pub const INDEX_UNSET: i32 = 0x7fff_ffff;
pub const DEFAULT_PREGAP2_SIZE: u32 = 150;
pub const DEFAULT_POSTGAP_SIZE: u32 = 150;
pub const MIN_TRACK_SECTORS: u32 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapSize {
    /// `set_*_size(-1)`: the gap is disabled.
    Disabled,
    Sectors(u32),
}

impl GapSize {
    pub fn sectors(self) -> u32 {
        match self {
            Self::Disabled => 0,
            Self::Sectors(n) => n,
        }
    }

    pub fn is_enabled(self) -> bool {
        !matches!(self, Self::Disabled)
    }
}

pub struct Track {
    pub mode: TrackMode,
    pub source: Option<Source>,

    pub offset: u64,
    pub tail: u64,
    pub pad: bool,

    pub pregap1: bool,
    pub pregap2: GapSize,
    pub postgap: GapSize,

    indices: [i32; 100],
    indices_count: usize,

    pub isrc: Option<Isrc>,

    pub cdtext: [CdTextBlock; 8],

    pub fill_up_media: bool,
    pub default_size: Option<u64>,
    pub open_ended: bool,
    pub track_data_done: bool,
    pub end_on_premature_eoi: bool,

    pub swap_source_bytes: bool,
    pub cdxa_conversion: bool,

    pub sourcecount: u64,
    pub writecount: u64,
    pub written_sectors: u32,
}

impl Track {
    pub fn new(mode: TrackMode) -> Self {
        Self {
            mode,
            source: None,
            offset: 0,
            tail: 0,
            pad: true,
            pregap1: false,
            pregap2: GapSize::Disabled,
            postgap: GapSize::Disabled,
            indices: [INDEX_UNSET; 100],
            indices_count: 0,
            isrc: None,
            cdtext: Default::default(),
            fill_up_media: false,
            default_size: None,
            open_ended: false,
            track_data_done: false,
            end_on_premature_eoi: false,
            swap_source_bytes: false,
            cdxa_conversion: false,
            sourcecount: 0,
            writecount: 0,
            written_sectors: 0,
        }
    }

    pub fn attach_source(&mut self, source: Source) {
        self.source = Some(source);
    }

    pub fn sector_length(&self) -> u32 {
        let base = sector_length(self.mode);
        if self.cdxa_conversion { base + 8 } else { base }
    }

    /// `n ∈ [0, 99]`.
    pub fn set_index(&mut self, n: usize, relative_lba: Lba) -> Result<(), crate::error::ProgrammerError> {
        if n >= self.indices.len() {
            return Err(crate::error::ProgrammerError::TrackIndexOutOfRange(n));
        }
        self.indices[n] = i32::from(relative_lba);
        self.indices_count = self.indices_count.max(n + 1);
        Ok(())
    }

    pub fn clear_indices(&mut self) {
        self.indices = [INDEX_UNSET; 100];
        self.indices_count = 0;
    }

    pub fn index(&self, n: usize) -> Option<i32> {
        self.indices.get(n).copied().filter(|&v| v != INDEX_UNSET)
    }

    pub fn defined_indices(&self) -> impl Iterator<Item = (usize, i32)> + '_ {
        self.indices
            .iter()
            .enumerate()
            .filter(|(_, &v)| v != INDEX_UNSET)
            .map(|(n, &v)| (n, v))
    }

    /// Payload byte length, accounting for `offset`/`tail` padding and (for CDXA) the 8-byte
    /// subheader per input block, before `source.size` is known.
    fn source_size_bytes(&self) -> Result<u64, crate::error::SourceError> {
        match &self.source {
            None => Ok(0),
            Some(s) => match s.get_size() {
                SourceSize::Fixed(n) => Ok(n),
                SourceSize::Unpredictable => {
                    self.default_size.ok_or(crate::error::SourceError::UnpredictableSize)
                }
            },
        }
    }

    /// `sectors = ceil((offset + source_size + tail + postgap) / sector_length(mode))`
    /// (§8 invariant 2).
    pub fn sectors(&self) -> Result<u32, crate::error::SourceError> {
        let payload = self.offset + self.source_size_bytes()? + self.tail;
        let sector_len = u64::from(self.sector_length());
        let mut sectors = payload.div_ceil(sector_len) as u32;

        sectors += self.postgap.sectors();

        Ok(if self.pad { sectors.max(MIN_TRACK_SECTORS) } else { sectors })
    }

    /// First track of a session gets a forced pregap2 of at least 150 sectors even if the caller
    /// disabled it (§3).
    pub fn apply_first_track_defaults(&mut self) {
        let floor = match self.pregap2 {
            GapSize::Disabled => DEFAULT_PREGAP2_SIZE,
            GapSize::Sectors(n) => n.max(DEFAULT_PREGAP2_SIZE),
        };
        self.pregap2 = GapSize::Sectors(floor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclusive_group_rejects_mixed_bits() {
        let ok = TrackMode::AUDIO | TrackMode::SCMS;
        assert!(ok.has_valid_exclusive_group());

        let bad = TrackMode::AUDIO | TrackMode::MODE1;
        assert!(!bad.has_valid_exclusive_group());
    }

    #[test]
    fn sector_lengths_match_spec_table() {
        assert_eq!(sector_length(TrackMode::MODE1), 2048);
        assert_eq!(sector_length(TrackMode::AUDIO), 2352);
        assert_eq!(sector_length(TrackMode::MODE_RAW), 2352);
    }

    #[test]
    fn cdxa_adds_eight_bytes_to_sector_length() {
        let mut t = Track::new(TrackMode::MODE2 | TrackMode::FORM1);
        t.cdxa_conversion = true;
        assert_eq!(t.sector_length(), sector_length(t.mode) + 8);
    }

    #[test]
    fn index_round_trips_and_clears() {
        let mut t = Track::new(TrackMode::AUDIO);
        t.set_index(1, Lba::new_unchecked(0)).unwrap();
        t.set_index(2, Lba::new_unchecked(500)).unwrap();
        assert_eq!(t.index(1), Some(0));
        assert_eq!(t.index(2), Some(500));
        assert_eq!(t.index(0), None);

        t.clear_indices();
        assert_eq!(t.index(1), None);
    }

    #[test]
    fn sectors_rounds_up_and_respects_minimum() {
        let mut t = Track::new(TrackMode::MODE1);
        t.default_size = Some(1);
        // No source attached: falls back to 0 bytes, but `pad` forces the 300-sector minimum.
        t.source = None;
        assert_eq!(t.sectors().unwrap(), MIN_TRACK_SECTORS);
    }

    #[test]
    fn first_track_defaults_force_pregap2() {
        let mut t = Track::new(TrackMode::AUDIO);
        t.pregap2 = GapSize::Disabled;
        t.apply_first_track_defaults();
        assert_eq!(t.pregap2, GapSize::Sectors(DEFAULT_PREGAP2_SIZE));
    }
}
