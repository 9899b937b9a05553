//! CUE sheet builder (§3, §4.3): encodes a session's tracks, indices, pre/post-gaps, ISRC and
//! media catalog into the 8-byte MMC `SEND CUE SHEET` record stream, plus a parallel array of
//! `toc_entry` records mirroring a READ TOC response (points `0xA0`/`0xA1`/`0xA2` plus one per
//! track).

use bitflags::bitflags;

use crate::addressing::{Lba, Msf};
use crate::session::Session;
use crate::track::{TrackMode, MIN_TRACK_SECTORS};

bitflags! {
    /// The Q-subchannel CTL nibble (§3): data/audio, copy-permitted, pre-emphasis/incremental,
    /// four-channel.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Ctl: u8 {
        const FOUR_CHANNEL = 1 << 0;
        const PRE_EMPHASIS = 1 << 1;
        const COPY         = 1 << 2;
        const DATA_TRACK   = 1 << 3;
    }
}

fn ctl_for_mode(mode: TrackMode) -> Ctl {
    let mut ctl = Ctl::empty();
    if mode.is_data() {
        ctl |= Ctl::DATA_TRACK;
    }
    if mode.contains(TrackMode::COPY) {
        ctl |= Ctl::COPY;
    }
    if mode.contains(TrackMode::PREEMPHASIS) {
        ctl |= Ctl::PRE_EMPHASIS;
    }
    if mode.contains(TrackMode::FOUR_CH) {
        ctl |= Ctl::FOUR_CHANNEL;
    }
    ctl
}

/// `form` byte: mode plus subchannel flags (§3). `0x01` audio, `0x14` data-mode1-ish, with `0x40`
/// added when CD-TEXT will be present in the Lead-in.
fn form_for_mode(mode: TrackMode, cdtext_present: bool) -> u8 {
    let base = if mode.is_audio() { 0x01 } else { 0x14 };
    base | if cdtext_present { 0x40 } else { 0x00 }
}

/// One 8-byte `SEND CUE SHEET` record.
pub type CueRecord = [u8; 8];

fn track_record(ctl: Ctl, tno: u8, index: u8, form: u8, scms: u8, msf: Msf) -> CueRecord {
    [ctl.bits() << 4 | 0x01, tno, index, form, scms, msf.0, msf.1, msf.2]
}

fn catalog_records(catalog: &[u8; 13]) -> [CueRecord; 2] {
    let mut r1 = [0x02u8; 8];
    r1[1..8].copy_from_slice(&catalog[0..7]);
    let mut r2 = [0x02u8; 8];
    r2[1..7].copy_from_slice(&catalog[7..13]);
    r2[7] = 0;
    [r1, r2]
}

fn isrc_records(ctl: Ctl, tno: u8, isrc: &crate::isrc::Isrc) -> [CueRecord; 2] {
    let encoded = isrc.encode();
    let bytes = encoded.as_bytes();
    let header = ctl.bits() << 4 | 0x03;

    let mut r1 = [0u8; 8];
    r1[0] = header;
    r1[1] = tno;
    r1[2..7].copy_from_slice(&bytes[0..5]); // country(2) + owner(3)
    r1[7] = bytes[5]; // year digit A

    let mut r2 = [0u8; 8];
    r2[0] = header;
    r2[1] = tno;
    r2[2] = bytes[6]; // year digit B
    r2[3..8].copy_from_slice(&bytes[7..12]); // serial (5 digits)

    [r1, r2]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TocEntry {
    pub point: u8,
    pub adr: u8,
    pub control: u8,
    pub pmin: u8,
    pub psec: u8,
    pub pframe: u8,
}

impl TocEntry {
    fn at(point: u8, ctl: Ctl, msf: Msf) -> Self {
        Self {
            point,
            adr: 1,
            control: ctl.bits(),
            pmin: msf.0,
            psec: msf.1,
            pframe: msf.2,
        }
    }
}

/// `create_toc_entries` (§4.3): builds the cue-sheet byte stream and the parallel TOC entry
/// array. `start_runtime` is the initial LBA (`-150` for fresh CD media, or `nwa - 150` for
/// appendable media per the SAO-append extension).
pub fn build_cue_sheet(
    session: &mut Session,
    start_runtime: Lba,
    cdtext_present: bool,
) -> Result<(Vec<CueRecord>, Vec<TocEntry>), crate::error::SourceError> {
    let mut records = Vec::new();
    let mut toc = Vec::new();

    let first_ctl = session
        .track(0)
        .map(|t| ctl_for_mode(t.mode))
        .unwrap_or(Ctl::empty());
    let lead_in_form = form_for_mode(
        if first_ctl.contains(Ctl::DATA_TRACK) { TrackMode::MODE1 } else { TrackMode::AUDIO },
        cdtext_present,
    );
    records.push(track_record(first_ctl, 0, 0, lead_in_form, 0, Msf::from(start_runtime)));
    toc.push(TocEntry::at(0xA0, first_ctl, Msf::from(start_runtime)));

    if let Some(catalog) = session.catalog() {
        let mut digits = [0u8; 13];
        digits.copy_from_slice(catalog.as_bytes());
        records.extend(catalog_records(&digits));
    }

    let mut runtime = start_runtime;
    session.apply_first_track_defaults();

    let first_track = session.first_track;
    let num_tracks = session.num_tracks();

    for i in 0..num_tracks {
        let tno = first_track + i as u8;
        let track = session.track_mut(i).expect("index in range");

        // §8 invariant 4: enforce the 300-sector minimum by forcing padding.
        if track.sectors()? < MIN_TRACK_SECTORS {
            track.pad = true;
        }

        let ctl = ctl_for_mode(track.mode);

        if let Some(isrc) = &track.isrc {
            records.extend(isrc_records(ctl, tno, isrc));
        }

        let pregap_sectors = track.pregap2.sectors();

        if pregap_sectors > 0 {
            records.push(track_record(ctl, tno, 0, form_for_mode(track.mode, cdtext_present), 0, Msf::from(runtime)));
            runtime += Lba::new_unchecked(pregap_sectors as i32);
        }

        let index1_msf = Msf::from(runtime);
        records.push(track_record(ctl, tno, 1, form_for_mode(track.mode, cdtext_present), 0, index1_msf));
        toc.push(TocEntry::at(tno, ctl, index1_msf));

        for (n, relative_lba) in track.defined_indices() {
            if n <= 1 {
                continue;
            }
            let abs = runtime + Lba::new_unchecked(relative_lba);
            records.push(track_record(ctl, tno, n as u8, form_for_mode(track.mode, cdtext_present), 0, Msf::from(abs)));
        }

        let sectors = track.sectors()?;
        runtime += Lba::new_unchecked(sectors as i32);

        if track.postgap.is_enabled() {
            records.push(track_record(ctl, tno, 0xFE, form_for_mode(track.mode, cdtext_present), 0, Msf::from(runtime)));
        }
    }

    let leadout_msf = Msf::from(runtime);
    records.push(track_record(first_ctl, 0xAA, 1, lead_in_form, 0, leadout_msf));
    toc.push(TocEntry::at(0xA2, first_ctl, leadout_msf));

    Ok((records, toc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addressing::Lba;
    use crate::track::Track;

    #[test]
    fn lead_in_and_lead_out_bracket_the_records() {
        let mut session = Session::new();
        session.add_track(Track::new(TrackMode::AUDIO), None).unwrap();

        let (records, toc) = build_cue_sheet(&mut session, Lba::MIN, false).unwrap();
        assert_eq!(records[0][1], 0); // lead-in, tno 0
        assert_eq!(records.last().unwrap()[1], 0xAA); // lead-out

        assert_eq!(toc[0].point, 0xA0);
        assert_eq!(toc.last().unwrap().point, 0xA2);
    }

    #[test]
    fn catalog_emits_two_type2_records() {
        let mut session = Session::new();
        session.set_catalog("1234567890123").unwrap();
        session.add_track(Track::new(TrackMode::AUDIO), None).unwrap();

        let (records, _) = build_cue_sheet(&mut session, Lba::MIN, false).unwrap();
        let catalog_records: Vec<_> = records.iter().filter(|r| r[0] == 0x02).collect();
        assert_eq!(catalog_records.len(), 2);
    }

    #[test]
    fn isrc_emits_two_type3_records() {
        let mut session = Session::new();
        let mut track = Track::new(TrackMode::AUDIO);
        track.isrc = Some(crate::isrc::Isrc::new("us", "abc", 20, 12345).unwrap());
        session.add_track(track, None).unwrap();

        let (records, _) = build_cue_sheet(&mut session, Lba::MIN, false).unwrap();
        let isrc_records: Vec<_> = records.iter().filter(|r| r[0] & 0x0F == 0x03).collect();
        assert_eq!(isrc_records.len(), 2);
    }

    #[test]
    fn msf_is_monotonically_non_decreasing() {
        let mut session = Session::new();
        session.add_track(Track::new(TrackMode::AUDIO), None).unwrap();
        session.add_track(Track::new(TrackMode::AUDIO), None).unwrap();

        let (records, _) = build_cue_sheet(&mut session, Lba::MIN, false).unwrap();
        let msfs: Vec<Msf> = records.iter().map(|r| Msf::new_unchecked(r[5], r[6], r[7])).collect();
        let lbas: Vec<i32> = msfs.iter().map(|&m| Lba::try_from(m).unwrap().raw()).collect();
        assert!(lbas.windows(2).all(|w| w[0] <= w[1]), "{lbas:?} not monotonic");
    }
}
