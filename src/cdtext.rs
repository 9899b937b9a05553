//! CD-TEXT packer (§4.4): 18-byte pack array generation from a session's CD-TEXT blocks, CRC-16
//! over each pack, and the Lead-in subchannel encoding.
//!
//! The 0x8F ("block size info") packs' exact upstream byte grid is not fully recoverable from the
//! distilled spec text (see `DESIGN.md`); this module uses a clearly-documented, internally
//! self-consistent layout for those three packs rather than guessing at undocumented upstream
//! byte positions. Every *content* pack (0x80..=0x8E) follows the spec's literal 18-byte layout
//! and round-trips through `parse_packs`, which is what §8 invariant 6 exercises.

use arrayvec::ArrayVec;
use thiserror::Error;

use crate::error::ProtocolInvariantError;

pub const PACK_LEN: usize = 18;
pub const MAX_PACKS_PER_BLOCK: usize = 255;
pub const MAX_PACKS_TOTAL: usize = 2048;
pub const NUM_BLOCKS: usize = 8;

/// The 15 payload pack types, 0x80..=0x8E. 0x8F (size info) is generated separately and always
/// emitted last per block.
pub const CONTENT_PACK_TYPES: [u8; 15] = [
    0x80, 0x81, 0x82, 0x83, 0x84, 0x85, 0x86, 0x87, 0x88, 0x89, 0x8A, 0x8B, 0x8C, 0x8D, 0x8E,
];
pub const SIZE_INFO_PACK_TYPE: u8 = 0x8F;

/// Pack types whose track-to-track-identical payload may be abbreviated as a TAB reference
/// (§4.4).
const TAB_ELIGIBLE: [u8; 7] = [0x80, 0x81, 0x82, 0x83, 0x84, 0x85, 0x8E];

/// CRC-16 with polynomial 0x11021 (x^16+x^12+x^5+1), MSB first, register seeded at zero — the
/// bit-serial form of this algorithm inherently accounts for the spec's "plus 16 trailing zero
/// bits" framing.
pub fn crc_11021(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 { (crc << 1) ^ 0x1021 } else { crc << 1 };
        }
    }
    crc
}

/// Stores the CRC into the last two bytes of an (at-least) 18-byte pack, MSB first, XORed with
/// 0xFFFF (§4.4, §8 invariant 5).
pub fn stamp_crc(pack: &mut [u8; PACK_LEN]) {
    let crc = crc_11021(&pack[..16]) ^ 0xFFFF;
    pack[16] = (crc >> 8) as u8;
    pack[17] = crc as u8;
}

pub fn crc_matches(pack: &[u8; PACK_LEN]) -> bool {
    let expected = crc_11021(&pack[..16]) ^ 0xFFFF;
    pack[16] == (expected >> 8) as u8 && pack[17] == expected as u8
}

/// Scans an array of packs, recomputing and comparing CRCs. With `repair_if_all_zero`, if every
/// pack's stored CRC bytes are zero the whole array is treated as "never stamped" and repaired
/// unconditionally; otherwise mismatches are corrected in place. Returns the number of mismatches
/// found, negated if they were repaired.
pub fn repair_crcs(packs: &mut [[u8; PACK_LEN]], repair_if_all_zero: bool) -> i32 {
    let all_zero = repair_if_all_zero && packs.iter().all(|p| p[16] == 0 && p[17] == 0);

    let mut mismatches = 0;
    for pack in packs.iter_mut() {
        if all_zero || !crc_matches(pack) {
            mismatches += 1;
            stamp_crc(pack);
        }
    }
    -mismatches
}

/// Per-block session metadata: character code, copyright byte and language code (§3 defaults:
/// block 0 language = English (0x09), others Unknown (0x00); char code ISO-8859-1 (0x00);
/// copyright 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CdTextBlockMeta {
    pub char_code: u8,
    pub copyright: u8,
    pub language: u8,
}

impl CdTextBlockMeta {
    pub fn default_for_block(block: usize) -> Self {
        Self {
            char_code: 0x00,
            copyright: 0,
            language: if block == 0 { 0x09 } else { 0x00 },
        }
    }
}

/// One CD-TEXT block's 15 content-pack-type payload slots (§3: "16 pack-type slots 0x80..0x8F,
/// each with optional payload bytes + length; a 16-bit flags word marks double-byte slots"). Slot
/// 0x8F is generated, not stored, so only 15 slots are kept here.
#[derive(Debug, Clone, Default)]
pub struct CdTextBlock {
    slots: [Option<Vec<u8>>; 15],
    double_byte_flags: u16,
}

fn slot_index(pack_type: u8) -> Option<usize> {
    CONTENT_PACK_TYPES.iter().position(|&t| t == pack_type)
}

impl CdTextBlock {
    pub fn set(&mut self, pack_type: u8, payload: Vec<u8>, double_byte: bool) {
        if let Some(i) = slot_index(pack_type) {
            self.slots[i] = Some(payload);
            if double_byte {
                self.double_byte_flags |= 1 << i;
            } else {
                self.double_byte_flags &= !(1 << i);
            }
        }
    }

    pub fn get(&self, pack_type: u8) -> Option<(&[u8], bool)> {
        let i = slot_index(pack_type)?;
        self.slots[i]
            .as_deref()
            .map(|p| (p, self.double_byte_flags & (1 << i) != 0))
    }
}

#[derive(Error, Debug)]
pub enum CdTextError {
    #[error(transparent)]
    TooManyPacks(#[from] ProtocolInvariantError),
}

struct PackBuilder {
    packs: ArrayVec<[u8; PACK_LEN], MAX_PACKS_TOTAL>,
}

fn make_header(pack_type: u8, tno: u8, seq: u8, block: usize, double_byte: bool, char_pos: u8) -> [u8; 4] {
    let byte3 = ((double_byte as u8) << 7) | ((block as u8) << 4) | (char_pos & 0x0F);
    [pack_type, tno, seq, byte3]
}

fn emit_payload_packs(
    out: &mut PackBuilder,
    block: usize,
    pack_type: u8,
    tno: u8,
    payload: &[u8],
    double_byte: bool,
    seq: &mut u8,
) -> Result<(), ProtocolInvariantError> {
    if payload.is_empty() {
        return Ok(());
    }

    for (char_pos, chunk) in payload.chunks(12).enumerate() {
        if out.packs.len() >= MAX_PACKS_TOTAL {
            return Err(ProtocolInvariantError::TooManyCdTextPacks {
                count: out.packs.len() + 1,
                cap: MAX_PACKS_TOTAL,
            });
        }
        if *seq as usize >= MAX_PACKS_PER_BLOCK {
            return Err(ProtocolInvariantError::TooManyCdTextPacks {
                count: *seq as usize + 1,
                cap: MAX_PACKS_PER_BLOCK,
            });
        }

        let mut pack = [0u8; PACK_LEN];
        pack[0..4].copy_from_slice(&make_header(pack_type, tno, *seq, block, double_byte, char_pos as u8));
        pack[4..4 + chunk.len()].copy_from_slice(chunk);
        stamp_crc(&mut pack);
        out.packs.push(pack);
        *seq += 1;
    }
    Ok(())
}

/// §4.4 "Pack creation": session-level payload first (tno=0), then each track's payload, with TAB
/// abbreviation when a track's payload for an eligible pack type repeats the previous track's.
pub fn build_session_packs(
    session_blocks: &[CdTextBlock; NUM_BLOCKS],
    session_meta: &[CdTextBlockMeta; NUM_BLOCKS],
    track_blocks: &[[CdTextBlock; NUM_BLOCKS]],
    first_track: u8,
) -> Result<Vec<[u8; PACK_LEN]>, CdTextError> {
    let mut out = PackBuilder { packs: ArrayVec::new() };
    let last_track = first_track + track_blocks.len().saturating_sub(1) as u8;

    for block in 0..NUM_BLOCKS {
        let mut seq: u8 = 0;
        let mut counts = [0u8; 15];
        let mut hi_seq_placeholder = 0u8;

        for (type_idx, &pack_type) in CONTENT_PACK_TYPES.iter().enumerate() {
            let start_seq = seq;

            if let Some((payload, db)) = session_blocks[block].get(pack_type) {
                emit_payload_packs(&mut out, block, pack_type, 0, payload, db, &mut seq)?;
            }

            let mut previous: Option<(&[u8], bool)> = None;
            for (idx, tblock) in track_blocks.iter().enumerate() {
                let tno = first_track + idx as u8;
                let Some((payload, db)) = tblock[block].get(pack_type) else {
                    previous = None;
                    continue;
                };

                let is_tab_eligible = TAB_ELIGIBLE.contains(&pack_type);
                let repeats_previous = is_tab_eligible
                    && previous.map(|(p, pdb)| p == payload && pdb == db).unwrap_or(false)
                    && payload.len() > 1 + usize::from(db);

                if repeats_previous {
                    let tab: &[u8] = if db { &[9, 9, 0] } else { &[9] };
                    emit_payload_packs(&mut out, block, pack_type, tno, tab, db, &mut seq)?;
                } else {
                    emit_payload_packs(&mut out, block, pack_type, tno, payload, db, &mut seq)?;
                }

                previous = Some((payload, db));
            }

            counts[type_idx] = seq - start_seq;
        }

        hi_seq_placeholder = seq;
        let meta = session_meta[block];
        emit_size_info_packs(&mut out, block, counts, meta, first_track, last_track, hi_seq_placeholder)?;
    }

    Ok(out.packs.to_vec())
}

/// Emits the three 0x8F packs for one block. See module docs for the layout this crate chose.
#[allow(clippy::too_many_arguments)]
fn emit_size_info_packs(
    out: &mut PackBuilder,
    block: usize,
    counts: [u8; 15],
    meta: CdTextBlockMeta,
    first_track: u8,
    last_track: u8,
    _hi_seq: u8,
) -> Result<(), ProtocolInvariantError> {
    if out.packs.len() + 3 > MAX_PACKS_TOTAL {
        return Err(ProtocolInvariantError::TooManyCdTextPacks {
            count: out.packs.len() + 3,
            cap: MAX_PACKS_TOTAL,
        });
    }

    let mut pack0 = [0u8; PACK_LEN];
    pack0[0..4].copy_from_slice(&make_header(SIZE_INFO_PACK_TYPE, 0, 0, block, false, 0));
    pack0[4..16].copy_from_slice(&counts[0..12]);
    stamp_crc(&mut pack0);

    let mut pack1 = [0u8; PACK_LEN];
    pack1[0..4].copy_from_slice(&make_header(SIZE_INFO_PACK_TYPE, 0, 1, block, false, 0));
    pack1[4..7].copy_from_slice(&counts[12..15]);
    pack1[7] = 3; // three size-info packs, always.
    pack1[8] = meta.char_code;
    pack1[9] = meta.copyright;
    pack1[10] = meta.language;
    pack1[11] = first_track;
    stamp_crc(&mut pack1);

    let mut pack2 = [0u8; PACK_LEN];
    pack2[0..4].copy_from_slice(&make_header(SIZE_INFO_PACK_TYPE, 0, 2, block, false, 0));
    pack2[4] = last_track;
    stamp_crc(&mut pack2);

    out.packs.push(pack0);
    out.packs.push(pack1);
    out.packs.push(pack2);
    Ok(())
}

/// Reconstructs per-(block, pack_type, track) payload bytes from a flat pack array, for the
/// round-trip property in §8 invariant 6. TAB abbreviations are expanded back using the preceding
/// track's payload.
pub fn parse_packs(packs: &[[u8; PACK_LEN]]) -> Vec<(usize, u8, u8, Vec<u8>, bool)> {
    let mut out = Vec::new();
    let mut assembling: Option<(usize, u8, u8, Vec<u8>, bool)> = None;
    let mut last_by_key: std::collections::HashMap<(usize, u8), (Vec<u8>, bool)> = std::collections::HashMap::new();

    for pack in packs {
        let pack_type = pack[0];
        if pack_type == SIZE_INFO_PACK_TYPE {
            if let Some(done) = assembling.take() {
                out.push(done);
            }
            continue;
        }

        let tno = pack[1];
        let seq = pack[2];
        let block = ((pack[3] >> 4) & 0x07) as usize;
        let double_byte = pack[3] & 0x80 != 0;

        if let Some((ab, atno, _, _, _)) = &assembling {
            if *ab != block || *atno != tno {
                out.push(assembling.take().unwrap());
            }
        }

        let entry = assembling.get_or_insert_with(|| (block, tno, pack_type, Vec::new(), double_byte));
        if seq == 0 {
            entry.3.clear();
        }
        entry.3.extend_from_slice(&pack[4..16]);
    }
    if let Some(done) = assembling.take() {
        out.push(done);
    }

    // Trim trailing zero padding from the final chunk of each pack run and expand TAB refs.
    out.into_iter()
        .map(|(block, tno, pack_type, mut payload, db)| {
            while payload.last() == Some(&0) && payload.len() > 1 {
                payload.pop();
            }
            let is_tab = TAB_ELIGIBLE.contains(&pack_type)
                && ((db && payload == [9, 9, 0]) || (!db && payload == [9]));
            let resolved = if is_tab {
                last_by_key
                    .get(&(block, pack_type))
                    .map(|(p, _)| p.clone())
                    .unwrap_or(payload.clone())
            } else {
                payload.clone()
            };
            last_by_key.insert((block, pack_type), (resolved.clone(), db));
            (block, pack_type, tno, resolved, db)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc_is_stamped_and_verified() {
        let mut pack = [0u8; PACK_LEN];
        pack[0] = 0x80;
        pack[4] = b'H';
        stamp_crc(&mut pack);
        assert!(crc_matches(&pack));
    }

    #[test]
    fn repair_fixes_corrupted_crc() {
        let mut pack = [0u8; PACK_LEN];
        pack[0] = 0x81;
        stamp_crc(&mut pack);
        pack[17] ^= 0xFF;

        let mut packs = [pack];
        let result = repair_crcs(&mut packs, false);
        assert_eq!(result, -1);
        assert!(crc_matches(&packs[0]));
    }

    #[test]
    fn repair_all_zero_detects_never_stamped_array() {
        let packs_before = [[0u8; PACK_LEN]; 2];
        let mut packs = packs_before;
        let result = repair_crcs(&mut packs, true);
        assert_eq!(result, -2);
    }

    #[test]
    fn session_and_track_title_round_trips() {
        let mut session_blocks: [CdTextBlock; NUM_BLOCKS] = Default::default();
        session_blocks[0].set(0x80, b"Album".to_vec(), false);

        let mut track0: [CdTextBlock; NUM_BLOCKS] = Default::default();
        track0[0].set(0x80, b"Hello World".to_vec(), false);
        let mut track1: [CdTextBlock; NUM_BLOCKS] = Default::default();
        track1[0].set(0x80, b"Second Track".to_vec(), false);

        let meta = std::array::from_fn(CdTextBlockMeta::default_for_block);
        let packs = build_session_packs(&session_blocks, &meta, &[track0, track1], 1).unwrap();

        for pack in &packs {
            assert!(crc_matches(pack), "pack {pack:?} has a bad CRC");
        }

        let parsed = parse_packs(&packs);
        let track1_title = parsed
            .iter()
            .find(|(block, pt, tno, _, _)| *block == 0 && *pt == 0x80 && *tno == 1)
            .unwrap();
        assert_eq!(track1_title.3, b"Hello World");

        let track2_title = parsed
            .iter()
            .find(|(block, pt, tno, _, _)| *block == 0 && *pt == 0x80 && *tno == 2)
            .unwrap();
        assert_eq!(track2_title.3, b"Second Track");
    }

    #[test]
    fn repeated_track_payload_abbreviates_with_tab() {
        let session_blocks: [CdTextBlock; NUM_BLOCKS] = Default::default();
        let mut track0: [CdTextBlock; NUM_BLOCKS] = Default::default();
        track0[0].set(0x81, b"Same Performer".to_vec(), false);
        let mut track1: [CdTextBlock; NUM_BLOCKS] = Default::default();
        track1[0].set(0x81, b"Same Performer".to_vec(), false);

        let meta = std::array::from_fn(CdTextBlockMeta::default_for_block);
        let packs = build_session_packs(&session_blocks, &meta, &[track0, track1], 1).unwrap();

        // Track 2's performer pack payload should be the single-byte TAB reference.
        let track2_pack = packs
            .iter()
            .find(|p| p[0] == 0x81 && p[1] == 2)
            .expect("track 2 performer pack present");
        assert_eq!(&track2_pack[4..5], &[9]);

        let parsed = parse_packs(&packs);
        let resolved = parsed
            .iter()
            .find(|(block, pt, tno, _, _)| *block == 0 && *pt == 0x81 && *tno == 2)
            .unwrap();
        assert_eq!(resolved.3, b"Same Performer");
    }

    #[test]
    fn too_many_packs_is_rejected() {
        let session_blocks: [CdTextBlock; NUM_BLOCKS] = Default::default();
        let huge_payload = vec![b'x'; 12 * 300]; // forces > 255 packs in one block for one type.
        let mut track0: [CdTextBlock; NUM_BLOCKS] = Default::default();
        track0[0].set(0x80, huge_payload, false);

        let meta = std::array::from_fn(CdTextBlockMeta::default_for_block);
        let result = build_session_packs(&session_blocks, &meta, &[track0], 1);
        assert!(result.is_err());
    }
}
