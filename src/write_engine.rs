//! Write Engine & Mode Dispatcher (§4.1): precheck, write-type auto-selection, and the two
//! profile-driven write paths a [`crate::worker::WorkerKind::Write`] job runs through —
//! CD SAO/TAO/RAW (profiles 0x0009/0x000A) and the DVD/BD per-profile table — plus the stdio
//! pseudo-drive path and the finalize-damaged-track repair operation.
//!
//! Every step here runs on the worker thread `Library::spawn_worker` hands a write job to; the
//! control thread only ever observes it through `Drive::get_status`/`Drive::wrote_well` (§4.5).

use std::thread;
use std::time::{Duration, Instant};

use crate::addressing::Lba;
use crate::backend::WriteParameters;
use crate::cdtext::{CdTextBlock, CONTENT_PACK_TYPES};
use crate::commands::write_ops::CloseFunction;
use crate::disc::Disc;
use crate::drive::{BusyState, Drive, DriveRole, MediaStatus};
use crate::error::{Error, PrecheckError, ProtocolInvariantError, SourceError};
use crate::session::Session;
use crate::source::SourceSize;
use crate::track::{Track, TrackMode};
use crate::cuesheet;

/// §4.1 `auto_write_type`'s result, and the tag the rest of the engine keys its CD-path dispatch
/// on. DVD/BD profiles don't have a SAO/TAO/RAW distinction of their own; `write_disc` tags them
/// `Tao` purely so the shared per-block write loop has one write-type value to reason about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteType {
    Tao,
    Sao,
    Raw,
}

/// The knobs `write_disc` reads; everything else (per-profile command sequencing, buffer
/// backpressure constants) is the engine's own business.
#[derive(Debug, Clone, Copy)]
pub struct WriteOpts {
    /// `None` triggers [`auto_write_type`]. RAW is never auto-selected (§4.1).
    pub write_type: Option<WriteType>,
    /// Leave the session/disc open for a further `drive_add_session`-style append afterwards.
    pub multi: bool,
    /// Route every block through the drive's simulated-write mode instead of committing it.
    pub simulate: bool,
    /// Ask the engine to switch to WRITE(12)+Streaming once the drive's write buffer is primed
    /// (§4.1 "Stream recording"). Silently downgrades to WRITE(10) if priming never lands in the
    /// target fill window.
    pub force_stream_recording: bool,
    /// Accept appending an SAO session onto already-appendable media (the `start_runtime = nwa -
    /// 150` extension `cuesheet::build_cue_sheet` supports), rather than requiring blank media.
    pub allow_sao_append: bool,
    /// An explicit write start address. `None` always targets the drive-reported NWA.
    pub start_address: Option<Lba>,
}

impl Default for WriteOpts {
    fn default() -> Self {
        Self {
            write_type: None,
            multi: false,
            simulate: false,
            force_stream_recording: false,
            allow_sao_append: false,
            start_address: None,
        }
    }
}

fn is_cd_profile(profile: u16) -> bool {
    matches!(profile, 0x0009 | 0x000A)
}

/// Profiles with no on-medium "session" concept (formatted random-access media): a multi-session
/// disc tree makes no sense there.
fn has_no_session_concept(profile: u16) -> bool {
    matches!(profile, 0x0012 | 0x0043)
}

/// Profiles that only ever carry a single track per session (restricted-overwrite/random-access
/// rewritable media).
fn is_single_track_profile(profile: u16) -> bool {
    matches!(profile, 0x0012 | 0x0013 | 0x001A | 0x0043)
}

fn required_alignment(profile: u16) -> u32 {
    match profile {
        0x0012 | 0x0041 | 0x0043 => 16,
        _ => 1,
    }
}

fn block_has_content(block: &CdTextBlock) -> bool {
    CONTENT_PACK_TYPES.iter().any(|&t| block.get(t).is_some())
}

fn session_has_cdtext(session: &Session) -> bool {
    session.cdtext_blocks.iter().any(block_has_content)
        || session.tracks().iter().any(|t| t.cdtext.iter().any(block_has_content))
}

/// `precheck(opts, disc)` (§4.1): validates without a single byte of SCSI traffic or drive state
/// change. Every rejection reason matches one of the substring-testable [`PrecheckError`] variants.
pub fn precheck(opts: &WriteOpts, drive: &Drive, disc: &Disc) -> Result<(), PrecheckError> {
    let profile = drive.profile();
    let status = drive.status();
    let is_stdio = drive.role.is_stdio();

    if !is_stdio && profile == 0xFFFF {
        return Err(PrecheckError::NoSuitableProfile);
    }

    if matches!(status, MediaStatus::Full | MediaStatus::Unready | MediaStatus::Ungrabbed | MediaStatus::Unsuitable) {
        return Err(PrecheckError::NoWriteableMedia);
    }

    if matches!(opts.write_type, Some(WriteType::Sao)) {
        let sao_ok = status == MediaStatus::Blank || (opts.allow_sao_append && status == MediaStatus::Appendable);
        if !sao_ok {
            return Err(PrecheckError::SaoRequiresBlankMedia);
        }
    }

    if opts.simulate && !drive.backend.lock().unwrap().supports_simulation() {
        return Err(PrecheckError::SimulationUnsupported);
    }

    if has_no_session_concept(profile) && disc.num_sessions() > 1 {
        return Err(PrecheckError::MultiSessionUnsupported);
    }

    for session in disc.sessions() {
        if is_single_track_profile(profile) && session.num_tracks() > 1 {
            return Err(PrecheckError::MultiTrackUnsupported);
        }

        let mut saw_audio = false;
        let mut saw_data = false;
        let cdtext_present = session_has_cdtext(session);

        for track in session.tracks() {
            if !track.mode.has_valid_exclusive_group() {
                return Err(PrecheckError::UnsuitableTrackMode);
            }

            saw_audio |= track.mode.is_audio();
            saw_data |= track.mode.is_data();

            if !is_cd_profile(profile) && !is_stdio && track.mode.is_audio() {
                return Err(PrecheckError::NonDataTrackOnNonCd);
            }

            if !is_cd_profile(profile)
                && !is_stdio
                && track.mode.intersects(TrackMode::MODE2 | TrackMode::MODE_RAW | TrackMode::FORM2)
            {
                return Err(PrecheckError::UnsupportedBlockType);
            }

            match track.sectors() {
                Ok(_) => {}
                Err(SourceError::UnpredictableSize) => {
                    let tao_tolerant =
                        matches!(opts.write_type, Some(WriteType::Tao) | None) && track.end_on_premature_eoi;
                    if !tao_tolerant {
                        return Err(PrecheckError::TrackSizeUnpredictable);
                    }
                }
                // Any other source-level failure surfaces at write time, not as a precheck
                // rejection (precheck only reasons about sizes and modes, never touches a source).
                Err(_) => {}
            }
        }

        if matches!(opts.write_type, Some(WriteType::Raw)) && saw_audio && saw_data {
            return Err(PrecheckError::MixedTrackModes);
        }

        if cdtext_present && saw_data {
            return Err(PrecheckError::CdTextRequiresPureAudio);
        }
    }

    if let Some(addr) = opts.start_address {
        let nwa = Lba::new_unchecked(drive.nwa());
        if addr != nwa {
            return Err(PrecheckError::UnsupportedWriteStartAddress);
        }

        let alignment = required_alignment(profile);
        if alignment > 1 && (addr.raw().max(0) as u32) % alignment != 0 {
            return Err(PrecheckError::MisalignedWriteStartAddress(alignment));
        }
    }

    Ok(())
}

/// `auto_write_type(opts, disc)` (§4.1): SAO whenever CD-TEXT is present or the media is blank,
/// TAO otherwise, RAW only by explicit request. DVD/BD profiles are untagged by this distinction;
/// they're reported as `Tao` to key the shared write loop and are dispatched by `dvd_bd_path`'s own
/// per-profile table instead.
pub fn auto_write_type(opts: &WriteOpts, drive: &Drive, disc: &Disc) -> Result<WriteType, PrecheckError> {
    if let Some(wt) = opts.write_type {
        return Ok(wt);
    }

    let profile = drive.profile();
    if !is_cd_profile(profile) && !drive.role.is_stdio() {
        return Ok(WriteType::Tao);
    }

    if disc.sessions().iter().any(session_has_cdtext) {
        return Ok(WriteType::Sao);
    }

    if drive.status() == MediaStatus::Blank {
        return Ok(WriteType::Sao);
    }

    Ok(WriteType::Tao)
}

const MMC_WRITE_TYPE_TAO: u8 = 0x01;
const MMC_WRITE_TYPE_SAO: u8 = 0x02;
const MMC_WRITE_TYPE_RAW: u8 = 0x03;

fn mmc_write_type_byte(write_type: WriteType) -> u8 {
    match write_type {
        WriteType::Tao => MMC_WRITE_TYPE_TAO,
        WriteType::Sao => MMC_WRITE_TYPE_SAO,
        WriteType::Raw => MMC_WRITE_TYPE_RAW,
    }
}

fn mmc_track_mode_byte(mode: TrackMode) -> u8 {
    if mode.is_audio() || mode.contains(TrackMode::MODE_RAW) {
        0
    } else if mode.contains(TrackMode::MODE2) {
        2
    } else {
        4
    }
}

fn mmc_data_block_type_byte(mode: TrackMode) -> u8 {
    if mode.is_audio() {
        0
    } else if mode.contains(TrackMode::MODE_RAW) {
        3
    } else if mode.contains(TrackMode::MODE2) && mode.contains(TrackMode::FORM2) {
        9
    } else {
        8
    }
}

fn base_write_parameters(write_type: WriteType, mode: TrackMode, opts: &WriteOpts) -> WriteParameters {
    WriteParameters {
        write_type: mmc_write_type_byte(write_type),
        track_mode: mmc_track_mode_byte(mode),
        data_block_type: mmc_data_block_type_byte(mode),
        multi_session: u8::from(opts.multi),
        simulate: opts.simulate,
        stream_recording: false,
    }
}

/// Pulls a track's on-medium byte stream in order: `offset` zero bytes, the attached source up to
/// its reported (or `default_size`) length, `tail` zero bytes, then enough zero padding to reach
/// the sector-rounded track size `Track::sectors` computed. Stateful across calls so the write
/// loop can pull bounded chunks instead of buffering a whole track.
struct TrackCursor {
    sector_len: u64,
    total_bytes: u64,
    emitted: u64,
    offset_remaining: u64,
    source_remaining: u64,
    tail_remaining: u64,
    source_eof: bool,
}

impl TrackCursor {
    fn new(track: &Track) -> Result<Self, SourceError> {
        let sector_len = u64::from(track.sector_length());
        let total_bytes = u64::from(track.sectors()?) * sector_len;

        let source_bytes = match &track.source {
            None => 0,
            Some(s) => match s.get_size() {
                SourceSize::Fixed(n) => n,
                SourceSize::Unpredictable => track.default_size.unwrap_or(0),
            },
        };

        Ok(Self {
            sector_len,
            total_bytes,
            emitted: 0,
            offset_remaining: track.offset,
            source_remaining: source_bytes,
            tail_remaining: track.tail,
            source_eof: false,
        })
    }

    /// Returns the next chunk, sized to `want` bytes rounded down to a whole sector (at least one
    /// sector), or an empty `Vec` once the whole track has been emitted.
    fn next(&mut self, track: &Track, want: usize) -> Result<Vec<u8>, SourceError> {
        if self.emitted >= self.total_bytes {
            return Ok(Vec::new());
        }

        let remaining = self.total_bytes - self.emitted;
        let aligned = ((want as u64) / self.sector_len).max(1) * self.sector_len;
        let want = aligned.min(remaining) as usize;

        let mut buf = vec![0u8; want];
        let mut pos = 0usize;

        while pos < want {
            if self.offset_remaining > 0 {
                let take = self.offset_remaining.min((want - pos) as u64) as usize;
                pos += take; // zero-initialized already
                self.offset_remaining -= take as u64;
                continue;
            }

            if self.source_remaining > 0 && !self.source_eof {
                let take = self.source_remaining.min((want - pos) as u64) as usize;
                let got = match &track.source {
                    Some(source) => source.read(&mut buf[pos..pos + take])?,
                    None => 0,
                };
                pos += got;
                self.source_remaining = self.source_remaining.saturating_sub(got as u64);
                if got < take {
                    self.source_eof = true;
                    if self.source_remaining > 0 && !track.end_on_premature_eoi {
                        return Err(SourceError::ShortRead { requested: take, got });
                    }
                    self.source_remaining = 0;
                }
                continue;
            }

            if self.tail_remaining > 0 {
                let take = self.tail_remaining.min((want - pos) as u64) as usize;
                pos += take;
                self.tail_remaining -= take as u64;
                continue;
            }

            // Whatever's left in this chunk is trailing pad, already zeroed.
            pos = want;
        }

        self.emitted += want as u64;
        Ok(buf)
    }
}

fn write_block(drive: &Drive, lba: Lba, data: &[u8], opts: &WriteOpts) -> Result<(), Error> {
    if drive.is_cancelled() {
        return Err(Error::Cancelled);
    }

    // A real drive's own simulate bit (set via `set_write_parameters`) does the pretending; a
    // stdio/null pseudo-drive has no firmware to do that for it, so the engine skips the actual
    // write itself while still advancing NWA and progress (§4.1 "Simulation mode").
    let suppress_real_write = opts.simulate && drive.role != DriveRole::Mmc;
    if !suppress_real_write {
        drive.with_backend_mut(|b| b.write(lba, data))?;
    }
    Ok(())
}

/// Writes one track's pregap (host-supplied zero sectors, §3) followed by its payload, in chunks
/// sized to `block_bytes` (or the backend's own `max_transfer_len` if `None`). Returns the number
/// of sectors written, including the pregap.
fn write_track_data(drive: &Drive, track: &mut Track, start_lba: Lba, opts: &WriteOpts, block_bytes: Option<u32>) -> Result<u32, Error> {
    let sector_len = track.sector_length();
    let pregap_sectors = track.pregap2.sectors();
    let mut lba = start_lba;
    let mut total_sectors = 0u32;

    if pregap_sectors > 0 {
        drive.set_busy(BusyState::WritingPregap);
        let zero_block = vec![0u8; sector_len as usize];
        for _ in 0..pregap_sectors {
            write_block(drive, lba, &zero_block, opts)?;
            lba += Lba::new_unchecked(1);
            total_sectors += 1;
        }
    }

    drive.set_busy(BusyState::Writing);
    let chunk_bytes = block_bytes.unwrap_or_else(|| drive.with_backend_mut(|b| Ok(b.max_transfer_len())).unwrap_or(32 * 1024));

    let mut cursor = TrackCursor::new(track)?;
    loop {
        let block = cursor.next(track, chunk_bytes as usize)?;
        if block.is_empty() {
            break;
        }

        let sectors_in_block = block.len() as u32 / sector_len;
        write_block(drive, lba, &block, opts)?;
        lba += Lba::new_unchecked(sectors_in_block as i32);
        total_sectors += sectors_in_block;

        track.writecount += block.len() as u64;
        track.written_sectors += sectors_in_block;

        drive.with_progress_mut(|p| {
            p.sector = lba.raw().max(0) as u32;
            p.sectors = total_sectors;
        });
    }

    track.track_data_done = true;
    drive.set_nwa(lba.raw());
    Ok(total_sectors)
}

/// Primes the drive's write buffer up to a target fill window, then engages WRITE(12)+Streaming
/// (§4.1 "Stream recording"). Gives up and leaves WRITE(10) in place if the window is never
/// reached within a bounded number of polls — a stdio pseudo-drive's always-empty/always-full
/// buffer report degrades straight to that downgrade path.
fn establish_stream_recording(drive: &Drive, base_params: WriteParameters) -> Result<bool, Error> {
    const MIN_FILL_PERCENT: u32 = 50;
    const MAX_FILL_PERCENT: u32 = 90;
    const MIN_POLL: Duration = Duration::from_micros(10_000);
    const MAX_POLL: Duration = Duration::from_micros(500_000);
    const TIMEOUT: Duration = Duration::from_secs(10);

    let start = Instant::now();
    let mut poll = MIN_POLL;

    loop {
        let cap = drive.with_backend_mut(|b| b.read_buffer_capacity())?;
        if cap.total_bytes == 0 || cap.total_bytes == u32::MAX {
            return Ok(false);
        }

        let fill_percent = (u64::from(cap.total_bytes - cap.free_bytes) * 100 / u64::from(cap.total_bytes)) as u32;
        if (MIN_FILL_PERCENT..=MAX_FILL_PERCENT).contains(&fill_percent) {
            drive.with_backend_mut(|b| b.set_write_parameters(WriteParameters { stream_recording: true, ..base_params }))?;
            return Ok(true);
        }

        if start.elapsed() >= TIMEOUT {
            return Ok(false);
        }
        thread::sleep(poll);
        poll = (poll * 2).min(MAX_POLL);
    }
}

/// The CD path (profiles 0x0009/0x000A): cue sheet plus SEND CUE SHEET for SAO, per-track
/// reserve/write/close for TAO, lead-out sizing and a final session close (§4.1 steps 1-7).
fn cd_path(drive: &Drive, disc: &mut Disc, opts: &WriteOpts, write_type: WriteType, block_bytes: Option<u32>) -> Result<(), Error> {
    const LEADOUT_SECTORS_FINAL: u32 = 6750;
    const LEADOUT_SECTORS_INTERMEDIATE: u32 = 2250;

    drive.set_busy(BusyState::WritingLeadIn);

    let status = drive.status();
    let num_sessions = disc.num_sessions();

    for session_idx in 0..num_sessions {
        if drive.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let is_last_session = session_idx + 1 == num_sessions;
        let session = disc.session_mut(session_idx).expect("index in range");
        let cdtext_present = session_has_cdtext(session);

        let start_runtime = if session_idx == 0 && status == MediaStatus::Blank {
            Lba::MIN
        } else {
            Lba::new_unchecked(drive.nwa()) - Lba::new_unchecked(150)
        };

        let first_mode = session.track(0).map(|t| t.mode).unwrap_or(TrackMode::AUDIO);

        if write_type == WriteType::Sao {
            let (records, _toc) = cuesheet::build_cue_sheet(session, start_runtime, cdtext_present)?;
            let flat: Vec<u8> = records.iter().flatten().copied().collect();
            drive.with_backend_mut(|b| b.send_cue_sheet(&flat))?;
        }

        let base_params = base_write_parameters(write_type, first_mode, opts);
        drive.with_backend_mut(|b| b.set_write_parameters(base_params))?;

        let stream_params = if opts.force_stream_recording {
            establish_stream_recording(drive, base_params)?;
            WriteParameters { stream_recording: true, ..base_params }
        } else {
            base_params
        };
        let _ = stream_params;

        let num_tracks = session.num_tracks();
        for track_idx in 0..num_tracks {
            if drive.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let track_number = session.first_track + track_idx as u8;
            let track = session.track_mut(track_idx).expect("index in range");

            if write_type == WriteType::Tao {
                let sectors = track.sectors()?;
                drive.with_backend_mut(|b| b.reserve_track(sectors))?;

                // §4.1 step 4b: query NWA after the mode-page-5 write-parameters/reserve-track
                // setup; a drive reporting a smaller NWA than we already hold is a protocol
                // invariant violation, not a recoverable condition.
                let expected = drive.nwa();
                let reported = drive.with_backend_mut(|b| b.get_nwa())?;
                if reported < expected {
                    return Err(ProtocolInvariantError::NwaRegressed { reported, expected }.into());
                }
                drive.set_nwa(reported);
            }

            let start_lba = Lba::new_unchecked(drive.nwa());
            write_track_data(drive, track, start_lba, opts, block_bytes)?;

            if write_type == WriteType::Tao {
                drive.set_busy(BusyState::ClosingTrack);
                let is_last_track = track_idx + 1 == num_tracks;
                let function = if is_last_track && !opts.multi { CloseFunction::CloseSession } else { CloseFunction::CloseTrack };
                drive.with_backend_mut(|b| b.close_track(u16::from(track_number), function))?;
                drive.with_backend_mut(|b| b.sync_cache())?;
            }
        }

        if write_type != WriteType::Tao {
            drive.set_busy(BusyState::ClosingSession);
            if !opts.multi {
                drive.with_backend_mut(|b| b.close_session(CloseFunction::CloseSession))?;
            }
        }

        let leadout_sectors = if is_last_session && !opts.multi { LEADOUT_SECTORS_FINAL } else { LEADOUT_SECTORS_INTERMEDIATE };
        drive.with_progress_mut(|p| p.sectors_total = p.sectors_total.saturating_add(leadout_sectors));
    }

    drive.set_busy(BusyState::WritingLeadOut);
    drive.with_backend_mut(|b| b.sync_cache())?;
    Ok(())
}

fn pre_track_profile_setup(drive: &Drive, profile: u16, track: &Track) -> Result<(), Error> {
    if matches!(profile, 0x0011 | 0x0014 | 0x0015 | 0x0041) {
        let sectors = track.sectors()?;
        drive.with_backend_mut(|b| b.reserve_track(sectors))?;
    }
    Ok(())
}

fn post_track_profile_close(drive: &Drive, profile: u16, track_number: u16, is_last: bool, opts: &WriteOpts) -> Result<(), Error> {
    let function = match profile {
        0x0011 | 0x0014 | 0x0015 | 0x0041 if is_last && !opts.multi => CloseFunction::CloseSessionAndFinalize,
        0x0011 | 0x0014 | 0x0015 | 0x0041 => CloseFunction::CloseTrack,
        0x001B | 0x002B if is_last && !opts.multi => CloseFunction::CloseSessionAndFinalize,
        0x001B | 0x002B => CloseFunction::CloseTrack,
        // 0x12/0x13/0x1A/0x43 are random-access/overwrite profiles: no per-track close (§4.1).
        _ => return Ok(()),
    };
    drive.with_backend_mut(|b| b.close_track(track_number, function))?;
    Ok(())
}

fn finalize_profile(drive: &Drive, profile: u16, opts: &WriteOpts) -> Result<(), Error> {
    if matches!(profile, 0x0013 | 0x001A) && !opts.multi {
        drive.with_backend_mut(|b| b.format_unit(None))?;
    }
    Ok(())
}

/// The DVD/BD path: a per-profile table of setup/per-track-open/per-track-close/finalize steps
/// (§4.1), sharing the CD path's per-block write loop via [`write_track_data`].
fn dvd_bd_path(drive: &Drive, disc: &mut Disc, opts: &WriteOpts, block_bytes: Option<u32>) -> Result<(), Error> {
    let profile = drive.profile();

    drive.set_busy(BusyState::WritingLeadIn);

    let first_mode = disc
        .session(0)
        .and_then(|s| s.track(0))
        .map(|t| t.mode)
        .unwrap_or(TrackMode::MODE1);
    let base_params = base_write_parameters(WriteType::Tao, first_mode, opts);
    drive.with_backend_mut(|b| b.set_write_parameters(base_params))?;

    if opts.force_stream_recording {
        establish_stream_recording(drive, base_params)?;
    }
    let forced_block_bytes = if matches!(profile, 0x0041 | 0x0043) && opts.force_stream_recording {
        Some(64 * 1024)
    } else {
        block_bytes
    };

    let num_sessions = disc.num_sessions();
    for session_idx in 0..num_sessions {
        if drive.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let is_last_session = session_idx + 1 == num_sessions;
        let session = disc.session_mut(session_idx).expect("index in range");
        let num_tracks = session.num_tracks();

        for track_idx in 0..num_tracks {
            if drive.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let is_last_track = track_idx + 1 == num_tracks;
            let track_number = session.first_track as u16 + track_idx as u16;
            let track = session.track_mut(track_idx).expect("index in range");

            pre_track_profile_setup(drive, profile, track)?;

            let start_lba = Lba::new_unchecked(drive.nwa());
            write_track_data(drive, track, start_lba, opts, forced_block_bytes)?;

            post_track_profile_close(drive, profile, track_number, is_last_track && is_last_session, opts)?;
        }
    }

    drive.set_busy(BusyState::WritingLeadOut);
    finalize_profile(drive, profile, opts)?;
    drive.with_backend_mut(|b| b.sync_cache())?;
    Ok(())
}

/// The stdio pseudo-drive path (§4.1 table's "stdio (roles 2/5)" row): no cue sheet, no mode
/// pages, no session/track close semantics beyond the backend's own fsync-on-close — just the
/// shared write loop and a final sync.
fn stdio_path(drive: &Drive, disc: &mut Disc, opts: &WriteOpts) -> Result<(), Error> {
    for session_idx in 0..disc.num_sessions() {
        if drive.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let session = disc.session_mut(session_idx).expect("index in range");
        for track_idx in 0..session.num_tracks() {
            if drive.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let track_number = session.first_track as u16 + track_idx as u16;
            let track = session.track_mut(track_idx).expect("index in range");

            let start_lba = Lba::new_unchecked(drive.nwa());
            write_track_data(drive, track, start_lba, opts, None)?;
            drive.with_backend_mut(|b| b.close_track(track_number, CloseFunction::CloseTrack))?;
        }
    }

    drive.with_backend_mut(|b| b.close_session(CloseFunction::CloseSession))?;
    drive.with_backend_mut(|b| b.sync_cache())?;
    Ok(())
}

/// Top-level entry point (§4.1): precheck, resolve the write type, then dispatch to whichever of
/// the three paths above fits the drive's role/profile. Always leaves the drive idle and marks
/// `wrote_well` false if cancellation was ever observed, matching §7.
pub fn write_disc(drive: &Drive, disc: &mut Disc, opts: &WriteOpts) -> Result<(), Error> {
    drive.require_grabbed()?;
    drive.require_idle()?;
    precheck(opts, drive, disc)?;
    let write_type = auto_write_type(opts, drive, disc)?;

    drive.reset_cancel();
    drive.set_wrote_well(true);
    drive.with_progress_mut(|p| {
        p.reset_for_new_write();
        p.sessions_total = disc.num_sessions() as u32;
        p.tracks_total = disc.sessions().iter().map(Session::num_tracks).sum::<usize>() as u32;
    });

    let result = if drive.role.is_stdio() {
        stdio_path(drive, disc, opts)
    } else if is_cd_profile(drive.profile()) {
        cd_path(drive, disc, opts, write_type, None)
    } else {
        dvd_bd_path(drive, disc, opts, None)
    };

    if result.is_err() || drive.is_cancelled() {
        drive.set_wrote_well(false);
    }
    drive.set_busy(BusyState::Idle);
    drive.mark_unready();
    result
}

/// Repairs a track left incomplete by a prior aborted write (§4.1 "Finalize damaged track"),
/// gated on the caller asserting `next_track_damaged` (read back from the drive's own track info)
/// or passing `force`.
pub fn finalize_damaged_track(drive: &Drive, track_number: u16, next_track_damaged: bool, force: bool) -> Result<(), Error> {
    if !next_track_damaged && !force {
        return Err(Error::ProtocolInvariant(ProtocolInvariantError::TrackNotDamaged));
    }

    let profile = drive.profile();
    let function = match profile {
        0x0009 | 0x000A => CloseFunction::CloseSession,
        0x0011 | 0x0014 | 0x0015 | 0x0041 | 0x001B | 0x002B => CloseFunction::CloseSessionAndFinalize,
        _ => return Err(Error::ProtocolInvariant(ProtocolInvariantError::NoFinalizeSequenceForProfile(profile))),
    };

    drive.set_busy(BusyState::ClosingTrack);
    drive.with_backend_mut(|b| b.close_track(track_number, function))?;
    drive.with_backend_mut(|b| b.close_session(function))?;
    drive.with_backend_mut(|b| b.sync_cache())?;
    drive.set_busy(BusyState::Idle);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::null::NullBackend;
    use crate::backend::stdio::StdioBackend;
    use crate::source::file::FileSource;
    use crate::source::Source;
    use std::fs::OpenOptions;
    use std::io::Write as _;
    use std::sync::{Arc, Mutex};

    fn scratch_path() -> std::path::PathBuf {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let path = tmp.into_temp_path();
        let pathbuf = path.to_path_buf();
        std::mem::forget(path);
        pathbuf
    }

    fn stdio_drive(role: DriveRole, initial_len: u64) -> Drive {
        let path = scratch_path();
        let file = OpenOptions::new().read(true).write(true).open(&path).unwrap();
        file.set_len(initial_len).unwrap();
        let backend = StdioBackend::new(file, role, 2048, 0);
        let drive = Drive::new("TEST", "STDIO", "1.0", role, Box::new(backend));
        drive.grab().unwrap();
        drive
    }

    #[test]
    fn precheck_rejects_sao_on_appendable_media() {
        let drive = stdio_drive(DriveRole::StdioReadWrite, 4096);
        let disc = Disc::new();
        let opts = WriteOpts { write_type: Some(WriteType::Sao), ..Default::default() };
        assert_eq!(precheck(&opts, &drive, &disc), Err(PrecheckError::SaoRequiresBlankMedia));
    }

    #[test]
    fn auto_write_type_prefers_sao_on_blank_media() {
        let drive = stdio_drive(DriveRole::StdioReadWrite, 0);
        let mut disc = Disc::new();
        disc.add_session(Session::new(), None);
        let opts = WriteOpts::default();
        assert_eq!(auto_write_type(&opts, &drive, &disc).unwrap(), WriteType::Sao);
    }

    #[test]
    fn auto_write_type_falls_back_to_tao_on_appendable_media() {
        let drive = stdio_drive(DriveRole::StdioReadWrite, 4096);
        let mut disc = Disc::new();
        disc.add_session(Session::new(), None);
        let opts = WriteOpts::default();
        assert_eq!(auto_write_type(&opts, &drive, &disc).unwrap(), WriteType::Tao);
    }

    #[test]
    fn simulate_is_rejected_when_backend_does_not_support_it() {
        let drive = Drive::new("TEST", "NULL", "1.0", DriveRole::Null, Box::new(NullBackend));
        let disc = Disc::new();
        let opts = WriteOpts { simulate: true, ..Default::default() };
        assert_eq!(precheck(&opts, &drive, &disc), Err(PrecheckError::SimulationUnsupported));
    }

    #[test]
    fn raw_write_type_rejects_mixed_track_modes() {
        let drive = stdio_drive(DriveRole::StdioReadWrite, 0);
        let mut disc = Disc::new();
        let mut session = Session::new();
        session.add_track(Track::new(TrackMode::AUDIO), None).unwrap();
        session.add_track(Track::new(TrackMode::MODE1), None).unwrap();
        disc.add_session(session, None);

        let opts = WriteOpts { write_type: Some(WriteType::Raw), ..Default::default() };
        assert_eq!(precheck(&opts, &drive, &disc), Err(PrecheckError::MixedTrackModes));
    }

    #[test]
    fn cdtext_on_a_data_track_is_rejected() {
        let drive = stdio_drive(DriveRole::StdioReadWrite, 0);
        let mut disc = Disc::new();
        let mut session = Session::new();
        session.cdtext_blocks[0].set(0x80, b"Title".to_vec(), false);
        session.add_track(Track::new(TrackMode::MODE1), None).unwrap();
        disc.add_session(session, None);

        let opts = WriteOpts::default();
        assert_eq!(precheck(&opts, &drive, &disc), Err(PrecheckError::CdTextRequiresPureAudio));
    }

    #[test]
    fn write_track_data_round_trips_a_small_audio_track() {
        let drive = stdio_drive(DriveRole::StdioReadWrite, 0);

        let mut src_tmp = tempfile::NamedTempFile::new().unwrap();
        let payload = vec![0xABu8; 2352 * 3];
        src_tmp.write_all(&payload).unwrap();

        let mut track = Track::new(TrackMode::AUDIO);
        track.pad = false;
        track.attach_source(Source::File(Arc::new(Mutex::new(FileSource::open(src_tmp.path()).unwrap()))));

        let opts = WriteOpts::default();
        let sectors = write_track_data(&drive, &mut track, Lba::ZERO, &opts, None).unwrap();
        assert_eq!(sectors, 3);
        assert!(track.track_data_done);
        assert_eq!(drive.nwa(), 3);
    }

    #[test]
    fn write_disc_rejects_when_drive_not_grabbed() {
        let drive = Drive::new("TEST", "NULL", "1.0", DriveRole::Null, Box::new(NullBackend));
        let mut disc = Disc::new();
        let opts = WriteOpts::default();
        assert!(write_disc(&drive, &mut disc, &opts).is_err());
    }

    #[test]
    fn finalize_damaged_track_requires_damage_or_force() {
        let drive = stdio_drive(DriveRole::StdioReadWrite, 4096);
        assert!(matches!(
            finalize_damaged_track(&drive, 1, false, false),
            Err(Error::ProtocolInvariant(ProtocolInvariantError::TrackNotDamaged))
        ));
    }
}
