//! Write-path MMC commands: mode-page setup, cue sheet delivery, and the track/session/media
//! lifecycle operations the write engine drives (§4.1).

use crate::addressing::Lba;

use super::{Control, WriteCommand};

/// WRITE(10) (0x2A) — the ordinary sequential output command used for TAO/Incremental/DAO and any
/// SAO track that doesn't ask for stream recording.
#[derive(Debug, Clone)]
pub struct Write10 {
    pub lba: Lba,
    pub transfer_length: u16,
    pub data: Vec<u8>,
    pub control: Control,
}

impl WriteCommand<10> for Write10 {
    const OP_CODE: u8 = 0x2A;

    fn as_cdb(&self) -> [u8; 10] {
        let mut bytes = [0u8; 10];
        let lba: i32 = self.lba.into();

        bytes[0] = Self::OP_CODE;
        bytes[2..6].copy_from_slice(&lba.to_be_bytes());
        bytes[7..9].copy_from_slice(&self.transfer_length.to_be_bytes());
        bytes[9] = self.control.into();

        bytes
    }

    fn parameter_list(&self) -> Vec<u8> {
        self.data.clone()
    }
}

/// WRITE(12) (0xAA) with the Streaming bit set — used when the engine is asked to force stream
/// recording (§4.1 "Stream recording"), which WRITE(10) cannot request.
#[derive(Debug, Clone)]
pub struct Write12Streaming {
    pub lba: Lba,
    pub transfer_length: u32,
    pub data: Vec<u8>,
    pub control: Control,
}

impl WriteCommand<12> for Write12Streaming {
    const OP_CODE: u8 = 0xAA;

    fn as_cdb(&self) -> [u8; 12] {
        let mut bytes = [0u8; 12];
        let lba: i32 = self.lba.into();

        bytes[0] = Self::OP_CODE;
        bytes[1] = 1 << 7; // STREAMING
        bytes[2..6].copy_from_slice(&lba.to_be_bytes());
        bytes[6..10].copy_from_slice(&self.transfer_length.to_be_bytes());
        bytes[11] = self.control.into();

        bytes
    }

    fn parameter_list(&self) -> Vec<u8> {
        self.data.clone()
    }
}

/// SEND CUE SHEET (0x5D) — delivers the 8-byte-record cue sheet built by `cuesheet` for a CD SAO
/// burn.
#[derive(Debug, Clone)]
pub struct SendCueSheet {
    pub cue_sheet: Vec<u8>,
    pub control: Control,
}

impl WriteCommand<10> for SendCueSheet {
    const OP_CODE: u8 = 0x5D;

    fn as_cdb(&self) -> [u8; 10] {
        let mut bytes = [0u8; 10];
        let len = self.cue_sheet.len() as u32;

        bytes[0] = Self::OP_CODE;
        bytes[6] = (len >> 16) as u8;
        bytes[7] = (len >> 8) as u8;
        bytes[8] = len as u8;
        bytes[9] = self.control.into();

        bytes
    }

    fn parameter_list(&self) -> Vec<u8> {
        self.cue_sheet.clone()
    }
}

/// RESERVE TRACK (0x53) — pre-reserves space for a track before streaming (TAO/incremental).
#[derive(Debug, Clone, Copy)]
pub struct ReserveTrack {
    pub reservation_size: u32,
    pub control: Control,
}

impl WriteCommand<10> for ReserveTrack {
    const OP_CODE: u8 = 0x53;

    fn as_cdb(&self) -> [u8; 10] {
        let mut bytes = [0u8; 10];

        bytes[0] = Self::OP_CODE;
        bytes[5..9].copy_from_slice(&self.reservation_size.to_be_bytes());
        bytes[9] = self.control.into();

        bytes
    }
}

/// The function code carried by byte 1 bits 2:0 of CLOSE TRACK/SESSION.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseFunction {
    /// Close the current track only, leaving the session open.
    CloseTrack,
    /// Close the current session (the form used by DVD-R(W)/profile 0x15 and the CD TAO path).
    CloseSession,
    /// Close track and, because it is the last, also finalize the disc (DVD+R/BD-R "is_last").
    CloseSessionAndFinalize,
}

impl CloseFunction {
    fn bits(self) -> u8 {
        match self {
            Self::CloseTrack => 0b001,
            Self::CloseSession => 0b010,
            Self::CloseSessionAndFinalize => 0b110,
        }
    }
}

/// CLOSE TRACK/SESSION (0x5B).
#[derive(Debug, Clone, Copy)]
pub struct CloseTrackSession {
    pub immediate: bool,
    pub function: CloseFunction,
    pub track_number: u16,
    pub control: Control,
}

impl WriteCommand<10> for CloseTrackSession {
    const OP_CODE: u8 = 0x5B;

    fn as_cdb(&self) -> [u8; 10] {
        let mut bytes = [0u8; 10];

        bytes[0] = Self::OP_CODE;
        bytes[1] = (u8::from(self.immediate) << 1) | self.function.bits();
        bytes[4..6].copy_from_slice(&self.track_number.to_be_bytes());
        bytes[9] = self.control.into();

        bytes
    }
}

/// SYNCHRONIZE CACHE (0x35) — flushes the drive's write cache; the engine issues this after every
/// track (TAO) and at the end of every burn.
#[derive(Debug, Clone, Copy)]
pub struct SynchronizeCache {
    pub immediate: bool,
    pub control: Control,
}

impl WriteCommand<10> for SynchronizeCache {
    const OP_CODE: u8 = 0x35;

    fn as_cdb(&self) -> [u8; 10] {
        let mut bytes = [0u8; 10];

        bytes[0] = Self::OP_CODE;
        bytes[1] = u8::from(self.immediate) << 1;
        bytes[9] = self.control.into();

        bytes
    }
}

/// FORMAT UNIT (0x04) — used to background-format DVD+RW (profile 0x1A) and grow DVD-RW
/// Restricted Overwrite (0x13).
#[derive(Debug, Clone)]
pub struct FormatUnit {
    pub format_data: bool,
    pub parameter_list: Vec<u8>,
    pub control: Control,
}

impl WriteCommand<6> for FormatUnit {
    const OP_CODE: u8 = 0x04;

    fn as_cdb(&self) -> [u8; 6] {
        let mut bytes = [0u8; 6];

        bytes[0] = Self::OP_CODE;
        bytes[1] = u8::from(self.format_data) << 4;
        bytes[5] = self.control.into();

        bytes
    }

    fn parameter_list(&self) -> Vec<u8> {
        self.parameter_list.clone()
    }
}

/// The Write Parameters mode page (page code 0x05), sent via MODE SELECT(10) before every TAO
/// track and once up front for CD/DVD-R(W) setup.
#[derive(Debug, Clone, Copy)]
pub struct WriteParametersPage {
    pub write_type: u8,
    pub track_mode: u8,
    pub data_block_type: u8,
    pub multi_session: u8,
    pub fp: bool,
    pub copy: bool,
    pub simulate: bool,
    pub bufe: bool,
}

impl WriteParametersPage {
    pub const PAGE_CODE: u8 = 0x05;
    pub const PAGE_LENGTH: u8 = 0x32;

    /// Encodes the 8-byte mode page header + page body used by this crate (a subset of the full
    /// MMC page, covering only the write-type/track-mode fields the engine needs).
    pub fn to_bytes(self) -> [u8; 0x32 + 2] {
        let mut page = [0u8; 0x32 + 2];

        page[0] = Self::PAGE_CODE;
        page[1] = Self::PAGE_LENGTH;
        page[2] = (u8::from(self.bufe) << 6)
            | (u8::from(self.simulate) << 5)
            | (u8::from(self.copy) << 4)
            | (self.write_type & 0x0F);
        page[3] = ((self.multi_session & 0x03) << 6) | (u8::from(self.fp) << 5) | (self.track_mode & 0x0F);
        page[4] = self.data_block_type & 0x0F;

        page
    }
}

/// MODE SELECT(10) (0x55) carrying a single mode page as its parameter list.
#[derive(Debug, Clone)]
pub struct ModeSelect {
    pub page_format: bool,
    pub parameter_list: Vec<u8>,
    pub control: Control,
}

impl WriteCommand<10> for ModeSelect {
    const OP_CODE: u8 = 0x55;

    fn as_cdb(&self) -> [u8; 10] {
        let mut bytes = [0u8; 10];
        let len = self.parameter_list.len() as u16;

        bytes[0] = Self::OP_CODE;
        bytes[1] = u8::from(self.page_format) << 4;
        bytes[7..9].copy_from_slice(&len.to_be_bytes());
        bytes[9] = self.control.into();

        bytes
    }

    fn parameter_list(&self) -> Vec<u8> {
        self.parameter_list.clone()
    }
}

/// START STOP UNIT (0x1B) — used by `grab`/`release` to spin up media and lock/unlock the tray.
#[derive(Debug, Clone, Copy)]
pub struct StartStopUnit {
    pub immediate: bool,
    pub load_eject: bool,
    pub start: bool,
    pub control: Control,
}

impl WriteCommand<6> for StartStopUnit {
    const OP_CODE: u8 = 0x1B;

    fn as_cdb(&self) -> [u8; 6] {
        let mut bytes = [0u8; 6];

        bytes[0] = Self::OP_CODE;
        bytes[1] = u8::from(self.immediate);
        bytes[4] = (u8::from(self.load_eject) << 1) | u8::from(self.start);
        bytes[5] = self.control.into();

        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_cue_sheet_encodes_length() {
        let cmd = SendCueSheet {
            cue_sheet: vec![0u8; 64],
            control: Control::from(0),
        };
        let cdb = cmd.as_cdb();
        assert_eq!(cdb[0], 0x5D);
        assert_eq!(u32::from(cdb[6]) << 16 | u32::from(cdb[7]) << 8 | u32::from(cdb[8]), 64);
    }

    #[test]
    fn close_function_bits_match_mmc_table() {
        assert_eq!(CloseFunction::CloseTrack.bits(), 0b001);
        assert_eq!(CloseFunction::CloseSession.bits(), 0b010);
        assert_eq!(CloseFunction::CloseSessionAndFinalize.bits(), 0b110);
    }

    #[test]
    fn write10_encodes_lba_and_length() {
        let cmd = Write10 {
            lba: Lba::new_unchecked(150),
            transfer_length: 1,
            data: vec![0u8; 2048],
            control: Control::from(0),
        };
        let cdb = cmd.as_cdb();
        assert_eq!(cdb[0], 0x2A);
        assert_eq!(i32::from_be_bytes([cdb[2], cdb[3], cdb[4], cdb[5]]), 150);
        assert_eq!(u16::from_be_bytes([cdb[7], cdb[8]]), 1);
    }

    #[test]
    fn write12_streaming_sets_streaming_bit() {
        let cmd = Write12Streaming {
            lba: Lba::ZERO,
            transfer_length: 32,
            data: vec![0u8; 32 * 2048],
            control: Control::from(0),
        };
        let cdb = cmd.as_cdb();
        assert_eq!(cdb[0], 0xAA);
        assert_eq!(cdb[1] & 0x80, 0x80);
    }

    #[test]
    fn write_parameters_page_header() {
        let page = WriteParametersPage {
            write_type: 1,
            track_mode: 4,
            data_block_type: 8,
            multi_session: 0,
            fp: false,
            copy: false,
            simulate: false,
            bufe: false,
        }
        .to_bytes();
        assert_eq!(page[0], WriteParametersPage::PAGE_CODE);
        assert_eq!(page[1], WriteParametersPage::PAGE_LENGTH);
    }
}
