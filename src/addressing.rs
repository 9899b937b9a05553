//! Logical Block Address and Minute:Second:Frame conversions.
//!
//! `Lba` follows the convention used throughout the specification this crate
//! implements: `LBA = (M*60+S)*75 + F - 150`, i.e. LBA 0 is the first playable
//! frame of a CD-DA program (MSF 00:02:00) and the 150 frames of lead-in
//! pregap occupy LBA -150..0.

use std::fmt;

use derive_more::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};
use thiserror::Error;

use crate::constants::{FRAMES_PER_MINUTE, FRAMES_PER_SECOND, PREGAP_OFFSET};

#[derive(Error, Debug)]
pub enum BlockAddressError {
    #[error("block address out of range")]
    OutOfRange,
    #[error("frame field out of range 0..75: {0}")]
    InvalidFrame(u8),
    #[error("second field out of range 0..60: {0}")]
    InvalidSecond(u8),
}

/// Newtype representing a Logical Block Address.
///
/// Negative values address the lead-in pregap (down to -150 at MSF 00:00:00).
#[repr(transparent)]
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Add,
    AddAssign,
    Sub,
    SubAssign,
    Mul,
    MulAssign,
    Div,
    DivAssign,
    Neg,
)]
pub struct Lba(i32);

impl Lba {
    /// Largest LBA this crate will reason about (100 minutes of program area).
    pub const MAX: Lba = Lba(100 * 60 * FRAMES_PER_SECOND as i32);

    /// Start of the lead-in pregap at MSF 00:00:00.
    pub const MIN: Lba = Lba(-(PREGAP_OFFSET as i32));

    /// First playable frame of a CD-DA program, MSF 00:02:00.
    pub const ZERO: Lba = Lba(0);

    pub const fn new_unchecked(raw: i32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> i32 {
        self.0
    }
}

impl From<Lba> for i32 {
    fn from(value: Lba) -> Self {
        value.0
    }
}

impl TryFrom<i32> for Lba {
    type Error = BlockAddressError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        let lba = Self(value);

        if !(Self::MIN..=Self::MAX).contains(&lba) {
            return Err(BlockAddressError::OutOfRange);
        }

        Ok(lba)
    }
}

impl TryFrom<Msf> for Lba {
    type Error = BlockAddressError;

    fn try_from(value: Msf) -> Result<Self, Self::Error> {
        let Msf(m, s, f) = value;

        if s >= 60 {
            return Err(BlockAddressError::InvalidSecond(s));
        }
        if f >= FRAMES_PER_SECOND {
            return Err(BlockAddressError::InvalidFrame(f));
        }

        let m = i32::from(m) * i32::from(FRAMES_PER_MINUTE);
        let s = i32::from(s) * i32::from(FRAMES_PER_SECOND);
        let f = i32::from(f);

        Self::try_from(m + s + f - i32::from(PREGAP_OFFSET))
    }
}

/// Minute, Second, Frame format: on-medium time addressing at 75 frames/sec.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Msf(pub u8, pub u8, pub u8);

impl Msf {
    /// Builds an MSF without validating field ranges; used for sentinel/debug display only.
    pub const fn new_unchecked(m: u8, s: u8, f: u8) -> Self {
        Self(m, s, f)
    }

    pub fn new(m: u8, s: u8, f: u8) -> Result<Self, BlockAddressError> {
        if s >= 60 {
            return Err(BlockAddressError::InvalidSecond(s));
        }
        if f >= FRAMES_PER_SECOND {
            return Err(BlockAddressError::InvalidFrame(f));
        }
        Ok(Self(m, s, f))
    }
}

/// Marker for address formats a MMC READ TOC response can carry (LBA or MSF).
pub trait Address: Copy + std::fmt::Debug {}

impl Address for Lba {}
impl Address for Msf {}

impl fmt::Display for Msf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.0, self.1, self.2)
    }
}

impl From<Lba> for Msf {
    fn from(value: Lba) -> Self {
        let mut frames = value.raw() + i32::from(PREGAP_OFFSET);

        let m = frames / i32::from(FRAMES_PER_MINUTE);
        frames -= m * i32::from(FRAMES_PER_MINUTE);
        let s = frames / i32::from(FRAMES_PER_SECOND);
        frames -= s * i32::from(FRAMES_PER_SECOND);
        let f = frames;

        Msf(m as u8, s as u8, f as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_lba_is_msf_00_02_00() {
        assert_eq!(Msf::from(Lba::ZERO).to_string(), "00:02:00");
    }

    #[test]
    fn pregap_start_is_msf_zero() {
        assert_eq!(Msf::from(Lba::MIN).to_string(), "00:00:00");
    }

    #[test]
    fn msf_to_lba_round_trips() {
        for raw in [-150, -1, 0, 1, 149, 150, 4499, 333_000] {
            let lba = Lba::try_from(raw).unwrap();
            let msf = Msf::from(lba);
            assert_eq!(Lba::try_from(msf).unwrap(), lba, "raw={raw} msf={msf}");
        }
    }

    #[test]
    fn out_of_range_rejected() {
        assert!(Lba::try_from(Lba::MIN.raw() - 1).is_err());
        assert!(Lba::try_from(Lba::MAX.raw() + 1).is_err());
    }

    #[test]
    fn invalid_msf_fields_rejected() {
        assert!(Lba::try_from(Msf(0, 60, 0)).is_err());
        assert!(Lba::try_from(Msf(0, 0, 75)).is_err());
    }
}
