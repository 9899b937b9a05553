//! ISRC encoding/validation (§3, §4.7): `CCOOOYYSSSSS` — 2-char country, 3-char owner code (both
//! alphanumeric), 2-digit year, 5-digit serial.
//!
//! Validation follows `original_source/libburn/toc.c`'s `burn_track_set_isrc`: country and owner
//! must be alphanumeric, year and serial must be all-digit; anything else leaves the ISRC unset
//! rather than stored-but-invalid.

use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsrcError {
    #[error("country code must be 2 alphanumeric characters")]
    InvalidCountry,
    #[error("owner code must be 3 alphanumeric characters")]
    InvalidOwner,
    #[error("year must be 0..=99")]
    InvalidYear,
    #[error("serial must be 0..=99999")]
    InvalidSerial,
}

/// A validated ISRC. Construction is the only way to obtain one, so a `Track` holding `Some(Isrc)`
/// never needs a separate validity flag (spec's `isrc` + "plus validity flag" collapse into this).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Isrc {
    country: [u8; 2],
    owner: [u8; 3],
    year: u8,
    serial: u32,
}

fn is_alnum_ascii(b: u8) -> bool {
    b.is_ascii_alphanumeric()
}

impl Isrc {
    pub fn new(country: &str, owner: &str, year: u8, serial: u32) -> Result<Self, IsrcError> {
        let country_bytes = country.as_bytes();
        if country_bytes.len() != 2 || !country_bytes.iter().all(|&b| is_alnum_ascii(b)) {
            return Err(IsrcError::InvalidCountry);
        }

        let owner_bytes = owner.as_bytes();
        if owner_bytes.len() != 3 || !owner_bytes.iter().all(|&b| is_alnum_ascii(b)) {
            return Err(IsrcError::InvalidOwner);
        }

        if year > 99 {
            return Err(IsrcError::InvalidYear);
        }
        if serial > 99_999 {
            return Err(IsrcError::InvalidSerial);
        }

        let mut country_arr = [0u8; 2];
        country_arr.copy_from_slice(&country_bytes[..2].iter().map(|b| b.to_ascii_uppercase()).collect::<Vec<_>>());
        let mut owner_arr = [0u8; 3];
        owner_arr.copy_from_slice(&owner_bytes[..3].iter().map(|b| b.to_ascii_uppercase()).collect::<Vec<_>>());

        Ok(Self {
            country: country_arr,
            owner: owner_arr,
            year,
            serial,
        })
    }

    /// Parses the packed 12-character `CCOOOYYSSSSS` form used by CUE/cdtext ingestion.
    pub fn parse(s: &str) -> Result<Self, IsrcError> {
        let bytes = s.as_bytes();
        if bytes.len() != 12 {
            return Err(IsrcError::InvalidCountry);
        }
        let country = std::str::from_utf8(&bytes[0..2]).map_err(|_| IsrcError::InvalidCountry)?;
        let owner = std::str::from_utf8(&bytes[2..5]).map_err(|_| IsrcError::InvalidOwner)?;
        let year: u8 = std::str::from_utf8(&bytes[5..7])
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or(IsrcError::InvalidYear)?;
        let serial: u32 = std::str::from_utf8(&bytes[7..12])
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or(IsrcError::InvalidSerial)?;

        Self::new(country, owner, year, serial)
    }

    /// Encodes back to the packed 12-character `CCOOOYYSSSSS` string.
    pub fn encode(&self) -> String {
        format!(
            "{}{}{:02}{:05}",
            std::str::from_utf8(&self.country).unwrap(),
            std::str::from_utf8(&self.owner).unwrap(),
            self.year,
            self.serial
        )
    }

    pub fn country(&self) -> &str {
        std::str::from_utf8(&self.country).unwrap()
    }

    pub fn owner(&self) -> &str {
        std::str::from_utf8(&self.owner).unwrap()
    }

    pub fn year(&self) -> u8 {
        self.year
    }

    pub fn serial(&self) -> u32 {
        self.serial
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_encode_parse() {
        let isrc = Isrc::new("us", "abc", 99, 12345).unwrap();
        assert_eq!(isrc.encode(), "USABC9912345");
        assert_eq!(Isrc::parse(&isrc.encode()).unwrap(), isrc);
    }

    #[test]
    fn rejects_non_alphanumeric_country() {
        assert_eq!(Isrc::new("u-", "abc", 0, 0), Err(IsrcError::InvalidCountry));
    }

    #[test]
    fn rejects_out_of_range_year_and_serial() {
        assert_eq!(Isrc::new("us", "abc", 100, 0), Err(IsrcError::InvalidYear));
        assert_eq!(
            Isrc::new("us", "abc", 0, 100_000),
            Err(IsrcError::InvalidSerial)
        );
    }
}
