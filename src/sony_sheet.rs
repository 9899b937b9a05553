//! Sony "v07t" input sheet ingestion (§6): a `key = value` text format used by some premastering
//! tool chains as an alternative to CDRWIN `.cue` files.
//!
//! Grounded on `cue_file.rs`'s line-oriented parsing style; this format carries far less
//! structure (no indices, no FILE/TRACK nesting) so the grammar is a flat key/value scan rather
//! than a stateful grammar.

use std::collections::HashMap;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SonySheetError {
    #[error("line {0}: expected \"key = value\"")]
    MalformedLine(usize),
    #[error("Input Sheet Version must be \"0.7T\", found {0:?}")]
    UnsupportedVersion(String),
    #[error("missing required key {0:?}")]
    MissingKey(&'static str),
    #[error("value for {key:?} is not a valid hex code: {value:?}")]
    BadHexCode { key: String, value: String },
}

/// One or two hex bytes, as the v07t format allows either `0xNN`, `0xNNNN`, or `0xNN 0xNN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HexCode(pub u8, pub Option<u8>);

fn parse_hex_byte(tok: &str) -> Option<u8> {
    let tok = tok.strip_prefix("0x").or_else(|| tok.strip_prefix("0X"))?;
    u8::from_str_radix(tok, 16).ok()
}

/// Parses a value field that is one `0xNNNN` (taken as two bytes, big-endian), one `0xNN` (a
/// single byte), or two space-separated `0xNN` tokens.
pub fn parse_hex_code(value: &str) -> Option<HexCode> {
    let tokens: Vec<&str> = value.split_whitespace().collect();
    match tokens.as_slice() {
        [one] if one.len() == 6 => {
            // 0xNNNN: four hex digits, split into hi/lo bytes.
            let digits = one.strip_prefix("0x").or_else(|| one.strip_prefix("0X"))?;
            if digits.len() != 4 {
                return None;
            }
            let hi = u8::from_str_radix(&digits[0..2], 16).ok()?;
            let lo = u8::from_str_radix(&digits[2..4], 16).ok()?;
            Some(HexCode(hi, Some(lo)))
        }
        [one] => parse_hex_byte(one).map(|b| HexCode(b, None)),
        [a, b] => {
            let a = parse_hex_byte(a)?;
            let b = parse_hex_byte(b)?;
            Some(HexCode(a, Some(b)))
        }
        _ => None,
    }
}

/// A parsed v07t sheet: the raw key/value map, for the caller to project into whatever
/// session/track structure the surrounding entries describe (the format has no native notion of
/// "one sheet, many tracks" the way a `.cue` file does; track-scoped keys carry a numeric suffix,
/// e.g. `Track1 Performer`).
pub struct SonySheet {
    pub fields: HashMap<String, String>,
}

const VERSION_KEY: &str = "Input Sheet Version";
const REQUIRED_VERSION: &str = "0.7T";

impl SonySheet {
    pub fn parse(text: &str) -> Result<Self, SonySheetError> {
        let mut fields = HashMap::new();

        for (idx, raw_line) in text.lines().enumerate() {
            let line = idx + 1;
            let trimmed = raw_line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }

            let (key, value) = trimmed
                .split_once('=')
                .ok_or(SonySheetError::MalformedLine(line))?;
            fields.insert(key.trim().to_string(), value.trim().to_string());
        }

        let version = fields
            .get(VERSION_KEY)
            .ok_or(SonySheetError::MissingKey("Input Sheet Version"))?;
        if version != REQUIRED_VERSION {
            return Err(SonySheetError::UnsupportedVersion(version.clone()));
        }

        Ok(Self { fields })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Parses a field as a hex code, per the format's `0xNN`/`0xNNNN`/`0xNN 0xNN` convention.
    pub fn get_hex(&self, key: &str) -> Result<Option<HexCode>, SonySheetError> {
        match self.fields.get(key) {
            None => Ok(None),
            Some(v) => parse_hex_code(v).map(Some).ok_or_else(|| SonySheetError::BadHexCode {
                key: key.to_string(),
                value: v.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_version() {
        let text = "Input Sheet Version = 0.6T\n";
        assert!(matches!(
            SonySheet::parse(text),
            Err(SonySheetError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn rejects_missing_version() {
        let text = "Disc Catalog Number = 1234567890123\n";
        assert!(matches!(SonySheet::parse(text), Err(SonySheetError::MissingKey(_))));
    }

    #[test]
    fn accepts_valid_sheet_and_reads_fields() {
        let text = r#"
Input Sheet Version = 0.7T
Disc Catalog Number = 1234567890123
Track1 Performer = Someone
"#;
        let sheet = SonySheet::parse(text).unwrap();
        assert_eq!(sheet.get("Disc Catalog Number"), Some("1234567890123"));
        assert_eq!(sheet.get("Track1 Performer"), Some("Someone"));
    }

    #[test]
    fn hex_code_forms_all_parse() {
        assert_eq!(parse_hex_code("0xAB"), Some(HexCode(0xAB, None)));
        assert_eq!(parse_hex_code("0xABCD"), Some(HexCode(0xAB, Some(0xCD))));
        assert_eq!(parse_hex_code("0xAB 0xCD"), Some(HexCode(0xAB, Some(0xCD))));
        assert_eq!(parse_hex_code("garbage"), None);
    }

    #[test]
    fn malformed_line_is_rejected() {
        let text = "Input Sheet Version = 0.7T\nnot a kv line\n";
        assert!(matches!(SonySheet::parse(text), Err(SonySheetError::MalformedLine(2))));
    }
}
