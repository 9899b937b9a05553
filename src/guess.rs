//! Manufacturer guessing (§4.7): CD media via ATIP Lead-in (and optional Lead-out) M:S:F looked up
//! in a static table; DVD/BD media via a manufacturer code string matched by prefix.

use crate::addressing::Msf;

/// One entry of the CD-R/RW ATIP manufacturer table. Real libburn ships a few hundred of these;
/// this crate carries a representative subset covering the best-known manufacturers, matched on
/// the Lead-in start time and, where the table distinguishes it, the Lead-out start time too.
struct AtipEntry {
    lead_in: Msf,
    lead_out: Option<Msf>,
    manufacturer: &'static str,
}

const ATIP_TABLE: &[AtipEntry] = &[
    AtipEntry {
        lead_in: Msf::new_unchecked(97, 25, 0),
        lead_out: None,
        manufacturer: "Taiyo Yuden",
    },
    AtipEntry {
        lead_in: Msf::new_unchecked(97, 26, 11),
        lead_out: None,
        manufacturer: "Mitsubishi Chemical (Verbatim)",
    },
    AtipEntry {
        lead_in: Msf::new_unchecked(97, 24, 1),
        lead_out: None,
        manufacturer: "Ritek",
    },
    AtipEntry {
        lead_in: Msf::new_unchecked(98, 0, 0),
        lead_out: None,
        manufacturer: "CMC Magnetics",
    },
];

/// Looks up the CD-R/RW manufacturer from its ATIP-reported Lead-in (and optionally Lead-out)
/// start time. Returns `None` if no table entry matches.
pub fn guess_cd_manufacturer(lead_in: Msf, lead_out: Option<Msf>) -> Option<&'static str> {
    ATIP_TABLE.iter().find_map(|entry| {
        let lead_in_matches = entry.lead_in == lead_in;
        let lead_out_matches = match (entry.lead_out, lead_out) {
            (Some(expected), Some(actual)) => expected == actual,
            (None, _) => true,
            (Some(_), None) => false,
        };
        (lead_in_matches && lead_out_matches).then_some(entry.manufacturer)
    })
}

/// One entry of the DVD/BD manufacturer-code table, matched by prefix against the media's
/// reported manufacturer code string (as read from the Book Type / Disc Manufacturer Information
/// structure).
const DVD_BD_TABLE: &[(&str, &str)] = &[
    ("MCC", "Mitsubishi Chemical (Verbatim)"),
    ("RITEK", "Ritek"),
    ("CMC MAG", "CMC Magnetics"),
    ("TYG", "Taiyo Yuden"),
    ("PRODISC", "Prodisc"),
    ("INFOME", "Infomedia"),
];

/// Looks up the DVD/BD manufacturer from its reported code string, matched by prefix
/// (case-insensitive).
pub fn guess_dvd_bd_manufacturer(code: &str) -> Option<&'static str> {
    let upper = code.to_ascii_uppercase();
    DVD_BD_TABLE
        .iter()
        .find(|(prefix, _)| upper.starts_with(prefix))
        .map(|(_, name)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cd_lookup_matches_known_entry() {
        let m = Msf::new(97, 25, 0).unwrap();
        assert_eq!(guess_cd_manufacturer(m, None), Some("Taiyo Yuden"));
    }

    #[test]
    fn cd_lookup_returns_none_for_unknown_time() {
        let m = Msf::new(10, 10, 10).unwrap();
        assert_eq!(guess_cd_manufacturer(m, None), None);
    }

    #[test]
    fn dvd_lookup_matches_by_prefix() {
        assert_eq!(
            guess_dvd_bd_manufacturer("MCC 03RG20"),
            Some("Mitsubishi Chemical (Verbatim)")
        );
        assert_eq!(guess_dvd_bd_manufacturer("ritek r03"), Some("Ritek"));
    }

    #[test]
    fn dvd_lookup_returns_none_for_unknown_code() {
        assert_eq!(guess_dvd_bd_manufacturer("ZZZ"), None);
    }
}
