//! Plate normalization and shape validation. Pure functions, no I/O; they run
//! before any registry lookup so malformed input never costs a round trip.

use crate::domain::model::{Plate, PlateFormat};
use crate::utils::error::{AssignError, Result};
use regex::Regex;
use std::sync::LazyLock;

pub const PLATE_LEN: usize = 7;

static LEGACY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{3}[0-9]{4}$").expect("legacy plate pattern"));

static MERCOSUL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{3}[0-9][A-Z][0-9]{2}$").expect("mercosul plate pattern"));

/// Uppercases, drops everything but ASCII letters and digits, and keeps at
/// most the first seven characters.
pub fn normalize(raw: &str) -> String {
    raw.to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(PLATE_LEN)
        .collect()
}

/// Checks an already-normalized string against the two plate shapes.
pub fn validate(normalized: &str) -> Result<Plate> {
    if normalized.is_empty() {
        return Err(invalid(normalized, "plate is empty"));
    }

    if normalized.len() != PLATE_LEN {
        return Err(invalid(
            normalized,
            &format!("plate must have {} characters", PLATE_LEN),
        ));
    }

    let format = if LEGACY_RE.is_match(normalized) {
        PlateFormat::Legacy
    } else if MERCOSUL_RE.is_match(normalized) {
        PlateFormat::Mercosul
    } else {
        return Err(invalid(
            normalized,
            "expected legacy (ABC1234) or Mercosul (ABC1D23) format",
        ));
    };

    Ok(Plate::new_unchecked(normalized.to_string(), format))
}

impl Plate {
    /// Normalizes raw scanner or keyboard input and validates the result.
    pub fn parse(raw: &str) -> Result<Plate> {
        validate(&normalize(raw))
    }
}

fn invalid(input: &str, reason: &str) -> AssignError {
    AssignError::InvalidFormat {
        input: input.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_and_uppercases() {
        assert_eq!(normalize("abc-1234"), "ABC1234");
        assert_eq!(normalize("  abc 1d23 "), "ABC1D23");
        assert_eq!(normalize("AB123456"), "AB12345");
        assert_eq!(normalize("çabc1234"), "ABC1234");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let inputs = [
            "abc-1234",
            "xyz9w88",
            "AB123456",
            "  ..  ",
            "ßabc123",
            "ABC1D23XYZ",
            "a-b-c-1-d-2-3",
            "Ωmega42",
        ];
        for input in inputs {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "input {:?}", input);
        }
    }

    #[test]
    fn test_validate_accepts_both_shapes() {
        assert_eq!(validate("ABC1234").unwrap().format(), PlateFormat::Legacy);
        assert_eq!(validate("ABC1D23").unwrap().format(), PlateFormat::Mercosul);
    }

    #[test]
    fn test_validate_rejects_bad_shapes() {
        assert!(validate(&normalize("AB123456")).is_err());
        assert!(validate("123ABCD").is_err());
        assert!(validate("ABC123").is_err());
        assert!(validate("").is_err());
        assert!(validate("XYZ98W8").is_err());
    }

    #[test]
    fn test_short_plate_reason() {
        match validate("ABC12") {
            Err(AssignError::InvalidFormat { reason, .. }) => {
                assert!(reason.contains("7 characters"))
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_parse_normalizes_first() {
        let plate = Plate::parse("abc-1d23").unwrap();
        assert_eq!(plate.as_str(), "ABC1D23");
        assert_eq!(plate.to_string(), "ABC1D23");
    }

    #[test]
    fn test_plates_dedupe_as_set_keys() {
        let plates: std::collections::HashSet<Plate> = ["abc-1234", "ABC 1234", "abc1d23"]
            .into_iter()
            .map(|raw| Plate::parse(raw).unwrap())
            .collect();

        assert_eq!(plates.len(), 2);
        assert!(plates.contains(&Plate::parse("ABC1234").unwrap()));
    }
}
