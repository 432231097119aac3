//! Masking of national identity numbers before they reach logs or API payloads.
//!
//! - Aadhaar / UAN (12 digits) -> `XXXX-XXXX-1234`
//! - PAN (`ABCDE1234F`) -> `XXXXX1234X`

use std::sync::LazyLock;

use regex::Regex;

/// Twelve consecutive digits on word boundaries (Aadhaar and UAN share this shape).
static TWELVE_DIGITS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{12}\b").expect("valid regex"));

/// A PAN: five letters, four digits, one letter.
static PAN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z]{5}\d{4}[A-Z]\b").expect("valid regex"));

/// Mask a single 12-digit identifier, keeping the last four digits.
///
/// Input that is not exactly twelve digits (after stripping spaces and
/// dashes) is fully masked.
pub fn mask_twelve_digit(id: &str) -> String {
    let digits: String = id.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() != 12 {
        return "XXXX-XXXX-XXXX".to_string();
    }
    format!("XXXX-XXXX-{}", &digits[8..])
}

/// Mask a single PAN, keeping the four digits in the middle.
pub fn mask_pan(pan: &str) -> String {
    let upper = pan.trim().to_ascii_uppercase();
    if PAN_RE.is_match(&upper) && upper.len() == 10 {
        format!("XXXXX{}X", &upper[5..9])
    } else {
        "XXXXXXXXXX".to_string()
    }
}

/// Mask every Aadhaar/UAN/PAN-shaped substring in free text.
pub fn mask_sensitive(text: &str) -> String {
    let pass = TWELVE_DIGITS_RE.replace_all(text, |caps: &regex::Captures<'_>| {
        let m = &caps[0];
        format!("XXXX-XXXX-{}", &m[8..])
    });
    PAN_RE
        .replace_all(&pass, |caps: &regex::Captures<'_>| {
            let m = &caps[0];
            format!("XXXXX{}X", &m[5..9])
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_aadhaar_keeping_last_four() {
        assert_eq!(mask_twelve_digit("234567891234"), "XXXX-XXXX-1234");
        assert_eq!(mask_twelve_digit("2345 6789 1234"), "XXXX-XXXX-1234");
    }

    #[test]
    fn malformed_twelve_digit_is_fully_masked() {
        assert_eq!(mask_twelve_digit("1234"), "XXXX-XXXX-XXXX");
    }

    #[test]
    fn masks_pan() {
        assert_eq!(mask_pan("ABCDE1234F"), "XXXXX1234X");
        assert_eq!(mask_pan("abcde1234f"), "XXXXX1234X");
        assert_eq!(mask_pan("nope"), "XXXXXXXXXX");
    }

    #[test]
    fn masks_free_text() {
        let text = "aadhaar 234567891234 pan ABCDE1234F ok";
        assert_eq!(
            mask_sensitive(text),
            "aadhaar XXXX-XXXX-1234 pan XXXXX1234X ok"
        );
    }

    #[test]
    fn leaves_other_numbers_alone() {
        assert_eq!(mask_sensitive("phone 9876543210"), "phone 9876543210");
    }
}
