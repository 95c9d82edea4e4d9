//! Hex address input
//!
//! Validation for address fields typed by the user (goto address, base
//! address and the like). A field holds at most 16 hex digits.

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// Longest accepted address, in hex digits
pub const MAX_HEX_DIGITS: usize = 16;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Address is empty")]
    Empty,
    #[error("Not a hexadecimal address: {0}")]
    Malformed(String),
    #[error("Address has {0} digits, at most 16 are allowed")]
    TooLong(usize),
}

fn hex_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:0[xX])?(?P<digits>[0-9A-Fa-f]+)$").expect("hex address pattern is valid")
    })
}

/// Parse a user supplied hex address such as `401000` or `0x7ffe_0000`.
///
/// Surrounding whitespace and `_` digit separators are ignored.
pub fn parse_hex_address(text: &str) -> Result<u64, AddressError> {
    let cleaned: String = text.trim().chars().filter(|c| *c != '_').collect();
    if cleaned.is_empty() {
        return Err(AddressError::Empty);
    }

    let captures = hex_pattern()
        .captures(&cleaned)
        .ok_or_else(|| AddressError::Malformed(text.trim().to_string()))?;
    let digits = &captures["digits"];

    if digits.len() > MAX_HEX_DIGITS {
        return Err(AddressError::TooLong(digits.len()));
    }

    u64::from_str_radix(digits, 16).map_err(|_| AddressError::Malformed(text.trim().to_string()))
}

/// True when `text` would parse, used to enable or disable confirm buttons
pub fn is_valid_hex_address(text: &str) -> bool {
    parse_hex_address(text).is_ok()
}

/// Zero padded rendering used by listing columns
pub fn format_address(address: u64, digits: usize) -> String {
    format!("{:0width$X}", address, width = digits.min(MAX_HEX_DIGITS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_and_prefixed() {
        assert_eq!(parse_hex_address("401000"), Ok(0x401000));
        assert_eq!(parse_hex_address("  0x7FFE_0000 "), Ok(0x7ffe_0000));
        assert_eq!(parse_hex_address("ffffffffffffffff"), Ok(u64::MAX));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert_eq!(parse_hex_address("   "), Err(AddressError::Empty));
        assert!(matches!(parse_hex_address("0x"), Err(AddressError::Malformed(_))));
        assert!(matches!(parse_hex_address("40g000"), Err(AddressError::Malformed(_))));
        assert_eq!(parse_hex_address("1ffffffffffffffff"), Err(AddressError::TooLong(17)));
        assert!(!is_valid_hex_address("main"));
    }

    #[test]
    fn test_format_address_pads() {
        assert_eq!(format_address(0x401000, 8), "00401000");
        assert_eq!(format_address(0xdead, 2), "DEAD");
    }
}
