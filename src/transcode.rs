//! Conversions between the textual payload forms an operator copies around.
//!
//! * Hex is accepted in any case and with any whitespace, and printed as uppercase pairs
//!   separated by single spaces. E.g. `"010600860640"` => `"01 06 00 86 06 40"`.
//! * Base64 uses the standard RFC 4648 alphabet with padding, over the raw bytes.

use base64::{Engine as _, engine::general_purpose};

use crate::error::Result;

/// Parse a hex string, ignoring all whitespace.
pub fn parse_hex(input: &str) -> Result<Vec<u8>> {
    let cleaned: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(hex::decode(cleaned)?)
}

/// Print bytes as uppercase hex pairs separated by single spaces.
pub fn format_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|byte| format!("{byte:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Bring hex input to its canonical form.
pub fn normalize_hex(input: &str) -> Result<String> {
    Ok(format_hex(&parse_hex(input)?))
}

pub fn to_base64(bytes: &[u8]) -> String {
    general_purpose::STANDARD.encode(bytes)
}

pub fn from_base64(input: &str) -> Result<Vec<u8>> {
    Ok(general_purpose::STANDARD.decode(input.trim())?)
}

/// Convert a hex payload straight into the base64 form sent to the meter.
pub fn hex_to_base64(input: &str) -> Result<String> {
    Ok(to_base64(&parse_hex(input)?))
}

/// Convert a base64 payload received from the meter into canonical hex.
pub fn base64_to_hex(input: &str) -> Result<String> {
    Ok(format_hex(&from_base64(input)?))
}

/// Encode a registry key as an identifier that is safe to embed in a URL.
pub fn encode_external_id(key: &str) -> String {
    general_purpose::URL_SAFE_NO_PAD.encode(key.as_bytes())
}

/// Reverse [`encode_external_id`], returning the canonical key.
pub fn decode_external_id(id: &str) -> Result<String> {
    let raw = general_purpose::URL_SAFE_NO_PAD.decode(id.trim())?;
    normalize_hex(&String::from_utf8_lossy(&raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_parse_ignores_case_and_whitespace() {
        let bytes = parse_hex(" 01 06\t00 86\n06 4a ").unwrap();
        assert_eq!(bytes, [0x01, 0x06, 0x00, 0x86, 0x06, 0x4A]);
        assert_eq!(parse_hex("").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(matches!(parse_hex("01 0"), Err(Error::InvalidHex(_))));
        assert!(matches!(parse_hex("01 GG"), Err(Error::InvalidHex(_))));
        assert!(matches!(parse_hex("0x01"), Err(Error::InvalidHex(_))));
    }

    #[test]
    fn test_format_is_canonical() {
        assert_eq!(format_hex(&[0x01, 0x06, 0x00, 0xab]), "01 06 00 AB");
        assert_eq!(format_hex(&[]), "");
        assert_eq!(normalize_hex("010600860640").unwrap(), "01 06 00 86 06 40");
    }

    #[test]
    fn test_hex_survives_format_then_parse() {
        let bytes: Vec<u8> = (0..=255).collect();
        assert_eq!(parse_hex(&format_hex(&bytes)).unwrap(), bytes);
    }

    #[test]
    fn test_base64_conversions() {
        assert_eq!(hex_to_base64("01 06 00 86 06 40 6A 73").unwrap(), "AQYAhgZAanM=");
        assert_eq!(base64_to_hex(" AQYAhgZAanM= ").unwrap(), "01 06 00 86 06 40 6A 73");

        let bytes: Vec<u8> = (0..=255).rev().collect();
        assert_eq!(from_base64(&to_base64(&bytes)).unwrap(), bytes);
    }

    #[test]
    fn test_base64_rejects_bad_input() {
        assert!(matches!(from_base64("AQY*"), Err(Error::InvalidBase64(_))));
        assert!(matches!(from_base64("AQYAh"), Err(Error::InvalidBase64(_))));
    }

    #[test]
    fn test_external_id_round_trip() {
        let id = encode_external_id("01 06 00 86");
        assert_eq!(id, "MDEgMDYgMDAgODY");
        assert!(!id.contains(['+', '/', '=', ' ']));
        assert_eq!(decode_external_id(&id).unwrap(), "01 06 00 86");
    }

    #[test]
    fn test_external_id_rejects_garbage() {
        assert!(matches!(decode_external_id("***"), Err(Error::InvalidBase64(_))));
        let not_hex = encode_external_id("hello");
        assert!(matches!(decode_external_id(&not_hex), Err(Error::InvalidHex(_))));
    }
}
