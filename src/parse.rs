//! Textual address formats: hex byte strings, offset lists, symbolic names

use crate::error::{BurrowError, Result};

/// parse a space-separated hex byte string, e.g. "A1 C3 08"
///
/// each token is one unsigned byte in base 16; a malformed token fails
/// the whole parse.
pub fn parse_hex_bytes(text: &str) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    for token in text.split(' ').filter(|t| !t.is_empty()) {
        let byte = u8::from_str_radix(token, 16).map_err(|_| BurrowError::ParseFailed {
            token: token.to_string(),
        })?;
        bytes.push(byte);
    }
    Ok(bytes)
}

/// parse a space-separated offset string, e.g. "4 C3D 1F"
///
/// each token is a signed 64-bit integer in base 16; a leading `-`
/// negates the token.
pub fn parse_offsets(text: &str) -> Result<Vec<i64>> {
    let mut offsets = Vec::new();
    for token in text.split(' ').filter(|t| !t.is_empty()) {
        let offset = i64::from_str_radix(token, 16).map_err(|_| BurrowError::ParseFailed {
            token: token.to_string(),
        })?;
        offsets.push(offset);
    }
    Ok(offsets)
}

/// split a symbolic address into module name and hex offset
///
/// accepts `"<module>"` or `"<module>+<hex>"`; ASCII spaces are
/// stripped before the split. returns `None` for empty input or a
/// malformed offset.
pub fn split_symbolic(text: &str) -> Option<(String, u64)> {
    let stripped: String = text.chars().filter(|c| *c != ' ').collect();
    if stripped.is_empty() {
        return None;
    }

    match stripped.split_once('+') {
        Some((module, offset)) => {
            if module.is_empty() {
                return None;
            }
            let offset = u64::from_str_radix(offset, 16).ok()?;
            Some((module.to_string(), offset))
        }
        None => Some((stripped, 0)),
    }
}
