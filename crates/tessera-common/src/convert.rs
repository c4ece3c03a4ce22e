//! Stateless conversions between byte spans and primitive values.
//!
//! All multi-byte values are little-endian. Reading functions accept spans
//! longer than the target type and use the leading bytes; shorter spans fail
//! with [`Error::UnexpectedEof`].

use std::fmt::Write;

use crate::{Error, Result};

fn leading<const N: usize>(span: &[u8]) -> Result<[u8; N]> {
    span.get(..N)
        .and_then(|bytes| <[u8; N]>::try_from(bytes).ok())
        .ok_or(Error::UnexpectedEof {
            needed: N,
            available: span.len(),
        })
}

/// Read a u16 from the start of `span`.
pub fn to_u16(span: &[u8]) -> Result<u16> {
    leading::<2>(span).map(u16::from_le_bytes)
}

/// Read an i16 from the start of `span`.
pub fn to_i16(span: &[u8]) -> Result<i16> {
    leading::<2>(span).map(i16::from_le_bytes)
}

/// Read a u32 from the start of `span`.
pub fn to_u32(span: &[u8]) -> Result<u32> {
    leading::<4>(span).map(u32::from_le_bytes)
}

/// Read an i32 from the start of `span`.
pub fn to_i32(span: &[u8]) -> Result<i32> {
    leading::<4>(span).map(i32::from_le_bytes)
}

/// Read an f32 from the start of `span`.
pub fn to_f32(span: &[u8]) -> Result<f32> {
    leading::<4>(span).map(f32::from_le_bytes)
}

#[inline]
pub fn from_u16(value: u16) -> [u8; 2] {
    value.to_le_bytes()
}

#[inline]
pub fn from_i16(value: i16) -> [u8; 2] {
    value.to_le_bytes()
}

#[inline]
pub fn from_u32(value: u32) -> [u8; 4] {
    value.to_le_bytes()
}

#[inline]
pub fn from_i32(value: i32) -> [u8; 4] {
    value.to_le_bytes()
}

#[inline]
pub fn from_f32(value: f32) -> [u8; 4] {
    value.to_le_bytes()
}

/// Render bytes as uppercase hex pairs separated by spaces.
pub fn to_hex(span: &[u8]) -> String {
    let mut out = String::with_capacity(span.len() * 3);
    for (i, b) in span.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{:02X}", b);
    }
    out
}

/// Render bytes as uppercase hex with no separators.
pub fn to_hex_compact(span: &[u8]) -> String {
    let mut out = String::with_capacity(span.len() * 2);
    for b in span {
        let _ = write!(out, "{:02X}", b);
    }
    out
}

#[inline]
fn is_printable(b: u8) -> bool {
    (0x20..=0x7E).contains(&b) || matches!(b, b'\t' | b'\r' | b'\n')
}

/// Guess whether `span` holds inline text rather than a packed number.
///
/// This is a heuristic with no authoritative answer. It returns `true` when
/// the span contains at least one printable ASCII byte, every byte is
/// printable, and zeros only appear as trailing terminator padding.
///
/// Localized-string fields store either inline text or a 4-byte numeric ID
/// in the same place. A 4-byte ID whose bytes happen to be printable (for
/// example `0x00434241`, which reads as `"ABC\0"`) is indistinguishable from
/// a three-character string here, so callers should combine this guess with
/// other evidence such as whether the ID exists in a string table.
pub fn is_likely_string(span: &[u8]) -> bool {
    let text_len = span.iter().rposition(|&b| b != 0).map_or(0, |p| p + 1);
    if text_len == 0 {
        return false;
    }
    span[..text_len].iter().all(|&b| is_printable(b))
}

/// Parse an integer written in decimal, or in hex with a `0x` prefix.
///
/// A leading `-` is accepted for both forms.
pub fn parse_int(text: &str) -> Result<i64> {
    let trimmed = text.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };

    let magnitude = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => i64::from_str_radix(hex, 16),
        None => digits.parse::<i64>(),
    }
    .map_err(|_| Error::InvalidNumber(text.to_string()))?;

    Ok(if negative { -magnitude } else { magnitude })
}
