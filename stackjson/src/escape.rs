// SPDX-License-Identifier: Apache-2.0

use crate::Error;

/// Escape handling shared by the parser (decoding) and the serializer
/// (encoding).
pub(crate) struct EscapeProcessor;

impl EscapeProcessor {
    /// Map the character after a backslash to the byte it stands for.
    ///
    /// `u` is not handled here; the caller switches to collecting hex
    /// digits instead.
    pub(crate) fn process_simple_escape(escape_char: u8) -> Result<u8, Error> {
        match escape_char {
            b'n' => Ok(b'\n'),
            b't' => Ok(b'\t'),
            b'r' => Ok(b'\r'),
            b'\\' => Ok(b'\\'),
            b'"' => Ok(b'"'),
            b'/' => Ok(b'/'),
            b'b' => Ok(0x08),
            b'f' => Ok(0x0C),
            _ => Err(Error::EncodingError),
        }
    }

    /// Numeric value (0-15) of a hex digit.
    pub(crate) fn validate_hex_digit(byte: u8) -> Result<u32, Error> {
        match byte {
            b'0'..=b'9' => Ok((byte - b'0') as u32),
            b'a'..=b'f' => Ok((byte - b'a' + 10) as u32),
            b'A'..=b'F' => Ok((byte - b'A' + 10) as u32),
            _ => Err(Error::EncodingError),
        }
    }

    /// UTF-8 encoding of a `\uXXXX` code point.
    ///
    /// Surrogate halves have no encoding on their own and pairs are not
    /// combined, so any value in 0xD800..=0xDFFF is an encoding error.
    pub(crate) fn encode_codepoint(codepoint: u32, buffer: &mut [u8; 4]) -> Result<&[u8], Error> {
        let ch = char::from_u32(codepoint).ok_or(Error::EncodingError)?;
        Ok(ch.encode_utf8(buffer).as_bytes())
    }

    /// Letter for the two-byte escape of `byte`, if it has one.
    pub(crate) fn short_escape(byte: u8) -> Option<u8> {
        match byte {
            b'"' => Some(b'"'),
            b'\\' => Some(b'\\'),
            b'/' => Some(b'/'),
            0x08 => Some(b'b'),
            0x0C => Some(b'f'),
            b'\n' => Some(b'n'),
            b'\r' => Some(b'r'),
            b'\t' => Some(b't'),
            _ => None,
        }
    }

    /// True for bytes that cannot be written into a JSON string verbatim.
    pub(crate) fn needs_escape(byte: u8) -> bool {
        byte < 0x20 || matches!(byte, b'"' | b'\\' | b'/') || byte >= 0x80
    }

    /// Decode the 2- or 3-byte UTF-8 sequence at the start of `bytes`.
    ///
    /// Returns the code point and the sequence length. Four-byte sequences
    /// cannot be written as a single `\u` escape and are rejected together
    /// with malformed or truncated input.
    pub(crate) fn decode_utf8_unit(bytes: &[u8]) -> Result<(u16, usize), Error> {
        let lead = *bytes.first().ok_or(Error::EncodingError)?;
        let (len, initial) = match lead {
            0xC0..=0xDF => (2, u32::from(lead & 0x1F)),
            0xE0..=0xEF => (3, u32::from(lead & 0x0F)),
            _ => return Err(Error::EncodingError),
        };
        let tail = bytes.get(1..len).ok_or(Error::EncodingError)?;
        let mut codepoint = initial;
        for &byte in tail {
            if byte & 0xC0 != 0x80 {
                return Err(Error::EncodingError);
            }
            codepoint = (codepoint << 6) | u32::from(byte & 0x3F);
        }
        let shortest = if len == 2 { 0x80 } else { 0x800 };
        if codepoint < shortest || (0xD800..=0xDFFF).contains(&codepoint) {
            return Err(Error::EncodingError);
        }
        Ok((codepoint as u16, len))
    }

    /// `\uXXXX` with uppercase hex digits.
    pub(crate) fn unicode_escape(codepoint: u16) -> [u8; 6] {
        const HEX: &[u8; 16] = b"0123456789ABCDEF";
        let nibble = |shift: u16| HEX[usize::from((codepoint >> shift) & 0xF)];
        [b'\\', b'u', nibble(12), nibble(8), nibble(4), nibble(0)]
    }
}
