// SPDX-License-Identifier: Apache-2.0

use crate::Error;

/// Numeric payload of a number value.
///
/// The three encodings never overlap: the parser picks one while scanning and
/// every consumer matches on all three.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Unsigned(u64),
    Signed(i64),
    Double(f64),
}

impl Default for Number {
    fn default() -> Self {
        Number::Unsigned(0)
    }
}

impl Number {
    /// Cast to `u64` with `as` semantics; no range check.
    pub fn as_u64(self) -> u64 {
        match self {
            Number::Unsigned(v) => v,
            Number::Signed(v) => v as u64,
            Number::Double(v) => v as u64,
        }
    }

    /// Cast to `i64` with `as` semantics; no range check.
    pub fn as_i64(self) -> i64 {
        match self {
            Number::Unsigned(v) => v as i64,
            Number::Signed(v) => v,
            Number::Double(v) => v as i64,
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Number::Unsigned(v) => v as f64,
            Number::Signed(v) => v as f64,
            Number::Double(v) => v,
        }
    }

    pub fn is_double(self) -> bool {
        matches!(self, Number::Double(_))
    }
}

impl From<u64> for Number {
    fn from(v: u64) -> Self {
        Number::Unsigned(v)
    }
}

impl From<i64> for Number {
    fn from(v: i64) -> Self {
        Number::Signed(v)
    }
}

impl From<f64> for Number {
    fn from(v: f64) -> Self {
        Number::Double(v)
    }
}

/// Longest text `format` can produce: ryu tops out at 24 bytes, i64 at 20.
const NUMBER_TEXT_CAPACITY: usize = 32;

/// Formatted JSON text of a number, held inline so a suspended serializer
/// can resume writing it without reformatting.
#[derive(Debug, Clone, Copy)]
pub(crate) struct NumberText {
    bytes: [u8; NUMBER_TEXT_CAPACITY],
    len: usize,
}

impl NumberText {
    /// Doubles always keep a `.` or an exponent so they read back as doubles.
    /// NaN and the infinities have no JSON spelling.
    pub(crate) fn format(number: Number) -> Result<Self, Error> {
        let mut text = NumberText {
            bytes: [0; NUMBER_TEXT_CAPACITY],
            len: 0,
        };
        match number {
            Number::Unsigned(v) => text.fill(itoa::Buffer::new().format(v).as_bytes()),
            Number::Signed(v) => text.fill(itoa::Buffer::new().format(v).as_bytes()),
            Number::Double(v) => {
                if !v.is_finite() {
                    return Err(Error::EncodingError);
                }
                text.fill(ryu::Buffer::new().format_finite(v).as_bytes())
            }
        }
        Ok(text)
    }

    fn fill(&mut self, src: &[u8]) {
        let len = src.len().min(NUMBER_TEXT_CAPACITY);
        self.bytes[..len].copy_from_slice(&src[..len]);
        self.len = len;
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_casts_are_unchecked() {
        assert_eq!(Number::Signed(-1).as_u64(), u64::MAX);
        assert_eq!(Number::Unsigned(u64::MAX).as_i64(), -1);
        assert_eq!(Number::Double(3.9).as_i64(), 3);
        assert_eq!(Number::Double(-3.9).as_u64(), 0);
        assert_eq!(Number::Unsigned(7).as_f64(), 7.0);
    }

    #[test]
    fn test_default_is_unsigned_zero() {
        assert_eq!(Number::default(), Number::Unsigned(0));
    }

    #[test]
    fn test_format_integers() {
        let text = NumberText::format(Number::Unsigned(u64::MAX)).unwrap();
        assert_eq!(text.as_bytes(), b"18446744073709551615");
        let text = NumberText::format(Number::Signed(i64::MIN)).unwrap();
        assert_eq!(text.as_bytes(), b"-9223372036854775808");
    }

    #[test]
    fn test_format_doubles_stay_doubles() {
        let text = NumberText::format(Number::Double(100000.0)).unwrap();
        assert_eq!(text.as_bytes(), b"100000.0");
        let text = NumberText::format(Number::Double(123.5)).unwrap();
        assert_eq!(text.as_bytes(), b"123.5");
        let text = NumberText::format(Number::Double(-0.25)).unwrap();
        assert_eq!(text.as_bytes(), b"-0.25");
    }

    #[test]
    fn test_format_rejects_non_finite() {
        assert_eq!(
            NumberText::format(Number::Double(f64::NAN)).unwrap_err(),
            Error::EncodingError
        );
        assert_eq!(
            NumberText::format(Number::Double(f64::NEG_INFINITY)).unwrap_err(),
            Error::EncodingError
        );
    }
}
