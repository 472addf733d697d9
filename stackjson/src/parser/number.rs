// SPDX-License-Identifier: Apache-2.0

use super::frame::Step;
use crate::{Error, Number};

/// Scaling by powers of ten stops here; past this every finite mantissa has
/// already reached zero or infinity.
const MAX_SCALE_STEPS: u64 = 400;

#[derive(Debug, Clone, Copy, PartialEq)]
enum NumberState {
    FirstSymbol,
    IntegerDigits,
    FractionalDigitsFirst,
    FractionalDigits,
    ExponentFirst,
    ExponentFirstAfterSign,
    Exponent,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Accumulator {
    Integer(u64),
    Double(f64),
}

/// Number being scanned.
///
/// The frame never consumes the byte that ends the number: it pops and the
/// byte is replayed against whatever frame is underneath.
#[derive(Debug)]
pub(super) struct NumberFrame {
    state: NumberState,
    negative: bool,
    mantissa: Accumulator,
    integer_digits: usize,
    fraction_digits: u64,
    exponent: u64,
    exponent_negative: bool,
}

fn digit(byte: u8) -> Option<u8> {
    byte.is_ascii_digit().then(|| byte - b'0')
}

impl NumberFrame {
    pub(super) fn new() -> Self {
        Self {
            state: NumberState::FirstSymbol,
            negative: false,
            mantissa: Accumulator::Integer(0),
            integer_digits: 0,
            fraction_digits: 0,
            exponent: 0,
            exponent_negative: false,
        }
    }

    fn push_mantissa_digit(&mut self, d: u8) {
        self.mantissa = match self.mantissa {
            Accumulator::Integer(v) => match v.checked_mul(10).and_then(|v| v.checked_add(u64::from(d))) {
                Some(next) => Accumulator::Integer(next),
                None => Accumulator::Double(v as f64 * 10.0 + f64::from(d)),
            },
            Accumulator::Double(v) => Accumulator::Double(v * 10.0 + f64::from(d)),
        };
    }

    fn switch_to_double(&mut self) {
        if let Accumulator::Integer(v) = self.mantissa {
            self.mantissa = Accumulator::Double(v as f64);
        }
    }

    fn push_exponent_digit(&mut self, d: u8) {
        self.exponent = self
            .exponent
            .saturating_mul(10)
            .saturating_add(u64::from(d))
            .min(MAX_SCALE_STEPS * 2);
    }

    pub(super) fn process(&mut self, byte: u8) -> Result<Step, Error> {
        use NumberState::*;
        let next = match (self.state, byte) {
            (FirstSymbol, b'-') => {
                self.negative = true;
                IntegerDigits
            }
            (FirstSymbol, _) => {
                let d = digit(byte).ok_or(Error::EncodingError)?;
                self.push_mantissa_digit(d);
                self.integer_digits = 1;
                IntegerDigits
            }
            (IntegerDigits, b'0'..=b'9') => {
                // No digit may follow a leading zero
                if self.integer_digits == 1 && self.mantissa == Accumulator::Integer(0) {
                    return Err(Error::EncodingError);
                }
                self.push_mantissa_digit(byte - b'0');
                self.integer_digits += 1;
                IntegerDigits
            }
            (IntegerDigits, b'.') if self.integer_digits > 0 => {
                self.switch_to_double();
                FractionalDigitsFirst
            }
            (IntegerDigits, b'e' | b'E') if self.integer_digits > 0 => {
                self.switch_to_double();
                ExponentFirst
            }
            (IntegerDigits, _) if self.integer_digits > 0 => return Ok(Step::Pop { redeliver: true }),
            (IntegerDigits, _) => return Err(Error::EncodingError),
            (FractionalDigitsFirst | FractionalDigits, b'0'..=b'9') => {
                self.push_mantissa_digit(byte - b'0');
                self.fraction_digits += 1;
                FractionalDigits
            }
            (FractionalDigits, b'e' | b'E') => ExponentFirst,
            (FractionalDigits, _) => return Ok(Step::Pop { redeliver: true }),
            (ExponentFirst, b'+') => ExponentFirstAfterSign,
            (ExponentFirst, b'-') => {
                self.exponent_negative = true;
                ExponentFirstAfterSign
            }
            (ExponentFirst | ExponentFirstAfterSign | Exponent, b'0'..=b'9') => {
                self.push_exponent_digit(byte - b'0');
                Exponent
            }
            (Exponent, _) => return Ok(Step::Pop { redeliver: true }),
            (FractionalDigitsFirst | ExponentFirst | ExponentFirstAfterSign, _) => {
                return Err(Error::EncodingError)
            }
        };
        self.state = next;
        Ok(Step::Consumed)
    }

    /// Final numeric value. Only valid once `process` asked for a pop.
    pub(super) fn value(&self) -> Number {
        match self.mantissa {
            Accumulator::Integer(v) if !self.negative => Number::Unsigned(v),
            Accumulator::Integer(v) => match i64::try_from(v) {
                Ok(signed) => Number::Signed(-signed),
                Err(_) if v == i64::MIN.unsigned_abs() => Number::Signed(i64::MIN),
                Err(_) => Number::Double(-(v as f64)),
            },
            Accumulator::Double(mantissa) => {
                let magnitude = self.scale(mantissa);
                Number::Double(if self.negative { -magnitude } else { magnitude })
            }
        }
    }

    /// Apply fraction digits and exponent as one power of ten.
    fn scale(&self, mantissa: f64) -> f64 {
        if mantissa == 0.0 {
            return 0.0;
        }
        let exponent = if self.exponent_negative {
            -(self.exponent as i64)
        } else {
            self.exponent as i64
        };
        let net = exponent - self.fraction_digits.min(i64::MAX as u64) as i64;
        let steps = net.unsigned_abs().min(MAX_SCALE_STEPS);
        let mut power = 1.0f64;
        for _ in 0..steps {
            power *= 10.0;
        }
        if net >= 0 {
            mantissa * power
        } else {
            mantissa / power
        }
    }
}
