// SPDX-License-Identifier: Apache-2.0

use alloc::boxed::Box;
use alloc::vec::Vec;

use super::frame::Step;
use crate::allocator::{Alloc, Reservation};
use crate::escape::EscapeProcessor;
use crate::{Error, Value};

/// Bytes per string buffer chunk when none is requested.
pub const DEFAULT_STRING_CHUNK: usize = 512;

struct Chunk {
    bytes: Vec<u8>,
    _mem: Reservation,
}

/// Growable byte buffer made of fixed-size chunks, so a long string never
/// needs one large reallocation while it is still being read.
struct ByteChain {
    chunks: Vec<Chunk>,
    chunk_size: usize,
    len: usize,
    alloc: Alloc,
}

impl ByteChain {
    fn new(chunk_size: usize, alloc: Alloc) -> Self {
        Self {
            chunks: Vec::new(),
            chunk_size,
            len: 0,
            alloc,
        }
    }

    fn push(&mut self, byte: u8) -> Result<(), Error> {
        let needs_chunk = self
            .chunks
            .last()
            .map_or(true, |chunk| chunk.bytes.len() == self.chunk_size);
        if needs_chunk {
            let mem = self
                .alloc
                .reserve(core::mem::size_of::<Chunk>() + self.chunk_size)?;
            let mut bytes = Vec::new();
            bytes
                .try_reserve_exact(self.chunk_size)
                .map_err(|_| Error::OutOfMemory)?;
            self.chunks
                .try_reserve(1)
                .map_err(|_| Error::OutOfMemory)?;
            self.chunks.push(Chunk { bytes, _mem: mem });
        }
        if let Some(chunk) = self.chunks.last_mut() {
            chunk.bytes.push(byte);
            self.len += 1;
        }
        Ok(())
    }

    fn extend(&mut self, bytes: &[u8]) -> Result<(), Error> {
        bytes.iter().try_for_each(|&byte| self.push(byte))
    }

    /// Join the chunks into one contiguous buffer.
    fn to_boxed(&self) -> Result<Box<[u8]>, Error> {
        let mut joined = Vec::new();
        joined
            .try_reserve_exact(self.len)
            .map_err(|_| Error::OutOfMemory)?;
        for chunk in &self.chunks {
            joined.extend_from_slice(&chunk.bytes);
        }
        Ok(joined.into_boxed_slice())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum StringState {
    Normal,
    Escaped,
    Unicode { digits: u8, codepoint: u32 },
}

/// String (value or object key) being read. The opening quote has already
/// been consumed by whoever pushed the frame.
pub(super) struct StringFrame {
    buffer: ByteChain,
    state: StringState,
}

impl StringFrame {
    pub(super) fn new(chunk_size: usize, alloc: Alloc) -> Self {
        Self {
            buffer: ByteChain::new(chunk_size, alloc),
            state: StringState::Normal,
        }
    }

    pub(super) fn process(&mut self, byte: u8) -> Result<Step, Error> {
        match self.state {
            StringState::Normal => match byte {
                b'"' => return Ok(Step::Pop { redeliver: false }),
                b'\\' => self.state = StringState::Escaped,
                0x00..=0x1F => return Err(Error::EncodingError),
                _ => self.buffer.push(byte)?,
            },
            StringState::Escaped => {
                if byte == b'u' {
                    self.state = StringState::Unicode {
                        digits: 0,
                        codepoint: 0,
                    };
                } else {
                    let unescaped = EscapeProcessor::process_simple_escape(byte)?;
                    self.buffer.push(unescaped)?;
                    self.state = StringState::Normal;
                }
            }
            StringState::Unicode { digits, codepoint } => {
                let codepoint = (codepoint << 4) | EscapeProcessor::validate_hex_digit(byte)?;
                if digits + 1 == 4 {
                    let mut utf8 = [0u8; 4];
                    let encoded = EscapeProcessor::encode_codepoint(codepoint, &mut utf8)?;
                    self.buffer.extend(encoded)?;
                    self.state = StringState::Normal;
                } else {
                    self.state = StringState::Unicode {
                        digits: digits + 1,
                        codepoint,
                    };
                }
            }
        }
        Ok(Step::Consumed)
    }

    /// The finished string value. Content must be valid UTF-8.
    pub(super) fn value(&self, alloc: &Alloc) -> Result<Value, Error> {
        let bytes = self.buffer.to_boxed()?;
        core::str::from_utf8(&bytes)?;
        Value::from_string_bytes(bytes, alloc)
    }
}

impl core::fmt::Debug for StringFrame {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StringFrame")
            .field("len", &self.buffer.len)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn read(body: &[u8], chunk_size: usize) -> Result<Value, Error> {
        let mut frame = StringFrame::new(chunk_size, Alloc::system());
        for &byte in body {
            if let Step::Pop { .. } = frame.process(byte)? {
                return frame.value(&Alloc::system());
            }
        }
        panic!("string never closed");
    }

    #[test]
    fn test_plain_and_escaped() {
        let value = read(br#"a\"b\\c\/\n\t""#, 4).unwrap();
        assert_eq!(value.as_bytes().unwrap(), b"a\"b\\c/\n\t");
    }

    #[test]
    fn test_unicode_escapes() {
        let value = read(br#"\u00C4\u20ac\u0041""#, DEFAULT_STRING_CHUNK).unwrap();
        assert_eq!(value.as_bytes().unwrap(), "\u{C4}\u{20AC}A".as_bytes());
    }

    #[test]
    fn test_spans_many_chunks() {
        let mut body = vec![b'x'; 1000];
        body.push(b'"');
        let value = read(&body, 7).unwrap();
        assert_eq!(value.string_len(), 1000);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert_eq!(read(b"\\q\"", 8).unwrap_err(), Error::EncodingError);
        assert_eq!(read(b"\\u00G0\"", 8).unwrap_err(), Error::EncodingError);
        assert_eq!(read(b"\\uD800\"", 8).unwrap_err(), Error::EncodingError);
        assert_eq!(read(b"a\nb\"", 8).unwrap_err(), Error::EncodingError);
        assert_eq!(read(b"\xff\"", 8).unwrap_err(), Error::EncodingError);
    }
}
