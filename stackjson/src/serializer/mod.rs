// SPDX-License-Identifier: Apache-2.0

//! Resumable serializer.
//!
//! The mirror of the parser: nesting is an explicit stack of frames and the
//! sink may take fewer bytes than offered. On a short write the serializer
//! returns [`Progress::Pending`] and [`Serializer::resume`] continues at the
//! exact byte where it stopped.

use alloc::vec::Vec;

use crate::allocator::{Alloc, Reservation};
use crate::{Error, Value};

mod frame;

use frame::{Child, Frame, Step};

/// Destination for serialized bytes.
pub trait WriteSink {
    /// Take a prefix of `data` and return its length. Taking fewer bytes
    /// than offered, including none, suspends the serializer. An `Err`
    /// halts it.
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, Error>;
}

impl WriteSink for Vec<u8> {
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, Error> {
        self.try_reserve(data.len())
            .map_err(|_| Error::OutOfMemory)?;
        self.extend_from_slice(data);
        Ok(data.len())
    }
}

impl<W: WriteSink + ?Sized> WriteSink for &mut W {
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, Error> {
        (**self).write_bytes(data)
    }
}

/// Serializer configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SerializerOptions {
    /// Put members on their own tab-indented lines.
    pub pretty: bool,
}

impl SerializerOptions {
    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

/// Outcome of a serialize or resume call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// The whole value has been written.
    Complete,
    /// The sink took a short write; call [`Serializer::resume`] again.
    Pending,
}

struct StackEntry<'v> {
    frame: Frame<'v>,
    _mem: Reservation,
}

/// Serializes one value at a time into a [`WriteSink`].
pub struct Serializer<'v, W> {
    sink: W,
    stack: Vec<StackEntry<'v>>,
    options: SerializerOptions,
    alloc: Alloc,
    failed: Option<Error>,
}

impl<'v, W: WriteSink> Serializer<'v, W> {
    pub fn new(sink: W, options: SerializerOptions) -> Self {
        Self::with_alloc(sink, options, Alloc::default())
    }

    pub fn with_alloc(sink: W, options: SerializerOptions, alloc: Alloc) -> Self {
        Self {
            sink,
            stack: Vec::new(),
            options,
            alloc,
            failed: None,
        }
    }

    /// Start writing `value`.
    ///
    /// Only one value can be in flight: calling this before the previous
    /// one completed is [`Error::InvalidState`].
    pub fn serialize(&mut self, value: &'v Value) -> Result<Progress, Error> {
        if let Some(error) = self.failed {
            return Err(error);
        }
        if !self.stack.is_empty() {
            return Err(Error::InvalidState);
        }
        if let Err(error) = self.push(Child::Value(value)) {
            return Err(self.fail(error));
        }
        self.resume()
    }

    /// Continue after [`Progress::Pending`]. With nothing in flight this
    /// reports [`Progress::Complete`].
    pub fn resume(&mut self) -> Result<Progress, Error> {
        if let Some(error) = self.failed {
            return Err(error);
        }
        self.run().map_err(|error| self.fail(error))
    }

    /// No serialization in flight.
    pub fn is_idle(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn sink(&self) -> &W {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut W {
        &mut self.sink
    }

    /// Release the serializer, including any frames still in flight, and
    /// hand back the sink.
    pub fn into_sink(self) -> W {
        self.sink
    }

    fn fail(&mut self, error: Error) -> Error {
        log::warn!(
            "serializer halted at depth {}: {}",
            self.stack.len(),
            error
        );
        self.failed = Some(error);
        error
    }

    fn run(&mut self) -> Result<Progress, Error> {
        while let Some(entry) = self.stack.last_mut() {
            match entry.frame.process(&mut self.sink, self.options.pretty)? {
                Step::Suspend => {
                    log::debug!("sink short write, suspended at depth {}", self.stack.len());
                    return Ok(Progress::Pending);
                }
                Step::Push(child) => self.push(child)?,
                Step::Pop => {
                    if let Some(entry) = self.stack.pop() {
                        log::trace!("pop {} frame at depth {}", entry.frame.name(), self.stack.len());
                    }
                }
            }
        }
        Ok(Progress::Complete)
    }

    fn push(&mut self, child: Child<'v>) -> Result<(), Error> {
        let frame = Frame::for_child(child, self.stack.len())?;
        let mem = self.alloc.reserve(core::mem::size_of::<StackEntry<'_>>())?;
        self.stack
            .try_reserve(1)
            .map_err(|_| Error::OutOfMemory)?;
        log::trace!("push {} frame at depth {}", frame.name(), self.stack.len());
        self.stack.push(StackEntry { frame, _mem: mem });
        Ok(())
    }
}

/// Serialize `value` into a fresh buffer in one go.
pub fn to_vec(value: &Value, options: SerializerOptions) -> Result<Vec<u8>, Error> {
    let mut out = Vec::new();
    let progress = Serializer::new(&mut out, options).serialize(value)?;
    match progress {
        Progress::Complete => Ok(out),
        // A Vec sink always takes everything
        Progress::Pending => Err(Error::InvalidState),
    }
}
