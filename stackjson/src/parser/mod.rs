// SPDX-License-Identifier: Apache-2.0

//! Incremental byte-at-a-time parser.
//!
//! Nesting lives in an explicit stack of frames rather than in native
//! recursion. Each byte goes to the frame on top of the stack, or to the
//! implicit root when the stack is empty. A frame answers with a [`Step`]:
//! keep going, push a child, or pop. Numbers can only tell they ended by
//! seeing the next byte, so a pop or push may ask for the same byte to be
//! replayed against the new top frame.
//!
//! When a frame pops, its value is staged in a single child slot and the
//! frame underneath absorbs it: objects take it as a key or as the value for
//! the pending key, arrays append it, and the root hands the finished
//! document to the [`DocumentHandler`] (or parks it for
//! [`Parser::take_document`]).

use alloc::vec::Vec;

use crate::allocator::{Alloc, Reservation};
use crate::array::DEFAULT_PAGE_SIZE;
use crate::error::UnexpectedState;
use crate::object::DEFAULT_BUCKET_COUNT;
use crate::{Error, Value};

mod frame;
mod number;
mod string;

use frame::{begin_value, Context, Frame, Step};
pub use string::DEFAULT_STRING_CHUNK;

pub(crate) fn is_whitespace(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r')
}

/// Parser configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserOptions {
    /// Accept any number of top-level documents, one after another.
    /// Requires a [`DocumentHandler`].
    pub streaming: bool,
    /// Recorded but not enforced: a repeated key always replaces the
    /// earlier value.
    pub allow_duplicate_keys: bool,
    /// Page size of every array the parser builds.
    pub array_page_size: usize,
    /// Bucket count of every object the parser builds.
    pub object_buckets: usize,
    /// Chunk size of the buffer strings are collected in.
    pub string_chunk_size: usize,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            streaming: false,
            allow_duplicate_keys: false,
            array_page_size: DEFAULT_PAGE_SIZE,
            object_buckets: DEFAULT_BUCKET_COUNT,
            string_chunk_size: DEFAULT_STRING_CHUNK,
        }
    }
}

impl ParserOptions {
    pub fn streaming() -> Self {
        Self {
            streaming: true,
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<(), Error> {
        if self.array_page_size == 0 || self.object_buckets == 0 || self.string_chunk_size == 0 {
            return Err(Error::InvalidParam);
        }
        Ok(())
    }
}

/// Receives each completed top-level document.
pub trait DocumentHandler {
    /// Takes ownership of `document`. An `Err` halts the parser and is
    /// returned from the byte that completed the document.
    fn document_ready(&mut self, document: Value) -> Result<(), Error>;
}

impl<F> DocumentHandler for F
where
    F: FnMut(Value) -> Result<(), Error>,
{
    fn document_ready(&mut self, document: Value) -> Result<(), Error> {
        self(document)
    }
}

/// Placeholder handler type for parsers that park their document instead.
#[derive(Debug)]
pub struct NoHandler;

impl DocumentHandler for NoHandler {
    fn document_ready(&mut self, _document: Value) -> Result<(), Error> {
        Ok(())
    }
}

struct StackEntry {
    frame: Frame,
    _mem: Reservation,
}

/// Incremental JSON parser.
///
/// Feed bytes with [`process_byte`](Self::process_byte) or
/// [`write`](Self::write) and call [`finish`](Self::finish) at end of input.
/// After the first error every further call returns that same error;
/// dropping the parser releases all partially built values.
pub struct Parser<H = NoHandler> {
    stack: Vec<StackEntry>,
    ctx: Context,
    handler: Option<H>,
    child_result: Option<Value>,
    document: Option<Value>,
    done: bool,
    failed: Option<Error>,
    position: usize,
}

impl Parser<NoHandler> {
    /// A single-document parser. The document is parked until
    /// [`take_document`](Self::take_document).
    pub fn new(options: ParserOptions) -> Result<Self, Error> {
        Self::build(options, None, Alloc::default())
    }

    pub fn with_alloc(options: ParserOptions, alloc: Alloc) -> Result<Self, Error> {
        Self::build(options, None, alloc)
    }
}

impl<H: DocumentHandler> Parser<H> {
    pub fn with_handler(options: ParserOptions, handler: H) -> Result<Self, Error> {
        Self::build(options, Some(handler), Alloc::default())
    }

    pub fn with_handler_and_alloc(
        options: ParserOptions,
        handler: H,
        alloc: Alloc,
    ) -> Result<Self, Error> {
        Self::build(options, Some(handler), alloc)
    }

    fn build(options: ParserOptions, handler: Option<H>, alloc: Alloc) -> Result<Self, Error> {
        options.validate()?;
        if options.streaming && handler.is_none() {
            return Err(Error::InvalidParam);
        }
        Ok(Self {
            stack: Vec::new(),
            ctx: Context { alloc, options },
            handler,
            child_result: None,
            document: None,
            done: false,
            failed: None,
            position: 0,
        })
    }

    pub fn options(&self) -> &ParserOptions {
        &self.ctx.options
    }

    /// Number of frames on the stack.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Bytes consumed so far. After an error this is the offset of the
    /// offending byte.
    pub fn position(&self) -> usize {
        self.position
    }

    /// A single-document parser that has delivered its document.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// The parked document of a parser without a handler.
    pub fn take_document(&mut self) -> Option<Value> {
        self.document.take()
    }

    /// Feed one byte.
    pub fn process_byte(&mut self, byte: u8) -> Result<(), Error> {
        if let Some(error) = self.failed {
            return Err(error);
        }
        match self.dispatch(byte) {
            Ok(()) => {
                self.position += 1;
                Ok(())
            }
            Err(error) => Err(self.fail(error)),
        }
    }

    /// Feed a slice, stopping at the first error.
    pub fn write(&mut self, data: &[u8]) -> Result<(), Error> {
        data.iter().try_for_each(|&byte| self.process_byte(byte))
    }

    /// Signal end of input.
    ///
    /// A top-level number has no closing delimiter of its own, so a pending
    /// one is completed here. Anything still open, or a single-document
    /// parser that never saw a document, is an encoding error.
    pub fn finish(&mut self) -> Result<(), Error> {
        if let Some(error) = self.failed {
            return Err(error);
        }
        let number_pending = matches!(
            self.stack.last(),
            Some(StackEntry {
                frame: Frame::Number(_),
                ..
            })
        );
        if number_pending {
            if let Err(error) = self.dispatch(b' ') {
                return Err(self.fail(error));
            }
        }
        if !self.stack.is_empty() || (!self.ctx.options.streaming && !self.done) {
            return Err(self.fail(Error::EncodingError));
        }
        Ok(())
    }

    /// Release the parser and hand back its handler.
    pub fn destroy(self) -> Option<H> {
        self.handler
    }

    fn fail(&mut self, error: Error) -> Error {
        log::warn!(
            "parser halted at byte {} (depth {}): {}",
            self.position,
            self.stack.len(),
            error
        );
        self.failed = Some(error);
        error
    }

    /// Run `byte` through the stack until some frame consumes it.
    fn dispatch(&mut self, byte: u8) -> Result<(), Error> {
        loop {
            let step = match self.stack.last_mut() {
                Some(entry) => entry.frame.process(byte, &self.ctx)?,
                None => self.root_step(byte)?,
            };
            let redeliver = match step {
                Step::Consumed => false,
                Step::Push { frame, redeliver } => {
                    self.push(frame)?;
                    redeliver
                }
                Step::Pop { redeliver } => {
                    self.pop()?;
                    self.notify()?;
                    redeliver
                }
            };
            if !redeliver {
                return Ok(());
            }
        }
    }

    fn root_step(&self, byte: u8) -> Result<Step, Error> {
        if is_whitespace(byte) {
            return Ok(Step::Consumed);
        }
        if self.done {
            return Err(Error::AlreadyFinished);
        }
        begin_value(byte, &self.ctx)?.ok_or(Error::EncodingError)
    }

    fn push(&mut self, frame: Frame) -> Result<(), Error> {
        let mem = self.ctx.alloc.reserve(core::mem::size_of::<StackEntry>())?;
        self.stack
            .try_reserve(1)
            .map_err(|_| Error::OutOfMemory)?;
        log::trace!("push {} frame at depth {}", frame.name(), self.stack.len());
        self.stack.push(StackEntry { frame, _mem: mem });
        Ok(())
    }

    /// Unlink the top frame and stage its value in the child slot.
    fn pop(&mut self) -> Result<(), Error> {
        let entry = self
            .stack
            .pop()
            .ok_or(UnexpectedState::MissingChildResult)?;
        log::trace!("pop {} frame at depth {}", entry.frame.name(), self.stack.len());
        let value = entry.frame.into_value(&self.ctx)?;
        self.child_result = Some(value);
        Ok(())
    }

    /// Let the new top frame, or the root, absorb the staged child.
    fn notify(&mut self) -> Result<(), Error> {
        let Some(child) = self.child_result.take() else {
            return if self.stack.is_empty() {
                Err(Error::Finished)
            } else {
                Err(UnexpectedState::MissingChildResult.into())
            };
        };
        match self.stack.last_mut() {
            Some(entry) => entry.frame.absorb(child),
            None => self.deliver(child),
        }
    }

    fn deliver(&mut self, document: Value) -> Result<(), Error> {
        log::debug!("document complete at byte {}", self.position);
        if !self.ctx.options.streaming {
            self.done = true;
        }
        match &mut self.handler {
            Some(handler) => handler.document_ready(document),
            None => {
                self.document = Some(document);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Number, ValueKind};
    use test_log::test;

    fn parse(input: &[u8]) -> Result<Value, Error> {
        let mut parser = Parser::new(ParserOptions::default())?;
        parser.write(input)?;
        parser.finish()?;
        parser.take_document().ok_or(Error::Finished)
    }

    #[test]
    fn test_root_number_needs_finish() {
        let mut parser = Parser::new(ParserOptions::default()).unwrap();
        parser.write(b"123").unwrap();
        assert_eq!(parser.depth(), 1);
        assert!(parser.take_document().is_none());
        parser.finish().unwrap();
        let document = parser.take_document().unwrap();
        assert_eq!(document.number(), Some(Number::Unsigned(123)));
    }

    #[test]
    fn test_nested_depth_tracks_frames() {
        let mut parser = Parser::new(ParserOptions::default()).unwrap();
        parser.write(br#"{"a":[[{"b":"#).unwrap();
        assert_eq!(parser.depth(), 4);
        parser.write(b"1}]]}").unwrap();
        assert_eq!(parser.depth(), 0);
        assert!(parser.is_done());
    }

    #[test]
    fn test_number_redelivers_terminator() {
        let document = parse(b"[1,-2,3.5]").unwrap();
        let array = document.as_array().unwrap();
        let kinds: Vec<ValueKind> = array.iter().flatten().map(Value::kind).collect();
        assert_eq!(kinds, [ValueKind::Unsigned, ValueKind::Signed, ValueKind::Double]);
    }

    #[test]
    fn test_error_is_sticky() {
        let mut parser = Parser::new(ParserOptions::default()).unwrap();
        assert_eq!(parser.write(b"[1,,2]"), Err(Error::EncodingError));
        assert_eq!(parser.position(), 3);
        assert_eq!(parser.process_byte(b']'), Err(Error::EncodingError));
        assert_eq!(parser.finish(), Err(Error::EncodingError));
    }

    #[test]
    fn test_options_validated() {
        let options = ParserOptions {
            object_buckets: 0,
            ..ParserOptions::default()
        };
        assert!(matches!(Parser::new(options), Err(Error::InvalidParam)));
        assert!(matches!(
            Parser::new(ParserOptions::streaming()),
            Err(Error::InvalidParam)
        ));
    }

    #[test]
    fn test_empty_input_is_incomplete() {
        assert_eq!(parse(b"  ").unwrap_err(), Error::EncodingError);
        assert_eq!(parse(b"[1").unwrap_err(), Error::EncodingError);
        assert_eq!(parse(b"\"open").unwrap_err(), Error::EncodingError);
    }

    #[test]
    fn test_root_without_child_is_finished() {
        let mut parser = Parser::new(ParserOptions::default()).unwrap();
        assert_eq!(parser.notify(), Err(Error::Finished));
    }
}
