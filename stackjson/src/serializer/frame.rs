// SPDX-License-Identifier: Apache-2.0

//! Frame kinds of the serializer stack.
//!
//! Every frame remembers which fragment it is writing and how many bytes of
//! that fragment the sink has taken, so a short write can be resumed at
//! exactly the next byte.

use super::WriteSink;
use crate::array;
use crate::error::UnexpectedState;
use crate::escape::EscapeProcessor;
use crate::number::NumberText;
use crate::object;
use crate::value::Data;
use crate::{Error, Value};

const TABS: [u8; 16] = [b'\t'; 16];

/// What the driver does after a frame ran.
pub(super) enum Step<'v> {
    /// The sink took less than offered.
    Suspend,
    /// Serialize a child; the frame continues once the child is done.
    Push(Child<'v>),
    /// The frame has written everything.
    Pop,
}

pub(super) enum Child<'v> {
    Value(&'v Value),
    /// An empty array slot.
    Null,
    Key(&'v [u8]),
}

/// Write `bytes[*written..]`. `Ok(false)` means the sink took less than
/// offered and the caller must suspend.
fn emit<W: WriteSink + ?Sized>(
    sink: &mut W,
    bytes: &[u8],
    written: &mut usize,
) -> Result<bool, Error> {
    while *written < bytes.len() {
        let offered = bytes.len() - *written;
        let taken = sink.write_bytes(&bytes[*written..])?;
        if taken > offered {
            return Err(UnexpectedState::SinkOverreport.into());
        }
        *written += taken;
        if taken < offered {
            return Ok(false);
        }
    }
    Ok(true)
}

/// A newline followed by `tabs` tabs. `written` counts the newline too.
fn emit_break<W: WriteSink + ?Sized>(
    sink: &mut W,
    tabs: usize,
    written: &mut usize,
) -> Result<bool, Error> {
    if *written == 0 && !emit(sink, b"\n", written)? {
        return Ok(false);
    }
    while *written < tabs + 1 {
        let chunk = (tabs + 1 - *written).min(TABS.len());
        let mut taken = 0;
        let complete = emit(sink, &TABS[..chunk], &mut taken)?;
        *written += taken;
        if !complete {
            return Ok(false);
        }
    }
    Ok(true)
}

pub(super) enum Frame<'v> {
    Object(ObjectFrame<'v>),
    Array(ArrayFrame<'v>),
    Number(LiteralFrame),
    String(StringFrame<'v>),
    Constant(LiteralFrame),
}

impl<'v> Frame<'v> {
    /// Frame for `child`, which sits `depth` containers deep.
    pub(super) fn for_child(child: Child<'v>, depth: usize) -> Result<Self, Error> {
        let value = match child {
            Child::Null => return Ok(Frame::Constant(LiteralFrame::constant(b"null"))),
            Child::Key(key) => return Ok(Frame::String(StringFrame::new(key))),
            Child::Value(value) => value,
        };
        Ok(match value.data() {
            Data::Object(object) => Frame::Object(ObjectFrame::new(object, depth)),
            Data::Array(array) => Frame::Array(ArrayFrame::new(array, depth)),
            Data::String(bytes) => Frame::String(StringFrame::new(bytes)),
            Data::Number(number) => Frame::Number(LiteralFrame::number(*number)?),
            Data::True => Frame::Constant(LiteralFrame::constant(b"true")),
            Data::False => Frame::Constant(LiteralFrame::constant(b"false")),
            Data::Null => Frame::Constant(LiteralFrame::constant(b"null")),
        })
    }

    pub(super) fn process<W: WriteSink + ?Sized>(
        &mut self,
        sink: &mut W,
        pretty: bool,
    ) -> Result<Step<'v>, Error> {
        match self {
            Frame::Object(frame) => frame.process(sink, pretty),
            Frame::Array(frame) => frame.process(sink, pretty),
            Frame::Number(frame) | Frame::Constant(frame) => frame.process(sink),
            Frame::String(frame) => frame.process(sink),
        }
    }

    pub(super) fn name(&self) -> &'static str {
        match self {
            Frame::Object(_) => "object",
            Frame::Array(_) => "array",
            Frame::Number(_) => "number",
            Frame::String(_) => "string",
            Frame::Constant(_) => "constant",
        }
    }
}

enum LiteralText {
    Static(&'static [u8]),
    Number(NumberText),
}

/// Fixed text: a constant or a formatted number.
pub(super) struct LiteralFrame {
    text: LiteralText,
    written: usize,
}

impl LiteralFrame {
    fn constant(text: &'static [u8]) -> Self {
        Self {
            text: LiteralText::Static(text),
            written: 0,
        }
    }

    fn number(number: crate::Number) -> Result<Self, Error> {
        Ok(Self {
            text: LiteralText::Number(NumberText::format(number)?),
            written: 0,
        })
    }

    fn process<W: WriteSink + ?Sized>(&mut self, sink: &mut W) -> Result<Step<'static>, Error> {
        let bytes = match &self.text {
            LiteralText::Static(text) => *text,
            LiteralText::Number(text) => text.as_bytes(),
        };
        if emit(sink, bytes, &mut self.written)? {
            Ok(Step::Pop)
        } else {
            Ok(Step::Suspend)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum StringState {
    LeadingQuote,
    Body,
    TrailingQuote,
}

/// Escape sequence in flight and how many source bytes it stands for.
struct PendingEscape {
    bytes: [u8; 6],
    len: usize,
    written: usize,
    consumes: usize,
}

pub(super) struct StringFrame<'v> {
    bytes: &'v [u8],
    index: usize,
    state: StringState,
    written: usize,
    escape: Option<PendingEscape>,
}

impl<'v> StringFrame<'v> {
    fn new(bytes: &'v [u8]) -> Self {
        Self {
            bytes,
            index: 0,
            state: StringState::LeadingQuote,
            written: 0,
            escape: None,
        }
    }

    fn escape_at(&self) -> Result<PendingEscape, Error> {
        let rest = &self.bytes[self.index..];
        let byte = rest.first().copied().ok_or(UnexpectedState::EscapeAtEnd)?;
        let (bytes, len, consumes) = if let Some(letter) = EscapeProcessor::short_escape(byte) {
            ([b'\\', letter, 0, 0, 0, 0], 2, 1)
        } else if byte < 0x80 {
            (EscapeProcessor::unicode_escape(u16::from(byte)), 6, 1)
        } else {
            let (codepoint, unit) = EscapeProcessor::decode_utf8_unit(rest)?;
            (EscapeProcessor::unicode_escape(codepoint), 6, unit)
        };
        Ok(PendingEscape {
            bytes,
            len,
            written: 0,
            consumes,
        })
    }

    fn process<W: WriteSink + ?Sized>(&mut self, sink: &mut W) -> Result<Step<'v>, Error> {
        loop {
            match self.state {
                StringState::LeadingQuote => {
                    if !emit(sink, b"\"", &mut self.written)? {
                        return Ok(Step::Suspend);
                    }
                    self.state = StringState::Body;
                    self.written = 0;
                }
                StringState::Body => {
                    if let Some(escape) = &mut self.escape {
                        if !emit(sink, &escape.bytes[..escape.len], &mut escape.written)? {
                            return Ok(Step::Suspend);
                        }
                        self.index += escape.consumes;
                        self.escape = None;
                        continue;
                    }
                    let rest = &self.bytes[self.index..];
                    if rest.is_empty() {
                        self.state = StringState::TrailingQuote;
                        continue;
                    }
                    let run = rest
                        .iter()
                        .position(|&byte| EscapeProcessor::needs_escape(byte))
                        .unwrap_or(rest.len());
                    if run == 0 {
                        self.escape = Some(self.escape_at()?);
                        continue;
                    }
                    let mut taken = 0;
                    let complete = emit(sink, &rest[..run], &mut taken)?;
                    self.index += taken;
                    if !complete {
                        return Ok(Step::Suspend);
                    }
                }
                StringState::TrailingQuote => {
                    if !emit(sink, b"\"", &mut self.written)? {
                        return Ok(Step::Suspend);
                    }
                    return Ok(Step::Pop);
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ArrayStep {
    Open,
    Break,
    Element,
    AfterElement,
    Separator,
    CloseBreak,
    Close,
}

pub(super) struct ArrayFrame<'v> {
    items: array::Iter<'v>,
    next: Option<Option<&'v Value>>,
    depth: usize,
    step: ArrayStep,
    written: usize,
}

impl<'v> ArrayFrame<'v> {
    fn new(array: &'v array::PagedArray, depth: usize) -> Self {
        Self {
            items: array.iter(),
            next: None,
            depth,
            step: ArrayStep::Open,
            written: 0,
        }
    }

    fn advance(&mut self, step: ArrayStep) {
        self.step = step;
        self.written = 0;
    }

    fn process<W: WriteSink + ?Sized>(
        &mut self,
        sink: &mut W,
        pretty: bool,
    ) -> Result<Step<'v>, Error> {
        loop {
            let complete = match self.step {
                ArrayStep::Open => emit(sink, b"[", &mut self.written)?,
                ArrayStep::Separator => emit(sink, b",", &mut self.written)?,
                ArrayStep::Break => emit_break(sink, self.depth + 1, &mut self.written)?,
                ArrayStep::CloseBreak => emit_break(sink, self.depth, &mut self.written)?,
                ArrayStep::Close => emit(sink, b"]", &mut self.written)?,
                ArrayStep::Element | ArrayStep::AfterElement => true,
            };
            if !complete {
                return Ok(Step::Suspend);
            }
            let member = if pretty {
                ArrayStep::Break
            } else {
                ArrayStep::Element
            };
            match self.step {
                ArrayStep::Open | ArrayStep::AfterElement => {
                    let first = self.step == ArrayStep::Open;
                    self.next = self.items.next();
                    match (self.next.is_some(), first) {
                        (true, true) => self.advance(member),
                        (true, false) => self.advance(ArrayStep::Separator),
                        (false, false) if pretty => self.advance(ArrayStep::CloseBreak),
                        (false, _) => self.advance(ArrayStep::Close),
                    }
                }
                ArrayStep::Separator => self.advance(member),
                ArrayStep::Break => self.advance(ArrayStep::Element),
                ArrayStep::Element => {
                    self.advance(ArrayStep::AfterElement);
                    let child = match self.next.take() {
                        Some(Some(value)) => Child::Value(value),
                        Some(None) => Child::Null,
                        None => return Err(UnexpectedState::ValueTaken.into()),
                    };
                    return Ok(Step::Push(child));
                }
                ArrayStep::CloseBreak => self.advance(ArrayStep::Close),
                ArrayStep::Close => return Ok(Step::Pop),
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ObjectStep {
    Open,
    Break,
    Key,
    Colon,
    Value,
    AfterValue,
    Separator,
    CloseBreak,
    Close,
}

pub(super) struct ObjectFrame<'v> {
    entries: object::Iter<'v>,
    next: Option<(&'v [u8], &'v Value)>,
    depth: usize,
    step: ObjectStep,
    written: usize,
}

impl<'v> ObjectFrame<'v> {
    fn new(object: &'v object::HashedObject, depth: usize) -> Self {
        Self {
            entries: object.iter(),
            next: None,
            depth,
            step: ObjectStep::Open,
            written: 0,
        }
    }

    fn advance(&mut self, step: ObjectStep) {
        self.step = step;
        self.written = 0;
    }

    fn process<W: WriteSink + ?Sized>(
        &mut self,
        sink: &mut W,
        pretty: bool,
    ) -> Result<Step<'v>, Error> {
        loop {
            let complete = match self.step {
                ObjectStep::Open => emit(sink, b"{", &mut self.written)?,
                ObjectStep::Separator => emit(sink, b",", &mut self.written)?,
                ObjectStep::Break => emit_break(sink, self.depth + 1, &mut self.written)?,
                ObjectStep::Colon => emit(sink, b":", &mut self.written)?,
                ObjectStep::CloseBreak => emit_break(sink, self.depth, &mut self.written)?,
                ObjectStep::Close => emit(sink, b"}", &mut self.written)?,
                ObjectStep::Key | ObjectStep::Value | ObjectStep::AfterValue => true,
            };
            if !complete {
                return Ok(Step::Suspend);
            }
            let member = if pretty {
                ObjectStep::Break
            } else {
                ObjectStep::Key
            };
            match self.step {
                ObjectStep::Open | ObjectStep::AfterValue => {
                    let first = self.step == ObjectStep::Open;
                    self.next = self.entries.next();
                    match (self.next.is_some(), first) {
                        (true, true) => self.advance(member),
                        (true, false) => self.advance(ObjectStep::Separator),
                        (false, false) if pretty => self.advance(ObjectStep::CloseBreak),
                        (false, _) => self.advance(ObjectStep::Close),
                    }
                }
                ObjectStep::Separator => self.advance(member),
                ObjectStep::Break => self.advance(ObjectStep::Key),
                ObjectStep::Key => {
                    let (key, _) = self.next.ok_or(UnexpectedState::ValueTaken)?;
                    self.advance(ObjectStep::Colon);
                    return Ok(Step::Push(Child::Key(key)));
                }
                ObjectStep::Colon => self.advance(ObjectStep::Value),
                ObjectStep::Value => {
                    let (_, value) = self.next.take().ok_or(UnexpectedState::ValueTaken)?;
                    self.advance(ObjectStep::AfterValue);
                    return Ok(Step::Push(Child::Value(value)));
                }
                ObjectStep::CloseBreak => self.advance(ObjectStep::Close),
                ObjectStep::Close => return Ok(Step::Pop),
            }
        }
    }
}
