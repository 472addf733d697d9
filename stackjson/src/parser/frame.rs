// SPDX-License-Identifier: Apache-2.0

//! Frame kinds of the parser stack and their byte transitions.

use super::number::NumberFrame;
use super::string::StringFrame;
use super::{is_whitespace, ParserOptions};
use crate::allocator::Alloc;
use crate::error::UnexpectedState;
use crate::{Error, Value};

/// What the driver does after a frame looked at a byte.
#[derive(Debug)]
pub(super) enum Step {
    /// The byte was consumed; the frame stays on top.
    Consumed,
    /// Push a new frame. With `redeliver` the same byte is replayed against
    /// it instead of being consumed.
    Push { frame: Frame, redeliver: bool },
    /// The frame is complete. With `redeliver` the byte is replayed against
    /// the frame underneath.
    Pop { redeliver: bool },
}

/// Settings every frame can see.
pub(super) struct Context {
    pub(super) alloc: Alloc,
    pub(super) options: ParserOptions,
}

#[derive(Debug)]
pub(super) enum Frame {
    Object(ObjectFrame),
    Array(ArrayFrame),
    Number(NumberFrame),
    String(StringFrame),
    Constant(ConstantFrame),
}

/// Frame for a byte that starts a value, or `None` if it cannot.
pub(super) fn begin_value(byte: u8, ctx: &Context) -> Result<Option<Step>, Error> {
    let step = match byte {
        b'{' => Step::Push {
            frame: Frame::Object(ObjectFrame::new(ctx)?),
            redeliver: false,
        },
        b'[' => Step::Push {
            frame: Frame::Array(ArrayFrame::new(ctx)?),
            redeliver: false,
        },
        b'"' => Step::Push {
            frame: Frame::String(StringFrame::new(
                ctx.options.string_chunk_size,
                ctx.alloc.clone(),
            )),
            redeliver: false,
        },
        b't' | b'f' | b'n' => Step::Push {
            frame: Frame::Constant(ConstantFrame::new(byte)),
            redeliver: false,
        },
        b'-' | b'0'..=b'9' => Step::Push {
            frame: Frame::Number(NumberFrame::new()),
            redeliver: true,
        },
        _ => return Ok(None),
    };
    Ok(Some(step))
}

impl Frame {
    pub(super) fn process(&mut self, byte: u8, ctx: &Context) -> Result<Step, Error> {
        match self {
            Frame::Object(frame) => frame.process(byte, ctx),
            Frame::Array(frame) => frame.process(byte, ctx),
            Frame::Number(frame) => frame.process(byte),
            Frame::String(frame) => frame.process(byte),
            Frame::Constant(frame) => frame.process(byte),
        }
    }

    /// Hand the result of a popped child to this frame.
    pub(super) fn absorb(&mut self, child: Value) -> Result<(), Error> {
        match self {
            Frame::Object(frame) => frame.absorb(child),
            Frame::Array(frame) => frame.absorb(child),
            Frame::Number(_) | Frame::String(_) | Frame::Constant(_) => {
                Err(UnexpectedState::ChildOfLeafFrame.into())
            }
        }
    }

    /// Turn a completed frame into its value.
    pub(super) fn into_value(self, ctx: &Context) -> Result<Value, Error> {
        match self {
            Frame::Object(frame) => Ok(frame.value),
            Frame::Array(frame) => Ok(frame.value),
            Frame::Number(frame) => Value::from_number(frame.value(), &ctx.alloc),
            Frame::String(frame) => frame.value(&ctx.alloc),
            Frame::Constant(frame) => frame.value(&ctx.alloc),
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

#[derive(Debug, Clone, Copy, PartialEq)]
enum Literal {
    True,
    False,
    Null,
}

/// `true`, `false` or `null`, matched one byte at a time.
#[derive(Debug)]
pub(super) struct ConstantFrame {
    literal: Literal,
    matched: usize,
}

impl ConstantFrame {
    /// The first letter picked the literal and counts as matched.
    fn new(first: u8) -> Self {
        let literal = match first {
            b't' => Literal::True,
            b'f' => Literal::False,
            _ => Literal::Null,
        };
        Self {
            literal,
            matched: 1,
        }
    }

    fn text(&self) -> &'static [u8] {
        match self.literal {
            Literal::True => b"true",
            Literal::False => b"false",
            Literal::Null => b"null",
        }
    }

    fn process(&mut self, byte: u8) -> Result<Step, Error> {
        let text = self.text();
        if text.get(self.matched) != Some(&byte) {
            return Err(Error::EncodingError);
        }
        self.matched += 1;
        if self.matched == text.len() {
            Ok(Step::Pop { redeliver: false })
        } else {
            Ok(Step::Consumed)
        }
    }

    fn value(&self, alloc: &Alloc) -> Result<Value, Error> {
        match self.literal {
            Literal::True => Value::new_true(alloc),
            Literal::False => Value::new_false(alloc),
            Literal::Null => Value::new_null(alloc),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ArrayState {
    NoComma,
    GotComma,
}

#[derive(Debug)]
pub(super) struct ArrayFrame {
    value: Value,
    state: ArrayState,
}

impl ArrayFrame {
    fn new(ctx: &Context) -> Result<Self, Error> {
        Ok(Self {
            value: Value::new_array_with_page_size(ctx.options.array_page_size, &ctx.alloc)?,
            state: ArrayState::NoComma,
        })
    }

    fn len(&self) -> usize {
        self.value.as_array().map_or(0, |array| array.len())
    }

    fn process(&mut self, byte: u8, ctx: &Context) -> Result<Step, Error> {
        match (self.state, byte) {
            (_, b) if is_whitespace(b) => Ok(Step::Consumed),
            (ArrayState::NoComma, b',') if self.len() > 0 => {
                self.state = ArrayState::GotComma;
                Ok(Step::Consumed)
            }
            (ArrayState::NoComma, b']') => Ok(Step::Pop { redeliver: false }),
            // Elements need a separating comma
            (ArrayState::NoComma, _) if self.len() > 0 => Err(Error::EncodingError),
            (_, b) => begin_value(b, ctx)?.ok_or(Error::EncodingError),
        }
    }

    fn absorb(&mut self, child: Value) -> Result<(), Error> {
        let array = self
            .value
            .as_array_mut()
            .map_err(|_| UnexpectedState::KindMismatch)?;
        array.push(child)?;
        self.state = ArrayState::NoComma;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ObjectState {
    ExpectKey,
    ReadKey,
    ExpectObject,
    ReadObject,
}

#[derive(Debug)]
pub(super) struct ObjectFrame {
    value: Value,
    state: ObjectState,
    members: usize,
    pending_key: Option<Value>,
}

impl ObjectFrame {
    fn new(ctx: &Context) -> Result<Self, Error> {
        Ok(Self {
            value: Value::new_object_with_buckets(ctx.options.object_buckets, &ctx.alloc)?,
            state: ObjectState::ExpectKey,
            members: 0,
            pending_key: None,
        })
    }

    fn process(&mut self, byte: u8, ctx: &Context) -> Result<Step, Error> {
        if is_whitespace(byte) {
            return Ok(Step::Consumed);
        }
        match (self.state, byte) {
            (ObjectState::ExpectKey, b'"') => {
                self.state = ObjectState::ReadKey;
                Ok(Step::Push {
                    frame: Frame::String(StringFrame::new(
                        ctx.options.string_chunk_size,
                        ctx.alloc.clone(),
                    )),
                    redeliver: false,
                })
            }
            (ObjectState::ExpectKey, b'}') if self.members == 0 => {
                Ok(Step::Pop { redeliver: false })
            }
            (ObjectState::ReadKey, b':') if self.pending_key.is_some() => {
                self.state = ObjectState::ExpectObject;
                Ok(Step::Consumed)
            }
            (ObjectState::ExpectObject, _) => {
                let step = begin_value(byte, ctx)?.ok_or(Error::EncodingError)?;
                self.state = ObjectState::ReadObject;
                Ok(step)
            }
            (ObjectState::ReadObject, b',') => {
                self.state = ObjectState::ExpectKey;
                Ok(Step::Consumed)
            }
            (ObjectState::ReadObject, b'}') => Ok(Step::Pop { redeliver: false }),
            _ => Err(Error::EncodingError),
        }
    }

    fn absorb(&mut self, child: Value) -> Result<(), Error> {
        match self.state {
            ObjectState::ReadKey if self.pending_key.is_none() => {
                self.pending_key = Some(child);
                Ok(())
            }
            ObjectState::ReadObject => {
                let key = self
                    .pending_key
                    .take()
                    .ok_or(UnexpectedState::KeyOutOfPlace)?;
                let key_bytes = key.as_bytes().ok_or(UnexpectedState::KindMismatch)?;
                let object = self
                    .value
                    .as_object_mut()
                    .map_err(|_| UnexpectedState::KindMismatch)?;
                // TODO: reject a repeated key when allow_duplicate_keys is off;
                // today the last value wins either way.
                object.set(key_bytes, child)?;
                self.members += 1;
                Ok(())
            }
            _ => Err(UnexpectedState::KeyOutOfPlace.into()),
        }
    }
}
