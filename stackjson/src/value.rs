// SPDX-License-Identifier: Apache-2.0

//! The document value model.
//!
//! A [`Value`] exclusively owns its children. Dropping a value releases the
//! whole subtree through the allocator that created each node. Teardown and
//! comparison run on explicit worklists, so tree depth never turns into
//! native stack depth.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;

use crate::allocator::{Alloc, Reservation};
use crate::array::{PagedArray, DEFAULT_PAGE_SIZE};
use crate::object::{HashedObject, DEFAULT_BUCKET_COUNT};
use crate::{Error, Number};

/// Type tag of a value, with the numeric sub-kind spelled out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Object,
    Array,
    String,
    Unsigned,
    Signed,
    Double,
    True,
    False,
    Null,
}

/// Payload of a value.
#[derive(Debug)]
pub enum Data {
    Object(HashedObject),
    Array(PagedArray),
    String(Box<[u8]>),
    Number(Number),
    True,
    False,
    Null,
}

/// An owned JSON value.
pub struct Value {
    data: Data,
    mem: Reservation,
}

impl Value {
    fn with_data(data: Data, extra: usize, alloc: &Alloc) -> Result<Self, Error> {
        let mem = alloc.reserve(core::mem::size_of::<Value>() + extra)?;
        Ok(Self { data, mem })
    }

    pub fn new_object(alloc: &Alloc) -> Result<Self, Error> {
        Self::new_object_with_buckets(DEFAULT_BUCKET_COUNT, alloc)
    }

    /// Object with a fixed number of hash buckets. Zero is
    /// [`Error::InvalidParam`].
    pub fn new_object_with_buckets(bucket_count: usize, alloc: &Alloc) -> Result<Self, Error> {
        let object = HashedObject::new(bucket_count, alloc.clone())?;
        Self::with_data(Data::Object(object), 0, alloc)
    }

    pub fn new_array(alloc: &Alloc) -> Result<Self, Error> {
        Self::new_array_with_page_size(DEFAULT_PAGE_SIZE, alloc)
    }

    pub fn new_array_with_page_size(page_size: usize, alloc: &Alloc) -> Result<Self, Error> {
        let array = PagedArray::new(page_size, alloc.clone())?;
        Self::with_data(Data::Array(array), 0, alloc)
    }

    /// Immutable string holding a copy of `bytes`.
    pub fn new_string(bytes: &[u8], alloc: &Alloc) -> Result<Self, Error> {
        Self::with_data(Data::String(bytes.into()), bytes.len(), alloc)
    }

    /// Take over an already built byte buffer as a string value.
    pub(crate) fn from_string_bytes(bytes: Box<[u8]>, alloc: &Alloc) -> Result<Self, Error> {
        let len = bytes.len();
        Self::with_data(Data::String(bytes), len, alloc)
    }

    /// Number holding unsigned zero.
    pub fn new_number(alloc: &Alloc) -> Result<Self, Error> {
        Self::from_number(Number::default(), alloc)
    }

    pub fn from_number(number: Number, alloc: &Alloc) -> Result<Self, Error> {
        Self::with_data(Data::Number(number), 0, alloc)
    }

    pub fn new_true(alloc: &Alloc) -> Result<Self, Error> {
        Self::with_data(Data::True, 0, alloc)
    }

    pub fn new_false(alloc: &Alloc) -> Result<Self, Error> {
        Self::with_data(Data::False, 0, alloc)
    }

    pub fn new_boolean(value: bool, alloc: &Alloc) -> Result<Self, Error> {
        if value {
            Self::new_true(alloc)
        } else {
            Self::new_false(alloc)
        }
    }

    pub fn new_null(alloc: &Alloc) -> Result<Self, Error> {
        Self::with_data(Data::Null, 0, alloc)
    }

    pub fn kind(&self) -> ValueKind {
        match &self.data {
            Data::Object(_) => ValueKind::Object,
            Data::Array(_) => ValueKind::Array,
            Data::String(_) => ValueKind::String,
            Data::Number(Number::Unsigned(_)) => ValueKind::Unsigned,
            Data::Number(Number::Signed(_)) => ValueKind::Signed,
            Data::Number(Number::Double(_)) => ValueKind::Double,
            Data::True => ValueKind::True,
            Data::False => ValueKind::False,
            Data::Null => ValueKind::Null,
        }
    }

    pub fn data(&self) -> &Data {
        &self.data
    }

    /// The allocator this value was created with.
    pub fn alloc(&self) -> &Alloc {
        self.mem.alloc()
    }

    pub fn is_null(&self) -> bool {
        matches!(self.data, Data::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.data {
            Data::True => Some(true),
            Data::False => Some(false),
            _ => None,
        }
    }

    /// Switch a boolean between true and false.
    pub fn set_boolean(&mut self, value: bool) -> Result<(), Error> {
        match self.data {
            Data::True | Data::False => {
                self.data = if value { Data::True } else { Data::False };
                Ok(())
            }
            _ => Err(Error::InvalidParam),
        }
    }

    pub fn number(&self) -> Option<Number> {
        match self.data {
            Data::Number(number) => Some(number),
            _ => None,
        }
    }

    fn set_number(&mut self, number: Number) -> Result<(), Error> {
        match &mut self.data {
            Data::Number(slot) => {
                *slot = number;
                Ok(())
            }
            _ => Err(Error::InvalidParam),
        }
    }

    pub fn set_unsigned(&mut self, value: u64) -> Result<(), Error> {
        self.set_number(Number::Unsigned(value))
    }

    pub fn set_signed(&mut self, value: i64) -> Result<(), Error> {
        self.set_number(Number::Signed(value))
    }

    pub fn set_double(&mut self, value: f64) -> Result<(), Error> {
        self.set_number(Number::Double(value))
    }

    /// Numeric value cast to `u64`; 0 for non-numbers.
    pub fn as_u64(&self) -> u64 {
        self.number().map_or(0, Number::as_u64)
    }

    /// Numeric value cast to `i64`; 0 for non-numbers.
    pub fn as_i64(&self) -> i64 {
        self.number().map_or(0, Number::as_i64)
    }

    /// Numeric value cast to `f64`; 0.0 for non-numbers.
    pub fn as_f64(&self) -> f64 {
        self.number().map_or(0.0, Number::as_f64)
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match &self.data {
            Data::String(bytes) => Some(&bytes[..]),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes()
            .and_then(|bytes| core::str::from_utf8(bytes).ok())
    }

    /// Byte length of a string; 0 for other kinds.
    pub fn string_len(&self) -> usize {
        self.as_bytes().map_or(0, <[u8]>::len)
    }

    pub fn as_array(&self) -> Result<&PagedArray, Error> {
        match &self.data {
            Data::Array(array) => Ok(array),
            _ => Err(Error::InvalidParam),
        }
    }

    pub fn as_array_mut(&mut self) -> Result<&mut PagedArray, Error> {
        match &mut self.data {
            Data::Array(array) => Ok(array),
            _ => Err(Error::InvalidParam),
        }
    }

    pub fn as_object(&self) -> Result<&HashedObject, Error> {
        match &self.data {
            Data::Object(object) => Ok(object),
            _ => Err(Error::InvalidParam),
        }
    }

    pub fn as_object_mut(&mut self) -> Result<&mut HashedObject, Error> {
        match &mut self.data {
            Data::Object(object) => Ok(object),
            _ => Err(Error::InvalidParam),
        }
    }

    /// Release this value and everything it owns.
    pub fn release(self) {
        drop(self)
    }

    fn take_children(&mut self, out: &mut Vec<Value>) {
        match &mut self.data {
            Data::Array(array) => array.drain_into(out),
            Data::Object(object) => object.drain_into(out),
            _ => {}
        }
    }
}

/// Release an optional value; `None` is a no-op.
pub fn release(value: Option<Value>) {
    drop(value)
}

impl Drop for Value {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.take_children(&mut pending);
        while let Some(mut child) = pending.pop() {
            child.take_children(&mut pending);
            // child now owns no subtree, so dropping it cannot recurse
        }
    }
}

/// Pieces of `Debug` output still to be written, popped from the back.
enum DebugToken<'a> {
    Value(&'a Value),
    Key(&'a [u8]),
    Text(&'static str),
}

impl core::fmt::Debug for Value {
    /// Writes arrays as `[..]` and objects as `{"key": ..}` on an explicit
    /// worklist, so deep documents format without deep native stacks.
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut pending = Vec::new();
        pending.push(DebugToken::Value(self));
        while let Some(token) = pending.pop() {
            let value = match token {
                DebugToken::Text(text) => {
                    f.write_str(text)?;
                    continue;
                }
                DebugToken::Key(key) => {
                    write!(f, "{:?}: ", String::from_utf8_lossy(key))?;
                    continue;
                }
                DebugToken::Value(value) => value,
            };
            match &value.data {
                Data::Array(array) => {
                    f.write_str("[")?;
                    pending.push(DebugToken::Text("]"));
                    let mark = pending.len();
                    for (index, slot) in array.iter().enumerate() {
                        if index > 0 {
                            pending.push(DebugToken::Text(", "));
                        }
                        pending.push(match slot {
                            Some(child) => DebugToken::Value(child),
                            None => DebugToken::Text("null"),
                        });
                    }
                    pending[mark..].reverse();
                }
                Data::Object(object) => {
                    f.write_str("{")?;
                    pending.push(DebugToken::Text("}"));
                    let mark = pending.len();
                    for (index, (key, child)) in object.iter().enumerate() {
                        if index > 0 {
                            pending.push(DebugToken::Text(", "));
                        }
                        pending.push(DebugToken::Key(key));
                        pending.push(DebugToken::Value(child));
                    }
                    pending[mark..].reverse();
                }
                Data::String(bytes) => write!(f, "{:?}", String::from_utf8_lossy(bytes))?,
                Data::Number(number) => write!(f, "{number:?}")?,
                Data::True => f.write_str("true")?,
                Data::False => f.write_str("false")?,
                Data::Null => f.write_str("null")?,
            }
        }
        Ok(())
    }
}

impl PartialEq for Value {
    /// Structural equality. Object key order does not matter; numeric
    /// sub-kinds must match exactly.
    fn eq(&self, other: &Self) -> bool {
        let mut pending: Vec<(&Value, &Value)> = Vec::new();
        pending.push((self, other));
        while let Some((left, right)) = pending.pop() {
            match (&left.data, &right.data) {
                (Data::Object(a), Data::Object(b)) => {
                    if a.len() != b.len() {
                        return false;
                    }
                    for (key, value) in a.iter() {
                        match b.get(key) {
                            Ok(other_value) => pending.push((value, other_value)),
                            Err(_) => return false,
                        }
                    }
                }
                (Data::Array(a), Data::Array(b)) => {
                    if a.len() != b.len() {
                        return false;
                    }
                    for pair in a.iter().zip(b.iter()) {
                        match pair {
                            (Some(x), Some(y)) => pending.push((x, y)),
                            (None, None) => {}
                            _ => return false,
                        }
                    }
                }
                (Data::String(a), Data::String(b)) => {
                    if a != b {
                        return false;
                    }
                }
                (Data::Number(a), Data::Number(b)) => {
                    if a != b {
                        return false;
                    }
                }
                (Data::True, Data::True) | (Data::False, Data::False) | (Data::Null, Data::Null) => {}
                _ => return false,
            }
        }
        true
    }
}
