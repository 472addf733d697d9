// SPDX-License-Identifier: Apache-2.0

//! Incremental JSON parser and resumable serializer.
//!
//! Both directions run on explicit heap stacks of frames instead of native
//! recursion, so nesting depth never turns into call-stack depth:
//!
//! * [`Parser`] takes one byte at a time and hands each completed document
//!   to a [`DocumentHandler`] (or parks it for [`Parser::take_document`]).
//! * [`Serializer`] writes a [`Value`] to a [`WriteSink`] that may accept
//!   only part of what it is offered; [`Serializer::resume`] picks up at the
//!   next byte.
//!
//! Documents are trees of owned [`Value`]s. Arrays are stored in fixed-size
//! pages ([`PagedArray`]) and objects in a fixed-bucket hash table
//! ([`HashedObject`]). Every storage block is accounted to an [`Alloc`]
//! handle, which can wrap a custom [`Allocator`].
//!
//! ```
//! use stackjson::{Parser, ParserOptions, SerializerOptions};
//!
//! let mut parser = Parser::new(ParserOptions::default()).unwrap();
//! parser.write(br#"{"name": "\u00C4", "n": [1, -2, 2.5]}"#).unwrap();
//! parser.finish().unwrap();
//! let document = parser.take_document().unwrap();
//!
//! let name = document.as_object().unwrap().get(b"name").unwrap();
//! assert_eq!(name.as_str(), Some("\u{C4}"));
//!
//! let text = stackjson::to_vec(&document, SerializerOptions::default()).unwrap();
//! assert!(text.starts_with(b"{"));
//! ```

#![cfg_attr(not(test), no_std)]

extern crate alloc;

mod allocator;
pub use allocator::{Alloc, Allocator};

mod error;
pub use error::{Error, UnexpectedState};

mod escape;

mod number;
pub use number::Number;

mod array;
pub use array::{PagedArray, DEFAULT_PAGE_SIZE};

mod object;
pub use object::{HashedObject, DEFAULT_BUCKET_COUNT};

mod value;
pub use value::{release, Data, Value, ValueKind};

mod parser;
pub use parser::{DocumentHandler, NoHandler, Parser, ParserOptions, DEFAULT_STRING_CHUNK};

mod serializer;
pub use serializer::{to_vec, Progress, Serializer, SerializerOptions, WriteSink};

/// Iterators over container contents.
pub mod iter {
    pub use crate::array::Iter as ArrayIter;
    pub use crate::object::Iter as ObjectIter;
}
