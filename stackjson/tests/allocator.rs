// SPDX-License-Identifier: Apache-2.0

// Every accounted byte must come back, whichever way a document, parser or
// serializer goes away.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use stackjson::{
    Alloc, Allocator, Error, Parser, ParserOptions, Progress, Serializer, SerializerOptions,
    Value, WriteSink,
};
use test_log::test;

/// Tracks live bytes and blocks, refusing anything past `limit`.
struct Counter {
    live: AtomicUsize,
    blocks: AtomicUsize,
    limit: usize,
}

impl Counter {
    fn new() -> Arc<Self> {
        Self::with_limit(usize::MAX)
    }

    fn with_limit(limit: usize) -> Arc<Self> {
        Arc::new(Self {
            live: AtomicUsize::new(0),
            blocks: AtomicUsize::new(0),
            limit,
        })
    }

    fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    fn blocks(&self) -> usize {
        self.blocks.load(Ordering::SeqCst)
    }
}

impl Allocator for Counter {
    fn allocate(&self, size: usize) -> Result<(), Error> {
        let live = self.live.load(Ordering::SeqCst);
        if live.saturating_add(size) > self.limit {
            return Err(Error::OutOfMemory);
        }
        self.live.fetch_add(size, Ordering::SeqCst);
        self.blocks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn free(&self, size: usize) {
        let before = self.live.fetch_sub(size, Ordering::SeqCst);
        assert!(before >= size, "freed {size} bytes with only {before} live");
        let blocks = self.blocks.fetch_sub(1, Ordering::SeqCst);
        assert!(blocks > 0, "freed more blocks than allocated");
    }
}

const DOCUMENT: &[u8] = br#"{"name":"counter","list":[1,-2,3.5,true,null,[],{}],"nested":{"a":{"b":["x","y"]}}}"#;

fn parse_with(alloc: &Alloc, input: &[u8]) -> Result<Value, Error> {
    let mut parser = Parser::with_alloc(ParserOptions::default(), alloc.clone())?;
    parser.write(input)?;
    parser.finish()?;
    parser.take_document().ok_or(Error::EncodingError)
}

#[test]
fn test_document_returns_everything() {
    let counter = Counter::new();
    let alloc = Alloc::from_arc(counter.clone());
    let document = parse_with(&alloc, DOCUMENT).unwrap();
    assert!(counter.live() > 0);
    assert!(counter.blocks() > 10);
    drop(document);
    assert_eq!(counter.live(), 0);
    assert_eq!(counter.blocks(), 0);
}

#[test]
fn test_parser_keeps_nothing_after_delivery() {
    let counter = Counter::new();
    let alloc = Alloc::from_arc(counter.clone());
    let mut parser = Parser::with_alloc(ParserOptions::default(), alloc).unwrap();
    parser.write(DOCUMENT).unwrap();
    let document = parser.take_document().unwrap();
    let held = counter.live();
    drop(parser);
    assert_eq!(counter.live(), held);
    drop(document);
    assert_eq!(counter.live(), 0);
}

#[test]
fn test_parser_dropped_mid_document() {
    let counter = Counter::new();
    let alloc = Alloc::from_arc(counter.clone());
    for cut in 1..DOCUMENT.len() {
        let mut parser = Parser::with_alloc(ParserOptions::default(), alloc.clone()).unwrap();
        parser.write(&DOCUMENT[..cut]).unwrap();
        drop(parser);
        assert_eq!(counter.live(), 0, "leak after {cut} bytes");
    }
}

#[test]
fn test_parser_dropped_after_error() {
    let counter = Counter::new();
    let alloc = Alloc::from_arc(counter.clone());
    let mut parser = Parser::with_alloc(ParserOptions::default(), alloc).unwrap();
    assert_eq!(
        parser.write(br#"{"a":[1,{"b":"c"},"#),
        Ok(())
    );
    assert_eq!(parser.write(b"]"), Err(Error::EncodingError));
    assert!(counter.live() > 0);
    drop(parser);
    assert_eq!(counter.live(), 0);
}

#[test]
fn test_streaming_documents_released_by_handler() {
    let counter = Counter::new();
    let alloc = Alloc::from_arc(counter.clone());
    let mut count = 0;
    let handler = |document: Value| {
        count += 1;
        drop(document);
        Ok::<(), Error>(())
    };
    let mut parser =
        Parser::with_handler_and_alloc(ParserOptions::streaming(), handler, alloc).unwrap();
    for _ in 0..5 {
        parser.write(DOCUMENT).unwrap();
        parser.write(b"\n").unwrap();
    }
    assert_eq!(counter.live(), 0);
    drop(parser);
    assert_eq!(count, 5);
}

#[test]
fn test_budget_exhaustion_is_out_of_memory() {
    let counter = Counter::with_limit(4096);
    let alloc = Alloc::from_arc(counter.clone());
    let mut parser = Parser::with_alloc(ParserOptions::default(), alloc).unwrap();
    let mut input = b"[".to_vec();
    for _ in 0..200 {
        input.extend_from_slice(br#""abcdefgh","#);
    }
    input.extend_from_slice(b"null]");
    assert_eq!(parser.write(&input), Err(Error::OutOfMemory));
    // Halted, not poisoned beyond the error
    assert_eq!(parser.finish(), Err(Error::OutOfMemory));
    assert!(counter.live() <= 4096);
    drop(parser);
    assert_eq!(counter.live(), 0);
}

#[test]
fn test_value_edits_balance() {
    let counter = Counter::new();
    let alloc = Alloc::from_arc(counter.clone());
    {
        let mut root = Value::new_object_with_buckets(4, &alloc).unwrap();
        let object = root.as_object_mut().unwrap();
        for key in [b"a", b"b", b"c", b"d", b"e"] {
            object.set(key, Value::new_string(key, &alloc).unwrap()).unwrap();
        }
        object.set(b"a", Value::new_array(&alloc).unwrap()).unwrap();
        object.set(b"b", None).unwrap();
        let removed = object.remove(b"c");
        assert!(removed.is_some());
        drop(removed);
        let list = object.get_mut(b"a").unwrap().as_array_mut().unwrap();
        for n in 0..100u64 {
            list.push(Value::from_number(n.into(), &alloc).unwrap()).unwrap();
        }
        list.set(3, None).unwrap();
        assert!(counter.live() > 0);
    }
    assert_eq!(counter.live(), 0);
    assert_eq!(counter.blocks(), 0);
}

#[test]
fn test_suspended_serializer_dropped() {
    struct Slow(usize);
    impl WriteSink for Slow {
        fn write_bytes(&mut self, data: &[u8]) -> Result<usize, Error> {
            let taken = data.len().min(1);
            self.0 += taken;
            Ok(taken)
        }
    }
    let counter = Counter::new();
    let alloc = Alloc::from_arc(counter.clone());
    let document = parse_with(&Alloc::system(), DOCUMENT).unwrap();
    let mut serializer = Serializer::with_alloc(Slow(0), SerializerOptions::default(), alloc);
    assert_eq!(serializer.serialize(&document), Ok(Progress::Pending));
    for _ in 0..20 {
        assert_eq!(serializer.resume(), Ok(Progress::Pending));
    }
    assert!(counter.live() > 0);
    drop(serializer);
    assert_eq!(counter.live(), 0);
}

#[test]
fn test_serializer_frames_refused() {
    let counter = Counter::with_limit(0);
    let alloc = Alloc::from_arc(counter.clone());
    let document = parse_with(&Alloc::system(), b"[1]").unwrap();
    let mut serializer = Serializer::with_alloc(Vec::new(), SerializerOptions::default(), alloc);
    assert_eq!(serializer.serialize(&document), Err(Error::OutOfMemory));
    assert!(serializer.sink().is_empty());
    assert_eq!(counter.live(), 0);
}
