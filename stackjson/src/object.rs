// SPDX-License-Identifier: Apache-2.0

//! Fixed-bucket hashed storage backing object values.
//!
//! The bucket count is chosen at creation and never changes. Each bucket is
//! a chain of entries in insertion order; iteration walks the buckets in
//! index order and each chain front to back.

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::allocator::{Alloc, Reservation};
use crate::{Error, Value};

/// Buckets per object when none is requested.
pub const DEFAULT_BUCKET_COUNT: usize = 64;

struct Entry {
    key: Box<[u8]>,
    value: Value,
    _mem: Reservation,
}

/// Map from byte-string keys to owned values.
pub struct HashedObject {
    buckets: Box<[Vec<Entry>]>,
    len: usize,
    alloc: Alloc,
    _table: Reservation,
}

/// Bytes shifted into the register before it is folded into the hash.
///
/// Wide enough to cover every bit of a bucket index.
fn window_bytes(bucket_count: usize) -> usize {
    let bits = match bucket_count {
        0 | 1 => 0,
        n => (usize::BITS - (n - 1).leading_zeros()) as usize,
    };
    bits.div_ceil(8).max(1)
}

/// Bucket index for `key`.
pub(crate) fn bucket_for(key: &[u8], bucket_count: usize) -> usize {
    let window = window_bytes(bucket_count);
    let mut hash: u64 = 0;
    let mut register: u64 = 0;
    let mut filled = 0;
    for &byte in key {
        register = (register << 8) | u64::from(byte);
        filled += 1;
        if filled == window {
            hash ^= register;
            register = 0;
            filled = 0;
        }
    }
    hash ^= register;
    (hash % bucket_count as u64) as usize
}

impl HashedObject {
    pub(crate) fn new(bucket_count: usize, alloc: Alloc) -> Result<Self, Error> {
        if bucket_count == 0 {
            return Err(Error::InvalidParam);
        }
        let table = alloc.reserve(bucket_count * core::mem::size_of::<Vec<Entry>>())?;
        let mut buckets = Vec::new();
        buckets
            .try_reserve_exact(bucket_count)
            .map_err(|_| Error::OutOfMemory)?;
        buckets.resize_with(bucket_count, Vec::new);
        Ok(Self {
            buckets: buckets.into_boxed_slice(),
            len: 0,
            alloc,
            _table: table,
        })
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn bucket_index(&self, key: &[u8]) -> usize {
        bucket_for(key, self.buckets.len())
    }

    fn find(&self, key: &[u8]) -> Option<&Entry> {
        self.buckets[self.bucket_index(key)]
            .iter()
            .find(|entry| *entry.key == *key)
    }

    /// Insert, overwrite or delete.
    ///
    /// With a value, an existing key keeps its key storage and has its old
    /// value released; a new key is appended to its bucket chain. With
    /// `None` the entry is unlinked and released; a missing key is not an
    /// error.
    pub fn set<V: Into<Option<Value>>>(&mut self, key: &[u8], value: V) -> Result<(), Error> {
        match value.into() {
            Some(value) => self.insert(key, value),
            None => {
                self.remove(key);
                Ok(())
            }
        }
    }

    fn insert(&mut self, key: &[u8], value: Value) -> Result<(), Error> {
        let index = self.bucket_index(key);
        let chain = &mut self.buckets[index];
        if let Some(entry) = chain.iter_mut().find(|entry| *entry.key == *key) {
            entry.value = value;
            return Ok(());
        }
        let mem = self
            .alloc
            .reserve(core::mem::size_of::<Entry>() + key.len())?;
        chain.try_reserve(1).map_err(|_| Error::OutOfMemory)?;
        chain.push(Entry {
            key: key.into(),
            value,
            _mem: mem,
        });
        self.len += 1;
        Ok(())
    }

    /// Unlink `key` and hand its value back.
    pub fn remove(&mut self, key: &[u8]) -> Option<Value> {
        let index = self.bucket_index(key);
        let chain = &mut self.buckets[index];
        let position = chain.iter().position(|entry| *entry.key == *key)?;
        let entry = chain.remove(position);
        self.len -= 1;
        Some(entry.value)
    }

    /// Value stored under `key`, or [`Error::IndexOutOfBounds`].
    pub fn get(&self, key: &[u8]) -> Result<&Value, Error> {
        self.find(key)
            .map(|entry| &entry.value)
            .ok_or(Error::IndexOutOfBounds)
    }

    pub fn get_mut(&mut self, key: &[u8]) -> Result<&mut Value, Error> {
        let index = self.bucket_index(key);
        self.buckets[index]
            .iter_mut()
            .find(|entry| *entry.key == *key)
            .map(|entry| &mut entry.value)
            .ok_or(Error::IndexOutOfBounds)
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.find(key).is_some()
    }

    /// Visit every entry in bucket order. The first `Err` from the callback
    /// stops the walk and is returned.
    pub fn iterate<E, F>(&self, mut callback: F) -> Result<(), E>
    where
        F: FnMut(&[u8], &Value) -> Result<(), E>,
    {
        for (key, value) in self.iter() {
            callback(key, value)?;
        }
        Ok(())
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter {
            buckets: self.buckets.iter(),
            chain: <&[Entry]>::default().iter(),
        }
    }

    /// Move every value into `out`, leaving the object empty.
    pub(crate) fn drain_into(&mut self, out: &mut Vec<Value>) {
        for chain in self.buckets.iter_mut() {
            out.extend(chain.drain(..).map(|entry| entry.value));
        }
        self.len = 0;
    }
}

impl core::fmt::Debug for HashedObject {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map()
            .entries(
                self.iter()
                    .map(|(key, value)| (alloc::string::String::from_utf8_lossy(key), value)),
            )
            .finish()
    }
}

/// Iterator over `(key, value)` pairs in bucket order.
pub struct Iter<'a> {
    buckets: core::slice::Iter<'a, Vec<Entry>>,
    chain: core::slice::Iter<'a, Entry>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a [u8], &'a Value);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.chain.next() {
                return Some((&*entry.key, &entry.value));
            }
            self.chain = self.buckets.next()?.iter();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Number;
    use test_log::test;

    fn number(v: u64) -> Value {
        let mut value = Value::new_number(&Alloc::system()).unwrap();
        value.set_unsigned(v).unwrap();
        value
    }

    fn object(buckets: usize) -> HashedObject {
        HashedObject::new(buckets, Alloc::system()).unwrap()
    }

    #[test]
    fn test_window_width_follows_bucket_count() {
        assert_eq!(window_bytes(1), 1);
        assert_eq!(window_bytes(64), 1);
        assert_eq!(window_bytes(256), 1);
        assert_eq!(window_bytes(257), 2);
        assert_eq!(window_bytes(1000), 2);
        assert_eq!(window_bytes(1 << 20), 3);
    }

    #[test]
    fn test_hash_is_deterministic() {
        assert_eq!(bucket_for(b"a", 64), 0x61 % 64);
        assert_eq!(bucket_for(b"ab", 64), 0x61 ^ 0x62);
        // Two-byte windows: 0x6162 folded with the trailing 0x63
        assert_eq!(bucket_for(b"abc", 1000), (0x6162 ^ 0x63) % 1000);
        assert_eq!(bucket_for(b"", 64), 0);
        assert_eq!(bucket_for(b"anything", 1), 0);
    }

    #[test]
    fn test_overwrite_keeps_single_entry() {
        let mut obj = object(DEFAULT_BUCKET_COUNT);
        obj.set(b"key", number(1)).unwrap();
        obj.set(b"key", number(2)).unwrap();
        assert_eq!(obj.len(), 1);
        assert_eq!(obj.get(b"key").unwrap().number(), Some(Number::Unsigned(2)));
        assert_eq!(obj.iter().count(), 1);
    }

    #[test]
    fn test_delete_with_absent_value() {
        let mut obj = object(DEFAULT_BUCKET_COUNT);
        obj.set(b"gone", number(1)).unwrap();
        obj.set(b"gone", None).unwrap();
        assert!(!obj.contains_key(b"gone"));
        assert_eq!(obj.get(b"gone").unwrap_err(), Error::IndexOutOfBounds);
        assert!(obj.is_empty());
        // Deleting again is a no-op
        obj.set(b"gone", None).unwrap();
    }

    #[test]
    fn test_chain_keeps_insertion_order() {
        let mut obj = object(1);
        for (i, key) in [b"x", b"y", b"z", b"w"].into_iter().enumerate() {
            obj.set(key, number(i as u64)).unwrap();
        }
        obj.remove(b"y").unwrap();
        let keys: Vec<&[u8]> = obj.iter().map(|(key, _)| key).collect();
        let expected: [&[u8]; 3] = [b"x", b"z", b"w"];
        assert_eq!(keys, expected);
    }

    #[test]
    fn test_keys_compare_length_and_bytes() {
        let mut obj = object(1);
        obj.set(b"ab", number(1)).unwrap();
        obj.set(b"a", number(2)).unwrap();
        obj.set(b"", number(3)).unwrap();
        assert_eq!(obj.len(), 3);
        assert_eq!(obj.get(b"").unwrap().number(), Some(Number::Unsigned(3)));
    }

    #[test]
    fn test_iterate_walks_buckets_in_order() {
        let mut obj = object(64);
        obj.set(b"b", number(0)).unwrap(); // bucket 34
        obj.set(b"a", number(0)).unwrap(); // bucket 33
        obj.set(b"A", number(0)).unwrap(); // bucket 1
        let keys: Vec<&[u8]> = obj.iter().map(|(key, _)| key).collect();
        let expected: [&[u8]; 3] = [b"A", b"a", b"b"];
        assert_eq!(keys, expected);
    }

    #[test]
    fn test_iterate_abort_propagates() {
        let mut obj = object(8);
        for i in 0..5u8 {
            obj.set(&[b'k', i], number(u64::from(i))).unwrap();
        }
        let mut visited = 0;
        let result = obj.iterate(|_, _| {
            visited += 1;
            if visited == 2 {
                Err("stop")
            } else {
                Ok(())
            }
        });
        assert_eq!(result, Err("stop"));
        assert_eq!(visited, 2);
    }

    #[test]
    fn test_zero_buckets_rejected() {
        assert_eq!(
            HashedObject::new(0, Alloc::system()).unwrap_err(),
            Error::InvalidParam
        );
    }
}
