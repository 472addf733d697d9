// SPDX-License-Identifier: Apache-2.0

//! Paged array storage backing array values.
//!
//! Elements live in a chain of fixed-capacity pages. Appending fills the
//! tail page and opens a new one when it is full, so every page except the
//! last is always full. Index lookups walk the chain from the head.

use alloc::vec::Vec;

use crate::allocator::{Alloc, Reservation};
use crate::{Error, Value};

/// Slots per page when none is requested.
pub const DEFAULT_PAGE_SIZE: usize = 64;

struct Page {
    slots: Vec<Option<Value>>,
    _mem: Reservation,
}

/// Ordered sequence of owned values.
///
/// A slot may be empty (`None`); that is valid content and serializes as
/// `null`.
pub struct PagedArray {
    pages: Vec<Page>,
    len: usize,
    page_size: usize,
    alloc: Alloc,
}

impl PagedArray {
    pub(crate) fn new(page_size: usize, alloc: Alloc) -> Result<Self, Error> {
        if page_size == 0 {
            return Err(Error::InvalidParam);
        }
        Ok(Self {
            pages: Vec::new(),
            len: 0,
            page_size,
            alloc,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Translate an index into (page, offset) by walking the page chain.
    fn locate(&self, index: usize) -> Option<(usize, usize)> {
        let mut remaining = index;
        for (page_index, page) in self.pages.iter().enumerate() {
            if remaining < page.slots.len() {
                return Some((page_index, remaining));
            }
            remaining -= page.slots.len();
        }
        None
    }

    /// Element at `index`; `Ok(None)` is an empty slot.
    pub fn get(&self, index: usize) -> Result<Option<&Value>, Error> {
        let (page, offset) = self.locate(index).ok_or(Error::IndexOutOfBounds)?;
        Ok(self.pages[page].slots[offset].as_ref())
    }

    pub fn get_mut(&mut self, index: usize) -> Result<Option<&mut Value>, Error> {
        let (page, offset) = self.locate(index).ok_or(Error::IndexOutOfBounds)?;
        Ok(self.pages[page].slots[offset].as_mut())
    }

    /// Replace the element at `index`. The previous occupant is released
    /// before the new value is stored.
    pub fn set<V: Into<Option<Value>>>(&mut self, index: usize, value: V) -> Result<(), Error> {
        let (page, offset) = self.locate(index).ok_or(Error::IndexOutOfBounds)?;
        let slot = &mut self.pages[page].slots[offset];
        drop(slot.take());
        *slot = value.into();
        Ok(())
    }

    /// Append at the tail, opening a new page when the tail page is full.
    pub fn push<V: Into<Option<Value>>>(&mut self, value: V) -> Result<(), Error> {
        let tail_full = self
            .pages
            .last()
            .map_or(true, |page| page.slots.len() == self.page_size);
        if tail_full {
            self.open_page()?;
        }
        // open_page guarantees a tail page with room
        if let Some(page) = self.pages.last_mut() {
            page.slots.push(value.into());
            self.len += 1;
        }
        Ok(())
    }

    fn open_page(&mut self) -> Result<(), Error> {
        let bytes = core::mem::size_of::<Page>()
            + self.page_size * core::mem::size_of::<Option<Value>>();
        let mem = self.alloc.reserve(bytes)?;
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(self.page_size)
            .map_err(|_| Error::OutOfMemory)?;
        self.pages
            .try_reserve(1)
            .map_err(|_| Error::OutOfMemory)?;
        log::trace!("array: page {} opened", self.pages.len());
        self.pages.push(Page { slots, _mem: mem });
        Ok(())
    }

    /// Visit elements in order. The first `Err` from the callback stops the
    /// walk and is returned.
    pub fn iterate<E, F>(&self, mut callback: F) -> Result<(), E>
    where
        F: FnMut(usize, Option<&Value>) -> Result<(), E>,
    {
        for (index, element) in self.iter().enumerate() {
            callback(index, element)?;
        }
        Ok(())
    }

    pub fn iter(&self) -> Iter<'_> {
        let mut pages = self.pages.iter();
        let slots = match pages.next() {
            Some(page) => page.slots.iter(),
            None => <&[Option<Value>]>::default().iter(),
        };
        Iter { pages, slots }
    }

    /// Move every owned element into `out`, leaving the array empty.
    pub(crate) fn drain_into(&mut self, out: &mut Vec<Value>) {
        for page in self.pages.drain(..) {
            out.extend(page.slots.into_iter().flatten());
        }
        self.len = 0;
    }
}

impl core::fmt::Debug for PagedArray {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// In-order iterator over array slots.
pub struct Iter<'a> {
    pages: core::slice::Iter<'a, Page>,
    slots: core::slice::Iter<'a, Option<Value>>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = Option<&'a Value>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(slot) = self.slots.next() {
                return Some(slot.as_ref());
            }
            self.slots = self.pages.next()?.slots.iter();
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

    fn small_array(page_size: usize) -> PagedArray {
        PagedArray::new(page_size, Alloc::system()).unwrap()
    }

    #[test]
    fn test_push_spills_into_new_pages() {
        let mut array = small_array(4);
        for i in 0..10 {
            array.push(number(i)).unwrap();
        }
        assert_eq!(array.len(), 10);
        assert_eq!(array.page_count(), 3);
        for i in 0..10 {
            let element = array.get(i as usize).unwrap().unwrap();
            assert_eq!(element.number(), Some(Number::Unsigned(i)));
        }
    }

    #[test]
    fn test_out_of_range_has_no_side_effects() {
        let mut array = small_array(4);
        array.push(number(1)).unwrap();
        assert_eq!(array.get(1).unwrap_err(), Error::IndexOutOfBounds);
        assert_eq!(array.set(1, number(2)).unwrap_err(), Error::IndexOutOfBounds);
        assert_eq!(array.len(), 1);
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut array = small_array(2);
        for i in 0..5 {
            array.push(number(i)).unwrap();
        }
        array.set(3, number(30)).unwrap();
        let collected: Vec<u64> = array
            .iter()
            .map(|v| v.and_then(Value::number).map_or(0, |n| n.as_u64()))
            .collect();
        assert_eq!(collected, [0, 1, 2, 30, 4]);
    }

    #[test]
    fn test_empty_slots_are_content() {
        let mut array = small_array(2);
        array.push(None).unwrap();
        array.push(number(5)).unwrap();
        assert_eq!(array.len(), 2);
        assert!(array.get(0).unwrap().is_none());
        array.set(1, None).unwrap();
        assert!(array.get(1).unwrap().is_none());
    }

    #[test]
    fn test_iterate_empty_never_calls_back() {
        let array = small_array(8);
        let mut calls = 0;
        array
            .iterate(|_, _| -> Result<(), Error> {
                calls += 1;
                Ok(())
            })
            .unwrap();
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_iterate_abort_propagates() {
        let mut array = small_array(3);
        for i in 0..7 {
            array.push(number(i)).unwrap();
        }
        let mut seen = Vec::new();
        let result = array.iterate(|index, _| {
            seen.push(index);
            if index == 4 {
                Err(Error::Finished)
            } else {
                Ok(())
            }
        });
        assert_eq!(result, Err(Error::Finished));
        assert_eq!(seen, [0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_zero_page_size_rejected() {
        assert_eq!(
            PagedArray::new(0, Alloc::system()).unwrap_err(),
            Error::InvalidParam
        );
    }
}
