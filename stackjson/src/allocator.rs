// SPDX-License-Identifier: Apache-2.0

//! Pluggable allocator capability.
//!
//! Storage itself always comes from the global allocator. An [`Allocator`]
//! is consulted before every storage block this crate creates and is told
//! the same size back when the block goes away, which is enough to enforce
//! budgets, pool accounting or leak checks from the outside.

use alloc::sync::Arc;

use crate::Error;

/// Capability consulted for every storage block.
///
/// `allocate` may refuse with [`Error::OutOfMemory`]; the refused request is
/// never followed by a matching `free`.
pub trait Allocator: Send + Sync {
    fn allocate(&self, size: usize) -> Result<(), Error>;
    fn free(&self, size: usize);
}

/// Cloneable handle to an allocator capability.
///
/// The default handle is the platform allocator with no accounting.
#[derive(Clone, Default)]
pub struct Alloc {
    custom: Option<Arc<dyn Allocator>>,
}

impl Alloc {
    /// The platform allocator.
    pub fn system() -> Self {
        Self::default()
    }

    pub fn new<A: Allocator + 'static>(allocator: A) -> Self {
        Self {
            custom: Some(Arc::new(allocator)),
        }
    }

    /// Share an allocator that the caller keeps a handle to.
    pub fn from_arc(allocator: Arc<dyn Allocator>) -> Self {
        Self {
            custom: Some(allocator),
        }
    }

    pub fn is_system(&self) -> bool {
        self.custom.is_none()
    }

    /// Ask for `size` bytes; the returned reservation hands them back on drop.
    pub(crate) fn reserve(&self, size: usize) -> Result<Reservation, Error> {
        if let Some(custom) = &self.custom {
            custom.allocate(size)?;
        }
        Ok(Reservation {
            alloc: self.clone(),
            size,
        })
    }
}

impl core::fmt::Debug for Alloc {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.custom {
            None => f.write_str("Alloc(system)"),
            Some(_) => f.write_str("Alloc(custom)"),
        }
    }
}

/// An accounted storage block. Dropping it frees the block.
pub(crate) struct Reservation {
    alloc: Alloc,
    size: usize,
}

impl Reservation {
    pub(crate) fn alloc(&self) -> &Alloc {
        &self.alloc
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if let Some(custom) = &self.alloc.custom {
            custom.free(self.size);
        }
    }
}

impl core::fmt::Debug for Reservation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Reservation({})", self.size)
    }
}
