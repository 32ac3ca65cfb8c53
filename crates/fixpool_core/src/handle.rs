//! # Slot Handles
//!
//! A [`SlotHandle`] names one slot of one arena during one reset epoch. It is
//! the only way to reach slot memory, so out-of-arena or mid-slot addresses
//! cannot be expressed at all; the remaining mistakes (wrong arena, handle
//! kept across a reset) are caught by comparing the handle's tags.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// Identifies an arena instance for the lifetime of the process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ArenaId(u32);

impl ArenaId {
    /// Allocates a fresh id.
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU32 = AtomicU32::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw id value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

/// Handle to a live slot.
///
/// Handles are `Copy`; the arena, not the type system, tracks whether the
/// slot is still live. Freeing a copy twice is a double free.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[must_use]
pub struct SlotHandle {
    arena: ArenaId,
    epoch: u32,
    index: usize,
}

impl SlotHandle {
    #[inline]
    pub(crate) const fn new(arena: ArenaId, epoch: u32, index: usize) -> Self {
        Self {
            arena,
            epoch,
            index,
        }
    }

    /// Slot index within the arena.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.index
    }

    /// Arena that issued the handle.
    #[inline]
    #[must_use]
    pub const fn arena(self) -> ArenaId {
        self.arena
    }

    /// Reset epoch the handle was issued in.
    #[inline]
    #[must_use]
    pub const fn epoch(self) -> u32 {
        self.epoch
    }
}

impl fmt::Display for SlotHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SlotHandle(arena={}, epoch={}, slot={})",
            self.arena.0, self.epoch, self.index
        )
    }
}
