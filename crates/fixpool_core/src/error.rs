//! # Arena Error Types
//!
//! Two tiers:
//!
//! - [`ArenaError`] variants other than `Fault` are ordinary, recoverable
//!   results. The caller decides what to do.
//! - [`Fault`] is fatal. Every fault is reported through the arena's
//!   [`FaultHook`](crate::FaultHook) before it is returned, and the arena is
//!   poisoned until it is reset.

use thiserror::Error;

/// Why a slot handle was rejected.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleMismatch {
    /// The handle was issued by a different arena.
    #[error("handle was issued by another arena")]
    ForeignArena,
    /// The handle was issued before the arena's last reset.
    #[error("handle predates the last reset")]
    StaleEpoch,
    /// The slot index lies outside the arena.
    #[error("slot index is out of range")]
    OutOfRange,
    /// The slot has not been handed out since the last reset.
    #[error("slot was never handed out")]
    Unissued,
}

/// A specific kind of damage found in the arena's bookkeeping.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corruption {
    /// The sentinel of a free slot was overwritten while the slot sat in the
    /// free list. Usually a write through a dangling handle.
    #[error("sentinel of free slot {index} was overwritten (found {found:#018x})")]
    SentinelMismatch {
        /// The free slot whose sentinel was damaged.
        index: usize,
        /// The value found where the sentinel should be.
        found: u64,
    },
    /// A free slot links to a slot outside the arena.
    #[error("free slot {index} links to out-of-range slot {link}")]
    LinkOutOfRange {
        /// The free slot holding the bad link.
        index: usize,
        /// The decoded link target.
        link: usize,
    },
    /// A bounded traversal ran past `count` entries.
    #[error("free list runs past {count} entries and must be cyclic")]
    Cycle {
        /// Slot count of the arena (the traversal bound).
        count: usize,
    },
    /// The free list ends at a different length than recorded.
    #[error("free list holds {found} entries, expected {expected}")]
    LengthMismatch {
        /// Recorded number of free-listed slots.
        expected: usize,
        /// Number of slots actually reachable.
        found: usize,
    },
    /// The header at the front of the arena memory was overwritten.
    #[error("arena header was overwritten")]
    HeaderClobbered,
}

/// Fatal conditions. The arena state is undefined once one is raised.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Freed a handle that does not belong to this arena's live slots.
    #[error("invalid free of slot {index}: {reason}")]
    InvalidFree {
        /// Slot index carried by the handle.
        index: usize,
        /// Why the handle was rejected.
        reason: HandleMismatch,
    },
    /// Freed a slot that is already free.
    #[error("double free of slot {index}")]
    DoubleFree {
        /// The slot freed twice.
        index: usize,
    },
    /// The free list or header is damaged.
    #[error("heap corruption: {0}")]
    HeapCorruption(Corruption),
}

/// Errors returned by arena operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArenaError {
    /// The backing store could not provide the arena's memory.
    #[error("backing store could not provide {requested} bytes")]
    AllocationFailure {
        /// Number of bytes requested.
        requested: usize,
    },

    /// Every slot is live. Not an error in the arena, just a full pool.
    #[error("arena exhausted: all {capacity} slots are live")]
    CapacityExhausted {
        /// Total slots in the arena.
        capacity: usize,
    },

    /// Placement creation was given too little memory.
    #[error("placement buffer too small: need {required} bytes, got {provided}")]
    InsufficientBuffer {
        /// Bytes needed for header plus slots.
        required: usize,
        /// Bytes supplied by the caller.
        provided: usize,
    },

    /// `slot_size * count` plus header does not fit in `usize`.
    #[error("arena size overflows: {count} slots of {slot_size} bytes")]
    SizeOverflow {
        /// Requested slot size in bytes.
        slot_size: usize,
        /// Requested slot count.
        count: usize,
    },

    /// A typed view needs larger slots than the arena has.
    #[error("slots of {slot_size} bytes cannot hold a {required}-byte value")]
    SlotTooSmall {
        /// The arena's slot size.
        slot_size: usize,
        /// Size of the value type.
        required: usize,
    },

    /// A handle used for slot access was rejected.
    #[error("invalid handle for slot {index}: {reason}")]
    InvalidHandle {
        /// Slot index carried by the handle.
        index: usize,
        /// Why the handle was rejected.
        reason: HandleMismatch,
    },

    /// A fatal fault, already reported through the fault hook.
    #[error(transparent)]
    Fault(#[from] Fault),

    /// The arena raised a fault earlier and has not been reset since.
    #[error("arena is poisoned by an earlier fault; reset it before reuse")]
    Poisoned,
}

impl ArenaError {
    /// Returns true for errors that leave the arena in an undefined state.
    #[inline]
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Fault(_) | Self::Poisoned)
    }

    /// Returns the underlying fault, if any.
    #[inline]
    #[must_use]
    pub const fn fault(&self) -> Option<Fault> {
        match self {
            Self::Fault(fault) => Some(*fault),
            _ => None,
        }
    }
}

/// Result type for arena operations.
pub type ArenaResult<T> = Result<T, ArenaError>;
