//! # Free List
//!
//! LIFO stack of reusable slots. The most recently freed slot is the next
//! one handed out.
//!
//! Two representations:
//!
//! - **Intrusive**: each free slot's link word holds `next + 1` (zero ends
//!   the list). No memory outside the slots.
//! - **Indexed**: free indices live in a side `Vec`, reserved for `count`
//!   entries up front. Slot bytes never carry links.
//!
//! Both keep a length counter. The intrusive pop cross-checks that counter
//! against the links it follows, so a damaged link is caught in O(1) instead
//! of handing out an aliased slot.

use crate::buffer::SlotBuffer;
use crate::config::FreeListKind;
use crate::error::Corruption;

/// Link word value meaning "end of list".
const END: usize = 0;

#[inline]
const fn encode(next: Option<usize>) -> usize {
    match next {
        Some(index) => index + 1,
        None => END,
    }
}

pub(crate) enum FreeList {
    Intrusive { head: Option<usize>, len: usize },
    Indexed { stack: Vec<usize> },
}

impl FreeList {
    pub(crate) fn new(kind: FreeListKind, count: usize) -> Self {
        match kind {
            FreeListKind::Intrusive => Self::Intrusive { head: None, len: 0 },
            FreeListKind::Indexed => Self::Indexed {
                stack: Vec::with_capacity(count),
            },
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        match self {
            Self::Intrusive { len, .. } => *len,
            Self::Indexed { stack } => stack.len(),
        }
    }

    /// Slot that the next pop returns.
    #[inline]
    pub(crate) fn peek(&self) -> Option<usize> {
        match self {
            Self::Intrusive { head, .. } => *head,
            Self::Indexed { stack } => stack.last().copied(),
        }
    }

    /// Pushes a slot. The caller has already validated `index`.
    #[inline]
    pub(crate) fn push(&mut self, buffer: &mut SlotBuffer<'_>, index: usize) {
        match self {
            Self::Intrusive { head, len } => {
                buffer.write_link(index, encode(*head));
                *head = Some(index);
                *len += 1;
            }
            Self::Indexed { stack } => stack.push(index),
        }
    }

    /// Pops the head. On corruption the list is left untouched.
    #[inline]
    pub(crate) fn pop(&mut self, buffer: &SlotBuffer<'_>, count: usize) -> Result<Option<usize>, Corruption> {
        match self {
            Self::Intrusive { head, len } => {
                let Some(index) = *head else {
                    return Ok(None);
                };
                let next = decode(buffer, index, count)?;
                let remaining = *len - 1;
                if next.is_some() != (remaining > 0) {
                    return Err(Corruption::LengthMismatch {
                        expected: *len,
                        found: if next.is_some() { *len + 1 } else { 1 },
                    });
                }
                *head = next;
                *len = remaining;
                Ok(Some(index))
            }
            Self::Indexed { stack } => Ok(stack.pop()),
        }
    }

    /// Forgets every entry. O(1): slot contents are not touched.
    #[inline]
    pub(crate) fn clear(&mut self) {
        match self {
            Self::Intrusive { head, len } => {
                *head = None;
                *len = 0;
            }
            Self::Indexed { stack } => stack.clear(),
        }
    }

    /// Walks the list head-first, returning the first slot for which `found`
    /// is true.
    ///
    /// The walk is bounded by `count` steps. Running past that, leaving the
    /// arena, or ending at a length other than the recorded one is reported
    /// as corruption.
    pub(crate) fn find(
        &self,
        buffer: &SlotBuffer<'_>,
        count: usize,
        mut found: impl FnMut(usize) -> bool,
    ) -> Result<Option<usize>, Corruption> {
        match self {
            Self::Intrusive { head, len } => {
                let mut cursor = *head;
                let mut steps = 0;
                while let Some(index) = cursor {
                    if steps >= count {
                        return Err(Corruption::Cycle { count });
                    }
                    if found(index) {
                        return Ok(Some(index));
                    }
                    cursor = decode(buffer, index, count)?;
                    steps += 1;
                }
                if steps != *len {
                    return Err(Corruption::LengthMismatch {
                        expected: *len,
                        found: steps,
                    });
                }
                Ok(None)
            }
            Self::Indexed { stack } => {
                if stack.len() > count {
                    return Err(Corruption::Cycle { count });
                }
                Ok(stack.iter().rev().copied().find(|&index| found(index)))
            }
        }
    }

    /// Whether `index` is already free.
    pub(crate) fn contains(&self, buffer: &SlotBuffer<'_>, count: usize, index: usize) -> Result<bool, Corruption> {
        self.find(buffer, count, |candidate| candidate == index)
            .map(|hit| hit.is_some())
    }
}

/// Reads and range-checks the link stored in free slot `index`.
#[inline]
fn decode(buffer: &SlotBuffer<'_>, index: usize, count: usize) -> Result<Option<usize>, Corruption> {
    match buffer.read_link(index) {
        END => Ok(None),
        raw if raw - 1 < count => Ok(Some(raw - 1)),
        raw => Err(Corruption::LinkOutOfRange {
            index,
            link: raw - 1,
        }),
    }
}
