//! # Lazy Initializer
//!
//! A bump cursor over slots that have never been handed out. Instead of
//! linking every slot into the free list at creation (O(count)), untouched
//! slots are issued in order straight from the cursor. Creation and reset
//! only have to rewind it.

/// Bump cursor over `[next, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct LazyCursor {
    /// First never-touched slot.
    next: usize,
    /// One past the last slot.
    end: usize,
    /// False once every slot has been issued at least once.
    active: bool,
}

impl LazyCursor {
    pub(crate) const fn new(end: usize) -> Self {
        Self {
            next: 0,
            end,
            active: true,
        }
    }

    /// Issues the next untouched slot, if any.
    #[inline]
    pub(crate) fn bump(&mut self) -> Option<usize> {
        if !self.active {
            return None;
        }
        if self.next == self.end {
            self.active = false;
            return None;
        }
        let index = self.next;
        self.next += 1;
        if self.next == self.end {
            self.active = false;
        }
        Some(index)
    }

    /// Makes every slot untouched again.
    #[inline]
    pub(crate) fn rewind(&mut self) {
        self.next = 0;
        self.active = true;
    }

    /// Number of slots never issued since the last rewind.
    #[inline]
    pub(crate) const fn untouched(&self) -> usize {
        self.end - self.next
    }

    /// Whether `index` has been issued since the last rewind.
    #[inline]
    pub(crate) const fn issued(&self, index: usize) -> bool {
        index < self.next
    }

    #[inline]
    pub(crate) const fn is_active(&self) -> bool {
        self.active
    }
}
