//! # Slot Arena
//!
//! A fixed-capacity pool of uniformly sized slots.
//!
//! ## Allocation order
//!
//! ```text
//! allocate():  free list non-empty? ──yes──> pop head (LIFO)
//!                    │ no
//!                    ▼
//!              cursor < count?     ──yes──> issue slot at cursor, bump
//!                    │ no
//!                    ▼
//!              CapacityExhausted
//! ```
//!
//! `reset()` rewinds the cursor and forgets the free list. Nothing is walked,
//! so reset costs the same whether one slot or all of them were live.
//!
//! ## Ownership
//!
//! An arena either owns its memory (taken from a [`BackingStore`] and given
//! back on drop) or borrows caller memory (placement). Both are the same
//! [`Arena`] type; dropping or destroying one does the right thing for its
//! kind.

use std::fmt;
use std::ops::Range;

use crate::backing::{BackingStore, SystemStore};
use crate::buffer::{ArenaHeader, SlotBuffer, SlotLayout, Storage, WORD};
use crate::config::{ArenaConfig, FreeListKind, GuardLevel};
use crate::error::{ArenaError, ArenaResult, Corruption, Fault, HandleMismatch};
use crate::free_list::FreeList;
use crate::guard::{AbortHook, FaultHook, Guard, SENTINEL};
use crate::handle::{ArenaId, SlotHandle};
use crate::lazy::LazyCursor;

/// Point-in-time view of an arena's slot accounting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArenaStats {
    /// Total slots.
    pub capacity: usize,
    /// Aligned slot size in bytes.
    pub slot_size: usize,
    /// Slots currently handed out.
    pub live: usize,
    /// Slots waiting in the free list.
    pub free_listed: usize,
    /// Slots not handed out since the last reset.
    pub untouched: usize,
    /// Most slots ever live at once.
    pub high_water: usize,
    /// Whether untouched slots are still being issued from the cursor.
    pub lazy_active: bool,
    /// Heap-checking level.
    pub guard: GuardLevel,
    /// Faults reported so far.
    pub faults: u64,
}

impl fmt::Display for ArenaStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} live ({} free-listed, {} untouched, peak {}) x {}B, guard {:?}",
            self.live,
            self.capacity,
            self.free_listed,
            self.untouched,
            self.high_water,
            self.slot_size,
            self.guard
        )
    }
}

/// Builds an [`Arena`] with a custom backing store or fault hook.
///
/// # Example
///
/// ```rust,ignore
/// let mut faults = Vec::new();
/// let mut arena = ArenaBuilder::new(ArenaConfig::new(64, 1024))
///     .fault_hook(|fault: &Fault| faults.push(*fault))
///     .build()?;
/// ```
pub struct ArenaBuilder<'a> {
    config: ArenaConfig,
    backing: Option<Box<dyn BackingStore + 'a>>,
    hook: Option<Box<dyn FaultHook + 'a>>,
}

impl<'a> ArenaBuilder<'a> {
    /// Starts from a config. Defaults: [`SystemStore`] and [`AbortHook`].
    #[must_use]
    pub fn new(config: ArenaConfig) -> Self {
        Self {
            config,
            backing: None,
            hook: None,
        }
    }

    /// Uses `store` for the arena's memory. Ignored by [`ArenaBuilder::build_in`].
    #[must_use]
    pub fn backing(mut self, store: impl BackingStore + 'a) -> Self {
        self.backing = Some(Box::new(store));
        self
    }

    /// Routes faults to `hook`.
    #[must_use]
    pub fn fault_hook(mut self, hook: impl FaultHook + 'a) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    /// Creates a heap-owned arena.
    ///
    /// # Errors
    ///
    /// - [`ArenaError::SizeOverflow`] if the arena size does not fit in `usize`
    /// - [`ArenaError::AllocationFailure`] if the backing store refuses
    pub fn build(self) -> ArenaResult<Arena<'a>> {
        let layout = SlotLayout::for_config(&self.config)?;
        let mut store = self
            .backing
            .unwrap_or_else(|| Box::new(SystemStore) as Box<dyn BackingStore + 'a>);

        let words = layout.total_len / WORD;
        let block = match store.acquire(words) {
            Some(block) if block.len() >= words => block,
            Some(short) => {
                store.release(short);
                return Err(ArenaError::AllocationFailure {
                    requested: layout.total_len,
                });
            }
            None => {
                return Err(ArenaError::AllocationFailure {
                    requested: layout.total_len,
                })
            }
        };

        Ok(Arena::assemble(
            &self.config,
            layout,
            Storage::Owned(block),
            Some(store),
            self.hook,
        ))
    }

    /// Creates an arena inside caller memory.
    ///
    /// The header and slots are placed at the front of `memory`. The arena
    /// never frees `memory`; it only borrows it.
    ///
    /// # Errors
    ///
    /// - [`ArenaError::SizeOverflow`] if the arena size does not fit in `usize`
    /// - [`ArenaError::InsufficientBuffer`] if `memory` is shorter than
    ///   [`ArenaConfig::required_len`]; `memory` is not written in that case
    pub fn build_in(self, memory: &'a mut [u8]) -> ArenaResult<Arena<'a>> {
        let layout = SlotLayout::for_config(&self.config)?;
        if memory.len() < layout.total_len {
            return Err(ArenaError::InsufficientBuffer {
                required: layout.total_len,
                provided: memory.len(),
            });
        }

        Ok(Arena::assemble(
            &self.config,
            layout,
            Storage::Placed(memory),
            None,
            self.hook,
        ))
    }
}

/// Fixed-size slot arena.
///
/// Single-threaded by contract: every mutating operation takes `&mut self`.
///
/// # Example
///
/// ```rust,ignore
/// let mut arena = Arena::create(&ArenaConfig::new(64, 1024))?;
///
/// let a = arena.allocate()?;
/// arena.slot_mut(a)?[..5].copy_from_slice(b"hello");
/// arena.free(a)?;
///
/// // LIFO: the slot just freed comes back first.
/// assert_eq!(arena.allocate()?, a);
///
/// // Reclaim everything in O(1).
/// arena.reset();
/// ```
pub struct Arena<'a> {
    id: ArenaId,
    layout: SlotLayout,
    header: ArenaHeader,
    free_list_kind: FreeListKind,
    buffer: SlotBuffer<'a>,
    free: FreeList,
    cursor: LazyCursor,
    guard: Guard<'a>,
    /// Present only for heap-owned arenas.
    backing: Option<Box<dyn BackingStore + 'a>>,
    live: usize,
    high_water: usize,
    epoch: u32,
    poisoned: bool,
}

impl Arena<'static> {
    /// Creates a heap-owned arena from the system allocator.
    ///
    /// Faults abort the process; use [`ArenaBuilder`] for another hook.
    ///
    /// # Errors
    ///
    /// - [`ArenaError::SizeOverflow`] if the arena size does not fit in `usize`
    /// - [`ArenaError::AllocationFailure`] if the memory cannot be allocated
    pub fn create(config: &ArenaConfig) -> ArenaResult<Self> {
        ArenaBuilder::new(config.clone()).build()
    }
}

impl<'a> Arena<'a> {
    /// Creates an arena inside caller memory. See [`ArenaBuilder::build_in`].
    ///
    /// # Errors
    ///
    /// - [`ArenaError::SizeOverflow`] if the arena size does not fit in `usize`
    /// - [`ArenaError::InsufficientBuffer`] if `memory` is too short
    pub fn create_in(config: &ArenaConfig, memory: &'a mut [u8]) -> ArenaResult<Self> {
        ArenaBuilder::new(config.clone()).build_in(memory)
    }

    fn assemble(
        config: &ArenaConfig,
        layout: SlotLayout,
        storage: Storage<'a>,
        backing: Option<Box<dyn BackingStore + 'a>>,
        hook: Option<Box<dyn FaultHook + 'a>>,
    ) -> Self {
        let placed = matches!(storage, Storage::Placed(_));
        let header = ArenaHeader::new(&layout, config.guard, config.free_list, placed);
        let buffer = SlotBuffer::new(storage, &layout, header);
        let hook = hook.unwrap_or_else(|| Box::new(AbortHook) as Box<dyn FaultHook + 'a>);
        let id = ArenaId::next();

        tracing::debug!(
            "arena {} created: {} slots x {} bytes, guard {:?}, {:?} free list, {}",
            id.get(),
            layout.count,
            layout.slot_size,
            config.guard,
            config.free_list,
            if placed { "placed" } else { "heap-owned" }
        );

        Self {
            id,
            layout,
            header,
            free_list_kind: config.free_list,
            buffer,
            free: FreeList::new(config.free_list, layout.count),
            cursor: LazyCursor::new(layout.count),
            guard: Guard::new(config.guard, hook),
            backing,
            live: 0,
            high_water: 0,
            epoch: 0,
            poisoned: false,
        }
    }

    // =========================================================================
    // Allocation
    // =========================================================================

    /// Hands out a slot.
    ///
    /// O(1). The slot's contents are whatever was there before.
    ///
    /// # Errors
    ///
    /// - [`ArenaError::CapacityExhausted`] if every slot is live
    /// - [`ArenaError::Fault`] with [`Fault::HeapCorruption`] if the free
    ///   list head is damaged (sentinel overwritten or link out of range)
    /// - [`ArenaError::Poisoned`] after an earlier fault
    pub fn allocate(&mut self) -> ArenaResult<SlotHandle> {
        self.ensure_usable()?;

        let index = if let Some(index) = self.pop_free()? {
            index
        } else {
            let Some(index) = self.cursor.bump() else {
                tracing::trace!("arena {} exhausted ({} slots)", self.id.get(), self.layout.count);
                return Err(ArenaError::CapacityExhausted {
                    capacity: self.layout.count,
                });
            };
            index
        };

        self.live += 1;
        self.high_water = self.high_water.max(self.live);
        Ok(SlotHandle::new(self.id, self.epoch, index))
    }

    fn pop_free(&mut self) -> ArenaResult<Option<usize>> {
        let Some(head) = self.free.peek() else {
            return Ok(None);
        };
        if self.guard.checks_enabled() {
            let found = self.buffer.read_sentinel(head);
            if found != SENTINEL {
                let corruption = Corruption::SentinelMismatch { index: head, found };
                return Err(self.raise(Fault::HeapCorruption(corruption)));
            }
        }
        match self.free.pop(&self.buffer, self.layout.count) {
            Ok(popped) => Ok(popped),
            Err(corruption) => Err(self.raise(Fault::HeapCorruption(corruption))),
        }
    }

    /// Returns a slot to the arena. `None` is accepted and ignored.
    ///
    /// O(1) with checks off; O(n) with checks on (double-free scan).
    ///
    /// # Errors
    ///
    /// - [`Fault::InvalidFree`] if the handle is from another arena, predates
    ///   the last reset, or names a slot never handed out
    /// - [`Fault::DoubleFree`] if the slot is already free (always caught
    ///   when no slot is live; caught in general with checks on)
    /// - [`Fault::HeapCorruption`] if the scan finds a damaged free list
    /// - [`ArenaError::Poisoned`] after an earlier fault
    ///
    /// Faults are reported through the hook first. The free list is not
    /// modified when a fault is raised.
    pub fn free(&mut self, slot: impl Into<Option<SlotHandle>>) -> ArenaResult<()> {
        let Some(handle) = slot.into() else {
            return Ok(());
        };
        self.ensure_usable()?;

        let index = handle.index();
        if let Err(reason) = self.check_handle(handle) {
            return Err(self.raise(Fault::InvalidFree { index, reason }));
        }
        if self.live == 0 {
            return Err(self.raise(Fault::DoubleFree { index }));
        }

        if self.guard.checks_enabled() {
            match self.free.contains(&self.buffer, self.layout.count, index) {
                Ok(false) => {}
                Ok(true) => return Err(self.raise(Fault::DoubleFree { index })),
                Err(corruption) => return Err(self.raise(Fault::HeapCorruption(corruption))),
            }
            self.buffer.write_sentinel(index, SENTINEL);
        }

        self.free.push(&mut self.buffer, index);
        self.live -= 1;
        Ok(())
    }

    /// Reclaims every slot at once.
    ///
    /// O(1): the cursor is rewound and the free list forgotten; slot
    /// contents are left as they are. Outstanding handles become stale.
    /// Clears poisoning. With [`GuardLevel::Paranoid`] the free list is
    /// verified first and any damage is reported through the hook.
    pub fn reset(&mut self) {
        if self.guard.level() == GuardLevel::Paranoid && !self.poisoned {
            if let Err(fault) = self.inspect() {
                self.raise(fault);
            }
        }

        self.cursor.rewind();
        self.free.clear();
        self.live = 0;
        self.epoch = self.epoch.wrapping_add(1);
        self.poisoned = false;

        tracing::debug!("arena {} reset (epoch {})", self.id.get(), self.epoch);
    }

    /// Runs the full heap check: header intact, free list acyclic and of the
    /// recorded length, sentinels intact (checks on), slot accounting exact.
    ///
    /// O(n) in the number of free-listed slots.
    ///
    /// # Errors
    ///
    /// [`Fault::HeapCorruption`] on damage, reported through the hook;
    /// [`ArenaError::Poisoned`] after an earlier fault.
    pub fn verify(&mut self) -> ArenaResult<()> {
        self.ensure_usable()?;
        self.inspect().map_err(|fault| self.raise(fault))
    }

    /// Tears the arena down, releasing its memory if it owns it.
    ///
    /// With checks on, the heap is verified first. Placement memory is
    /// returned to the caller untouched by the release. Dropping an arena
    /// releases memory the same way, without the check.
    ///
    /// # Errors
    ///
    /// [`Fault::HeapCorruption`] if the final check finds damage. The memory
    /// is released either way.
    pub fn destroy(mut self) -> ArenaResult<()> {
        let result = if self.guard.checks_enabled() && !self.poisoned {
            match self.inspect() {
                Ok(()) => Ok(()),
                Err(fault) => Err(self.raise(fault)),
            }
        } else {
            Ok(())
        };
        tracing::debug!(
            "arena {} destroyed ({})",
            self.id.get(),
            if self.buffer.is_owned() { "memory released" } else { "placement memory kept" }
        );
        result
    }

    // =========================================================================
    // Slot access
    // =========================================================================

    /// Bytes of a slot.
    ///
    /// # Errors
    ///
    /// [`ArenaError::InvalidHandle`] if the handle is not from this arena's
    /// current epoch.
    pub fn slot(&self, handle: SlotHandle) -> ArenaResult<&[u8]> {
        self.check_access(handle)?;
        Ok(self.buffer.slot(handle.index()))
    }

    /// Mutable bytes of a slot.
    ///
    /// # Errors
    ///
    /// [`ArenaError::InvalidHandle`] if the handle is not from this arena's
    /// current epoch.
    pub fn slot_mut(&mut self, handle: SlotHandle) -> ArenaResult<&mut [u8]> {
        self.check_access(handle)?;
        Ok(self.buffer.slot_mut(handle.index()))
    }

    /// Byte offset of a slot from the start of the slot region. Always a
    /// multiple of [`Arena::slot_size`].
    ///
    /// # Errors
    ///
    /// [`ArenaError::InvalidHandle`] as for [`Arena::slot`].
    pub fn offset_of(&self, handle: SlotHandle) -> ArenaResult<usize> {
        self.check_access(handle)?;
        Ok(handle.index() * self.layout.slot_size)
    }

    /// Address range of the slot region.
    #[must_use]
    pub fn slots_ptr_range(&self) -> Range<*const u8> {
        self.buffer.slots_ptr_range()
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Identity of this arena.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> ArenaId {
        self.id
    }

    /// Total number of slots.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.layout.count
    }

    /// Aligned slot size in bytes.
    #[inline]
    #[must_use]
    pub const fn slot_size(&self) -> usize {
        self.layout.slot_size
    }

    /// Header plus slots, in bytes.
    #[inline]
    #[must_use]
    pub const fn total_len(&self) -> usize {
        self.layout.total_len
    }

    /// Number of live slots.
    #[inline]
    #[must_use]
    pub const fn live(&self) -> usize {
        self.live
    }

    /// Whether the next [`Arena::allocate`] would report exhaustion.
    #[inline]
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.free.len() == 0 && self.cursor.untouched() == 0
    }

    /// Heap-checking level.
    #[inline]
    #[must_use]
    pub const fn guard_level(&self) -> GuardLevel {
        self.guard.level()
    }

    /// Free-list representation.
    #[inline]
    #[must_use]
    pub const fn free_list_kind(&self) -> FreeListKind {
        self.free_list_kind
    }

    /// Whether a fault has been raised since the last reset.
    #[inline]
    #[must_use]
    pub const fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Whether the arena owns its memory (heap) or borrows it (placement).
    #[inline]
    #[must_use]
    pub fn is_owned(&self) -> bool {
        self.buffer.is_owned()
    }

    /// Reset epoch. Handles from earlier epochs are stale.
    #[inline]
    #[must_use]
    pub const fn epoch(&self) -> u32 {
        self.epoch
    }

    /// The header as currently stored in arena memory.
    #[must_use]
    pub fn header(&self) -> ArenaHeader {
        self.buffer.header()
    }

    /// Slot accounting snapshot.
    #[must_use]
    pub fn stats(&self) -> ArenaStats {
        ArenaStats {
            capacity: self.layout.count,
            slot_size: self.layout.slot_size,
            live: self.live,
            free_listed: self.free.len(),
            untouched: self.cursor.untouched(),
            high_water: self.high_water,
            lazy_active: self.cursor.is_active(),
            guard: self.guard.level(),
            faults: self.guard.faults(),
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn check_handle(&self, handle: SlotHandle) -> Result<(), HandleMismatch> {
        if handle.arena() != self.id {
            Err(HandleMismatch::ForeignArena)
        } else if handle.epoch() != self.epoch {
            Err(HandleMismatch::StaleEpoch)
        } else if handle.index() >= self.layout.count {
            Err(HandleMismatch::OutOfRange)
        } else if !self.cursor.issued(handle.index()) {
            Err(HandleMismatch::Unissued)
        } else {
            Ok(())
        }
    }

    fn check_access(&self, handle: SlotHandle) -> ArenaResult<()> {
        self.check_handle(handle)
            .map_err(|reason| ArenaError::InvalidHandle {
                index: handle.index(),
                reason,
            })
    }

    fn ensure_usable(&self) -> ArenaResult<()> {
        if self.poisoned {
            tracing::warn!("arena {} used after a fault", self.id.get());
            return Err(ArenaError::Poisoned);
        }
        Ok(())
    }

    /// Poisons the arena and reports the fault.
    #[cold]
    fn raise(&mut self, fault: Fault) -> ArenaError {
        self.poisoned = true;
        self.guard.report(&fault);
        ArenaError::Fault(fault)
    }

    fn inspect(&self) -> Result<(), Fault> {
        // Slot access never reaches the header bytes, so a mismatch means
        // memory was written from outside the arena.
        if self.buffer.header() != self.header {
            return Err(Fault::HeapCorruption(Corruption::HeaderClobbered));
        }

        let count = self.layout.count;
        let check_sentinels = self.guard.checks_enabled();
        let damaged = self
            .free
            .find(&self.buffer, count, |index| {
                check_sentinels && self.buffer.read_sentinel(index) != SENTINEL
            })
            .map_err(Fault::HeapCorruption)?;
        if let Some(index) = damaged {
            return Err(Fault::HeapCorruption(Corruption::SentinelMismatch {
                index,
                found: self.buffer.read_sentinel(index),
            }));
        }

        let untouched = self.cursor.untouched();
        if self.live + self.free.len() + untouched != count {
            return Err(Fault::HeapCorruption(Corruption::LengthMismatch {
                expected: count.saturating_sub(self.live + untouched),
                found: self.free.len(),
            }));
        }
        Ok(())
    }
}

impl Drop for Arena<'_> {
    fn drop(&mut self) {
        if let (Some(block), Some(store)) = (self.buffer.take_owned(), self.backing.as_mut()) {
            store.release(block);
        }
    }
}

impl fmt::Debug for Arena<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("id", &self.id.get())
            .field("slot_size", &self.layout.slot_size)
            .field("capacity", &self.layout.count)
            .field("live", &self.live)
            .field("guard", &self.guard.level())
            .field("free_list", &self.free_list_kind)
            .field("owned", &self.buffer.is_owned())
            .field("epoch", &self.epoch)
            .field("poisoned", &self.poisoned)
            .finish()
    }
}
