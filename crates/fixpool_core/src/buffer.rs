//! # Slot Buffer
//!
//! Raw storage for an arena: a header record followed by `count` slots of
//! `slot_size` bytes.
//!
//! ```text
//! ┌──────────────┬──────────┬──────────┬─────┬──────────────┐
//! │ ArenaHeader  │  slot 0  │  slot 1  │ ... │ slot count-1 │
//! │ (HEADER_LEN) │          │          │     │              │
//! └──────────────┴──────────┴──────────┴─────┴──────────────┘
//! ```
//!
//! A free slot starts with a link word (`next index + 1`, zero for end of
//! list) followed by the guard sentinel when heap checking is on. A live slot
//! is opaque caller data. The buffer itself has no opinion about which is
//! which; the arena decides.

use std::mem::size_of;
use std::ops::Range;

use bytemuck::{Pod, Zeroable};

use crate::config::{ArenaConfig, FreeListKind, GuardLevel};
use crate::error::{ArenaError, ArenaResult};

/// Native pointer size. Slot sizes are rounded up to a multiple of this.
pub const WORD: usize = size_of::<usize>();

/// Bytes of a free slot used by the link.
pub(crate) const LINK_LEN: usize = size_of::<usize>();

/// Bytes of a free slot used by the guard sentinel, after the link.
pub(crate) const SENTINEL_LEN: usize = size_of::<u64>();

/// Bytes reserved at the front of the arena memory for the header.
pub const HEADER_LEN: usize = size_of::<ArenaHeader>();

/// Identifies an arena header. ASCII "FIXPOOL" plus a version byte.
const HEADER_MAGIC: u64 = u64::from_le_bytes(*b"FIXPOOL\x01");

const FLAG_GUARD: u64 = 1;
const FLAG_PARANOID: u64 = 1 << 1;
const FLAG_INDEXED: u64 = 1 << 2;
const FLAG_PLACED: u64 = 1 << 3;

/// Self-description written at the start of every arena's memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct ArenaHeader {
    /// Format marker.
    pub magic: u64,
    /// Aligned slot size in bytes.
    pub slot_size: u64,
    /// Number of slots.
    pub count: u64,
    /// Guard level, free-list kind and ownership bits.
    pub flags: u64,
}

impl ArenaHeader {
    pub(crate) fn new(layout: &SlotLayout, guard: GuardLevel, kind: FreeListKind, placed: bool) -> Self {
        let mut flags = 0;
        if guard.checks_enabled() {
            flags |= FLAG_GUARD;
        }
        if guard == GuardLevel::Paranoid {
            flags |= FLAG_PARANOID;
        }
        if kind == FreeListKind::Indexed {
            flags |= FLAG_INDEXED;
        }
        if placed {
            flags |= FLAG_PLACED;
        }
        Self {
            magic: HEADER_MAGIC,
            slot_size: layout.slot_size as u64,
            count: layout.count as u64,
            flags,
        }
    }

    /// Whether the arena was placed in caller memory.
    #[inline]
    #[must_use]
    pub const fn is_placed(&self) -> bool {
        self.flags & FLAG_PLACED != 0
    }
}

/// Geometry derived from an [`ArenaConfig`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct SlotLayout {
    /// Slot size after alignment.
    pub slot_size: usize,
    /// Usable slot count. Zero when the requested slot size is zero.
    pub count: usize,
    /// Header plus slots, in bytes. Always a multiple of [`WORD`].
    pub total_len: usize,
}

impl SlotLayout {
    pub(crate) fn for_config(config: &ArenaConfig) -> ArenaResult<Self> {
        let overflow = || ArenaError::SizeOverflow {
            slot_size: config.slot_size,
            count: config.count,
        };

        let min = if config.guard.checks_enabled() {
            LINK_LEN + SENTINEL_LEN
        } else {
            LINK_LEN
        };
        let slot_size = config
            .slot_size
            .max(min)
            .checked_next_multiple_of(WORD)
            .ok_or_else(overflow)?;
        // A zero-sized request yields an arena that is always exhausted.
        let count = if config.slot_size == 0 { 0 } else { config.count };
        let total_len = slot_size
            .checked_mul(count)
            .and_then(|slots| slots.checked_add(HEADER_LEN))
            .ok_or_else(overflow)?;

        Ok(Self {
            slot_size,
            count,
            total_len,
        })
    }
}

/// Who owns the arena memory.
pub(crate) enum Storage<'a> {
    /// Heap block obtained from a backing store; released on drop.
    Owned(Box<[usize]>),
    /// Caller-supplied memory; never released by the arena.
    Placed(&'a mut [u8]),
}

/// Header plus slots over owned or placed memory.
pub(crate) struct SlotBuffer<'a> {
    storage: Storage<'a>,
    slot_size: usize,
    count: usize,
}

impl<'a> SlotBuffer<'a> {
    /// Wraps storage of at least `layout.total_len` bytes and writes the header.
    pub(crate) fn new(storage: Storage<'a>, layout: &SlotLayout, header: ArenaHeader) -> Self {
        let mut buffer = Self {
            storage,
            slot_size: layout.slot_size,
            count: layout.count,
        };
        buffer.bytes_mut()[..HEADER_LEN].copy_from_slice(bytemuck::bytes_of(&header));
        buffer
    }

    fn bytes(&self) -> &[u8] {
        match &self.storage {
            Storage::Owned(block) => bytemuck::cast_slice(&block[..]),
            Storage::Placed(memory) => &memory[..],
        }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        match &mut self.storage {
            Storage::Owned(block) => bytemuck::cast_slice_mut(&mut block[..]),
            Storage::Placed(memory) => &mut memory[..],
        }
    }

    #[inline]
    fn slot_range(&self, index: usize) -> Range<usize> {
        let start = HEADER_LEN + index * self.slot_size;
        start..start + self.slot_size
    }

    /// Whether the memory belongs to the arena.
    #[inline]
    pub(crate) fn is_owned(&self) -> bool {
        matches!(self.storage, Storage::Owned(_))
    }

    /// Reads back the header.
    pub(crate) fn header(&self) -> ArenaHeader {
        bytemuck::pod_read_unaligned(&self.bytes()[..HEADER_LEN])
    }

    /// Bytes of slot `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= count`.
    #[inline]
    pub(crate) fn slot(&self, index: usize) -> &[u8] {
        let range = self.slot_range(index);
        &self.bytes()[range]
    }

    /// Mutable bytes of slot `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= count`.
    #[inline]
    pub(crate) fn slot_mut(&mut self, index: usize) -> &mut [u8] {
        let range = self.slot_range(index);
        &mut self.bytes_mut()[range]
    }

    /// Raw link word of a free slot.
    #[inline]
    pub(crate) fn read_link(&self, index: usize) -> usize {
        bytemuck::pod_read_unaligned(&self.slot(index)[..LINK_LEN])
    }

    #[inline]
    pub(crate) fn write_link(&mut self, index: usize, link: usize) {
        self.slot_mut(index)[..LINK_LEN].copy_from_slice(bytemuck::bytes_of(&link));
    }

    /// Sentinel word of a free slot.
    #[inline]
    pub(crate) fn read_sentinel(&self, index: usize) -> u64 {
        bytemuck::pod_read_unaligned(&self.slot(index)[LINK_LEN..LINK_LEN + SENTINEL_LEN])
    }

    #[inline]
    pub(crate) fn write_sentinel(&mut self, index: usize, sentinel: u64) {
        self.slot_mut(index)[LINK_LEN..LINK_LEN + SENTINEL_LEN]
            .copy_from_slice(bytemuck::bytes_of(&sentinel));
    }

    /// Address range covered by the slots.
    pub(crate) fn slots_ptr_range(&self) -> Range<*const u8> {
        let end = HEADER_LEN + self.count * self.slot_size;
        self.bytes()[HEADER_LEN..end].as_ptr_range()
    }

    /// Hands back an owned block for release, leaving an empty one behind.
    pub(crate) fn take_owned(&mut self) -> Option<Box<[usize]>> {
        match &mut self.storage {
            Storage::Owned(block) => Some(std::mem::take(block)),
            Storage::Placed(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(config: &ArenaConfig) -> SlotBuffer<'static> {
        let layout = SlotLayout::for_config(config).unwrap();
        let header = ArenaHeader::new(&layout, config.guard, config.free_list, false);
        let block = vec![0usize; layout.total_len / WORD].into_boxed_slice();
        SlotBuffer::new(Storage::Owned(block), &layout, header)
    }

    #[test]
    fn test_slot_size_rounds_to_word() {
        let layout = SlotLayout::for_config(&ArenaConfig::unchecked(1, 4)).unwrap();
        assert_eq!(layout.slot_size, WORD);

        let layout = SlotLayout::for_config(&ArenaConfig::unchecked(WORD + 1, 4)).unwrap();
        assert_eq!(layout.slot_size, 2 * WORD);
        assert_eq!(layout.total_len, HEADER_LEN + 8 * WORD);
    }

    #[test]
    fn test_guarded_slot_fits_link_and_sentinel() {
        let config = ArenaConfig::unchecked(1, 4).with_guard(GuardLevel::On);
        let layout = SlotLayout::for_config(&config).unwrap();
        assert!(layout.slot_size >= LINK_LEN + SENTINEL_LEN);
        assert_eq!(layout.slot_size % WORD, 0);
    }

    #[test]
    fn test_zero_slot_size_has_no_slots() {
        let layout = SlotLayout::for_config(&ArenaConfig::unchecked(0, 100)).unwrap();
        assert_eq!(layout.count, 0);
        assert_eq!(layout.total_len, HEADER_LEN);
    }

    #[test]
    fn test_header_round_trip() {
        let config = ArenaConfig::unchecked(64, 16).with_free_list(FreeListKind::Indexed);
        let buffer = owned(&config);
        let header = buffer.header();
        assert_eq!(header.magic, HEADER_MAGIC);
        assert_eq!(header.slot_size, 64);
        assert_eq!(header.count, 16);
        assert_eq!(header.flags, FLAG_INDEXED);
        assert!(!header.is_placed());
    }

    #[test]
    fn test_link_and_sentinel_share_slot_prefix() {
        let config = ArenaConfig::unchecked(32, 4).with_guard(GuardLevel::On);
        let mut buffer = owned(&config);
        buffer.write_link(2, 7);
        buffer.write_sentinel(2, 0xDEAD_BEEF);
        assert_eq!(buffer.read_link(2), 7);
        assert_eq!(buffer.read_sentinel(2), 0xDEAD_BEEF);
        // Neighbouring slots untouched.
        assert!(buffer.slot(1).iter().all(|&b| b == 0));
        assert!(buffer.slot(3).iter().all(|&b| b == 0));
    }

    #[test]
    fn test_owned_slots_are_word_aligned() {
        let buffer = owned(&ArenaConfig::unchecked(24, 8));
        let range = buffer.slots_ptr_range();
        assert_eq!(range.start as usize % WORD, 0);
        assert_eq!(range.end as usize - range.start as usize, 8 * 24);
    }
}
