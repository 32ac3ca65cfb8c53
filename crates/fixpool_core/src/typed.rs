//! # Typed Arena
//!
//! Plain-old-data values stored directly in arena slots. Values are copied
//! in and out with `bytemuck`, so no slot is ever reinterpreted in place.

use std::marker::PhantomData;
use std::mem::size_of;

use bytemuck::Pod;

use crate::arena::{Arena, ArenaBuilder};
use crate::config::{ArenaConfig, GuardLevel};
use crate::error::{ArenaError, ArenaResult};
use crate::handle::SlotHandle;

/// An arena holding values of one `Pod` type.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Clone, Copy, Pod, Zeroable)]
/// #[repr(C)]
/// struct Particle { x: f32, y: f32, life: f32 }
///
/// let mut particles = TypedArena::<Particle>::new(10_000, GuardLevel::Off)?;
/// let h = particles.insert(Particle { x: 0.0, y: 0.0, life: 1.0 })?;
/// let p = particles.remove(h)?;
/// ```
pub struct TypedArena<'a, T: Pod> {
    arena: Arena<'a>,
    _marker: PhantomData<T>,
}

impl<T: Pod> TypedArena<'static, T> {
    /// Creates a heap-owned arena of `count` values.
    ///
    /// # Errors
    ///
    /// As [`Arena::create`].
    pub fn new(count: usize, guard: GuardLevel) -> ArenaResult<Self> {
        let config = ArenaConfig::new(size_of::<T>(), count).with_guard(guard);
        Self::from_arena(Arena::create(&config)?)
    }
}

impl<'a, T: Pod> TypedArena<'a, T> {
    /// Creates a typed view from a builder, with slots sized for `T`.
    ///
    /// # Errors
    ///
    /// As [`ArenaBuilder::build`].
    pub fn with_builder(builder: ArenaBuilder<'a>) -> ArenaResult<Self> {
        Self::from_arena(builder.build()?)
    }

    /// Wraps an existing arena.
    ///
    /// # Errors
    ///
    /// [`ArenaError::SlotTooSmall`] if the arena's slots cannot hold a `T`.
    pub fn from_arena(arena: Arena<'a>) -> ArenaResult<Self> {
        if arena.capacity() > 0 && arena.slot_size() < size_of::<T>() {
            return Err(ArenaError::SlotTooSmall {
                slot_size: arena.slot_size(),
                required: size_of::<T>(),
            });
        }
        Ok(Self {
            arena,
            _marker: PhantomData,
        })
    }

    /// Stores `value` in a fresh slot.
    ///
    /// # Errors
    ///
    /// As [`Arena::allocate`].
    pub fn insert(&mut self, value: T) -> ArenaResult<SlotHandle> {
        let handle = self.arena.allocate()?;
        self.arena.slot_mut(handle)?[..size_of::<T>()].copy_from_slice(bytemuck::bytes_of(&value));
        Ok(handle)
    }

    /// Reads the value in a slot.
    ///
    /// # Errors
    ///
    /// [`ArenaError::InvalidHandle`] for a handle from another arena or epoch.
    pub fn get(&self, handle: SlotHandle) -> ArenaResult<T> {
        let bytes = &self.arena.slot(handle)?[..size_of::<T>()];
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    /// Overwrites the value in a slot.
    ///
    /// # Errors
    ///
    /// [`ArenaError::InvalidHandle`] for a handle from another arena or epoch.
    pub fn set(&mut self, handle: SlotHandle, value: T) -> ArenaResult<()> {
        self.arena.slot_mut(handle)?[..size_of::<T>()].copy_from_slice(bytemuck::bytes_of(&value));
        Ok(())
    }

    /// Takes the value out and frees its slot.
    ///
    /// # Errors
    ///
    /// As [`Arena::free`].
    pub fn remove(&mut self, handle: SlotHandle) -> ArenaResult<T> {
        let value = self.get(handle)?;
        self.arena.free(handle)?;
        Ok(value)
    }

    /// Drops every value at once. O(1).
    pub fn reset(&mut self) {
        self.arena.reset();
    }

    /// Number of stored values.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.arena.live()
    }

    /// Whether no values are stored.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.arena.live() == 0
    }

    /// Maximum number of values.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.arena.capacity()
    }

    /// The underlying arena.
    #[inline]
    #[must_use]
    pub fn arena(&self) -> &Arena<'a> {
        &self.arena
    }

    /// Unwraps the underlying arena.
    #[must_use]
    pub fn into_inner(self) -> Arena<'a> {
        self.arena
    }
}
