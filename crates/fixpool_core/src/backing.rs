//! # Backing Stores
//!
//! Where heap-owned arenas get their memory. A store hands out whole
//! word-aligned blocks and takes them back when the arena is destroyed.
//! Placement arenas never touch a store.

/// Acquire/release pair used by heap-owned arenas.
///
/// Blocks are measured in machine words so slot addresses inherit pointer
/// alignment.
pub trait BackingStore {
    /// Returns a block of exactly `words` words, or `None` if the request
    /// cannot be satisfied.
    fn acquire(&mut self, words: usize) -> Option<Box<[usize]>>;

    /// Takes back a block previously returned by [`BackingStore::acquire`].
    fn release(&mut self, block: Box<[usize]>) {
        drop(block);
    }
}

impl<S: BackingStore + ?Sized> BackingStore for &mut S {
    fn acquire(&mut self, words: usize) -> Option<Box<[usize]>> {
        (**self).acquire(words)
    }

    fn release(&mut self, block: Box<[usize]>) {
        (**self).release(block);
    }
}

/// The global allocator, with allocation failure reported instead of aborting.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemStore;

impl BackingStore for SystemStore {
    fn acquire(&mut self, words: usize) -> Option<Box<[usize]>> {
        let mut block = Vec::new();
        block.try_reserve_exact(words).ok()?;
        block.resize(words, 0);
        Some(block.into_boxed_slice())
    }
}

/// A store that refuses requests beyond a fixed byte budget.
///
/// Useful for capping the memory a family of arenas may claim.
///
/// # Example
///
/// ```rust,ignore
/// let mut store = BudgetStore::new(64 * 1024);
/// let arena = ArenaBuilder::new(ArenaConfig::new(64, 512))
///     .backing(&mut store)
///     .build()?;
/// ```
#[derive(Debug)]
pub struct BudgetStore {
    /// Bytes that may still be handed out.
    remaining: usize,
    /// Bytes currently held by arenas.
    in_use: usize,
    /// Blocks handed out and not yet released.
    outstanding: usize,
}

impl BudgetStore {
    /// Creates a store with `budget` bytes available.
    #[must_use]
    pub const fn new(budget: usize) -> Self {
        Self {
            remaining: budget,
            in_use: 0,
            outstanding: 0,
        }
    }

    /// Bytes still available.
    #[inline]
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.remaining
    }

    /// Bytes currently held by arenas.
    #[inline]
    #[must_use]
    pub const fn in_use(&self) -> usize {
        self.in_use
    }

    /// Number of blocks not yet released.
    #[inline]
    #[must_use]
    pub const fn outstanding(&self) -> usize {
        self.outstanding
    }
}

impl BackingStore for BudgetStore {
    fn acquire(&mut self, words: usize) -> Option<Box<[usize]>> {
        let bytes = words.checked_mul(std::mem::size_of::<usize>())?;
        if bytes > self.remaining {
            tracing::debug!("budget store refused {} bytes ({} left)", bytes, self.remaining);
            return None;
        }
        let block = SystemStore.acquire(words)?;
        self.remaining -= bytes;
        self.in_use += bytes;
        self.outstanding += 1;
        Some(block)
    }

    fn release(&mut self, block: Box<[usize]>) {
        let bytes = block.len() * std::mem::size_of::<usize>();
        self.remaining += bytes;
        self.in_use -= bytes;
        self.outstanding -= 1;
    }
}
