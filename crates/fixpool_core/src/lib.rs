//! # FIXPOOL Core
//!
//! Fixed-size block memory pool for hot allocation paths:
//! - O(1) allocate, free and reset
//! - No per-allocation metadata; free slots hold their own links
//! - Optional heap checking (sentinels, double-free scan, cycle check)
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────── Arena ─────────────────────────────┐
//! │  LazyCursor ── issues untouched slots in address order           │
//! │  FreeList   ── LIFO stack of freed slots (intrusive or indexed)  │
//! │  Guard      ── sentinel / double-free / cycle checks + FaultHook │
//! │  SlotBuffer ── [ header | slot 0 | slot 1 | ... ]                │
//! │                  owned (BackingStore) or placed (&mut [u8])      │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Rules
//!
//! 1. **Single-threaded** - every mutating operation takes `&mut self`
//! 2. **Faults are fatal** - reported through the hook, arena poisoned until reset
//! 3. **Live slots are the caller's** - the arena never reads or writes them
//!
//! ## Example
//!
//! ```rust,ignore
//! use fixpool_core::{Arena, ArenaConfig};
//!
//! let mut arena = Arena::create(&ArenaConfig::new(64, 1024))?;
//! let slot = arena.allocate()?;
//! arena.slot_mut(slot)?.fill(0);
//! arena.free(slot)?;
//! arena.reset();
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod arena;
pub mod backing;
mod buffer;
pub mod config;
pub mod error;
mod free_list;
pub mod guard;
pub mod handle;
mod lazy;
pub mod typed;

pub use arena::{Arena, ArenaBuilder, ArenaStats};
pub use backing::{BackingStore, BudgetStore, SystemStore};
pub use buffer::{ArenaHeader, HEADER_LEN, WORD};
pub use config::{ArenaConfig, ConfigError, FreeListKind, GuardLevel};
pub use error::{ArenaError, ArenaResult, Corruption, Fault, HandleMismatch};
pub use guard::{AbortHook, FaultHook, LogHook, PanicHook, SENTINEL};
pub use handle::{ArenaId, SlotHandle};
pub use typed::TypedArena;
