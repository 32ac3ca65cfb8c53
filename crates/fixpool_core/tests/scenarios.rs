//! # Arena Scenarios
//!
//! End-to-end behaviour through the public API: capacity, reuse order,
//! fault reporting, placement and reset.

#![allow(missing_docs)]

use std::cell::Cell;
use std::collections::HashSet;

use fixpool_core::{
    Arena, ArenaBuilder, ArenaConfig, ArenaError, BudgetStore, Fault, FreeListKind, GuardLevel,
    HandleMismatch, LogHook, SlotHandle, HEADER_LEN,
};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

// =============================================================================
// CAPACITY
// =============================================================================

#[test]
fn test_exactly_count_allocations_succeed() {
    let mut arena = Arena::create(&ArenaConfig::unchecked(64, 1024)).unwrap();
    let mut seen = HashSet::new();
    for _ in 0..1024 {
        let handle = arena.allocate().unwrap();
        assert!(seen.insert(handle.index()), "slot {} handed out twice", handle.index());
    }
    assert_eq!(
        arena.allocate(),
        Err(ArenaError::CapacityExhausted { capacity: 1024 })
    );
    assert_eq!(arena.live(), 1024);
}

#[test]
fn test_zero_sized_slots_are_always_exhausted() {
    let mut arena = Arena::create(&ArenaConfig::unchecked(0, 16)).unwrap();
    assert_eq!(arena.capacity(), 0);
    assert!(arena.is_exhausted());
    assert_eq!(
        arena.allocate(),
        Err(ArenaError::CapacityExhausted { capacity: 0 })
    );
}

#[test]
fn test_size_overflow_rejected() {
    let result = Arena::create(&ArenaConfig::unchecked(usize::MAX / 2, 4));
    assert!(matches!(result, Err(ArenaError::SizeOverflow { .. })));
}

#[test]
fn test_slot_addresses_are_disjoint_and_aligned() {
    let mut arena = Arena::create(&ArenaConfig::new(13, 32)).unwrap();
    let size = arena.slot_size();
    assert_eq!(size % std::mem::size_of::<usize>(), 0);

    let mut offsets: Vec<_> = (0..32)
        .map(|_| {
            let h = arena.allocate().unwrap();
            arena.offset_of(h).unwrap()
        })
        .collect();
    offsets.sort_unstable();
    for pair in offsets.windows(2) {
        assert!(pair[1] - pair[0] >= size);
    }
    assert!(offsets.iter().all(|off| off % size == 0));
}

// =============================================================================
// REUSE ORDER
// =============================================================================

#[test]
fn test_lifo_reuse() {
    let mut arena = Arena::create(&ArenaConfig::new(64, 16)).unwrap();
    let _a = arena.allocate().unwrap();
    let b = arena.allocate().unwrap();
    let _c = arena.allocate().unwrap();
    arena.free(b).unwrap();
    assert_eq!(arena.allocate().unwrap(), b);
}

#[test]
fn test_shuffled_frees_come_back_reversed() {
    for kind in [FreeListKind::Intrusive, FreeListKind::Indexed] {
        let config = ArenaConfig::new(32, 64).with_free_list(kind);
        let mut arena = Arena::create(&config).unwrap();
        let mut handles: Vec<SlotHandle> = (0..64).map(|_| arena.allocate().unwrap()).collect();

        let mut rng = ChaCha8Rng::seed_from_u64(0x5eed);
        handles.shuffle(&mut rng);
        for h in &handles {
            arena.free(*h).unwrap();
        }

        for expected in handles.iter().rev() {
            assert_eq!(arena.allocate().unwrap(), *expected, "{kind:?}");
        }
        assert!(arena.is_exhausted());
    }
}

// =============================================================================
// FAULTS
// =============================================================================

#[test]
fn test_guarded_double_free_reported_once() {
    let calls = Cell::new(0);
    let mut arena = ArenaBuilder::new(ArenaConfig::unchecked(64, 8).with_guard(GuardLevel::On))
        .fault_hook(|fault: &Fault| {
            assert_eq!(*fault, Fault::DoubleFree { index: 0 });
            calls.set(calls.get() + 1);
        })
        .build()
        .unwrap();

    let a = arena.allocate().unwrap();
    let _b = arena.allocate().unwrap();
    arena.free(a).unwrap();
    let err = arena.free(a).unwrap_err();

    assert_eq!(err.fault(), Some(Fault::DoubleFree { index: 0 }));
    assert_eq!(calls.get(), 1);
    assert!(arena.is_poisoned());
}

#[test]
fn test_foreign_handle_rejected_without_touching_free_list() {
    let mut other = Arena::create(&ArenaConfig::unchecked(64, 4)).unwrap();
    let foreign = other.allocate().unwrap();

    let mut arena = ArenaBuilder::new(ArenaConfig::unchecked(64, 4).with_guard(GuardLevel::On))
        .fault_hook(LogHook)
        .build()
        .unwrap();
    let a = arena.allocate().unwrap();
    let _b = arena.allocate().unwrap();
    arena.free(a).unwrap();
    let before = arena.stats();

    let err = arena.free(foreign).unwrap_err();
    assert_eq!(
        err,
        ArenaError::Fault(Fault::InvalidFree {
            index: foreign.index(),
            reason: HandleMismatch::ForeignArena,
        })
    );

    let after = arena.stats();
    assert_eq!(after.free_listed, before.free_listed);
    assert_eq!(after.live, before.live);
    assert_eq!(after.faults, 1);
}

#[test]
fn test_stale_handle_rejected_after_reset() {
    let mut arena = ArenaBuilder::new(ArenaConfig::unchecked(16, 4))
        .fault_hook(LogHook)
        .build()
        .unwrap();
    let a = arena.allocate().unwrap();
    arena.reset();
    let _fresh = arena.allocate().unwrap();

    let err = arena.free(a).unwrap_err();
    assert_eq!(
        err.fault(),
        Some(Fault::InvalidFree {
            index: 0,
            reason: HandleMismatch::StaleEpoch,
        })
    );
}

#[test]
fn test_corrupted_sentinel_detected_on_allocate() {
    let seen = Cell::new(None);
    let mut arena = ArenaBuilder::new(ArenaConfig::unchecked(32, 4).with_guard(GuardLevel::On))
        .fault_hook(|fault: &Fault| seen.set(Some(*fault)))
        .build()
        .unwrap();

    let a = arena.allocate().unwrap();
    let _b = arena.allocate().unwrap();
    // Keep a copy of the handle and write through it after the free, the way
    // a use-after-free would. Access checks only the epoch, not liveness.
    arena.free(a).unwrap();
    arena.slot_mut(a).unwrap().fill(0x42);

    let err = arena.allocate().unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(
        seen.get(),
        Some(Fault::HeapCorruption(fixpool_core::Corruption::SentinelMismatch { index: 0, .. }))
    ));
}

#[test]
fn test_paranoid_reset_reports_damage_then_recovers() {
    let seen = Cell::new(0);
    let mut arena =
        ArenaBuilder::new(ArenaConfig::unchecked(32, 4).with_guard(GuardLevel::Paranoid))
            .fault_hook(|_: &Fault| seen.set(seen.get() + 1))
            .build()
            .unwrap();

    let a = arena.allocate().unwrap();
    let _b = arena.allocate().unwrap();
    arena.free(a).unwrap();
    arena.slot_mut(a).unwrap().fill(0);

    arena.reset();
    assert_eq!(seen.get(), 1);
    assert!(!arena.is_poisoned());
    arena.verify().unwrap();
    assert!(arena.allocate().is_ok());
}

// =============================================================================
// LIVE DATA
// =============================================================================

#[test]
fn test_live_slot_contents_survive_churn() {
    let config = ArenaConfig::unchecked(48, 32).with_guard(GuardLevel::On);
    let mut arena = Arena::create(&config).unwrap();
    let handles: Vec<_> = (0..32).map(|_| arena.allocate().unwrap()).collect();
    for (i, h) in handles.iter().enumerate() {
        arena.slot_mut(*h).unwrap().fill(i as u8);
    }

    // Free and reallocate every odd slot a few times.
    for _ in 0..3 {
        for h in handles.iter().skip(1).step_by(2) {
            arena.free(*h).unwrap();
        }
        for _ in handles.iter().skip(1).step_by(2) {
            let h = arena.allocate().unwrap();
            arena.slot_mut(h).unwrap().fill(0xEE);
        }
    }

    for (i, h) in handles.iter().enumerate().step_by(2) {
        assert!(
            arena.slot(*h).unwrap().iter().all(|&b| b == i as u8),
            "live slot {i} was modified"
        );
    }
    arena.verify().unwrap();
}

// =============================================================================
// PLACEMENT
// =============================================================================

#[test]
fn test_placement_rejects_short_buffer_without_writing() {
    let mut memory = [0xABu8; 10];
    {
        let result = Arena::create_in(&ArenaConfig::new(64, 5), &mut memory);
        assert!(matches!(
            result,
            Err(ArenaError::InsufficientBuffer { provided: 10, .. })
        ));
    }
    assert!(memory.iter().all(|&b| b == 0xAB));
}

#[test]
fn test_placement_fits_exactly() {
    let config = ArenaConfig::new(64, 5);
    let len = config.required_len().unwrap();
    assert!(len >= HEADER_LEN + 5 * 64);

    let mut memory = vec![0u8; len];
    let mut arena = Arena::create_in(&config, &mut memory).unwrap();
    assert!(!arena.is_owned());
    assert!(arena.header().is_placed());
    for _ in 0..5 {
        let _ = arena.allocate().unwrap();
    }
    assert!(arena.is_exhausted());
}

#[test]
fn test_placement_memory_survives_destroy() {
    let config = ArenaConfig::unchecked(16, 4).with_guard(GuardLevel::On);
    let mut memory = vec![0u8; config.required_len().unwrap()];
    {
        let mut arena = Arena::create_in(&config, &mut memory).unwrap();
        let h = arena.allocate().unwrap();
        arena.slot_mut(h).unwrap().copy_from_slice(b"placement-bytes!");
        arena.destroy().unwrap();
    }
    assert_eq!(&memory[..7], b"FIXPOOL");
    assert_eq!(&memory[HEADER_LEN..HEADER_LEN + 16], b"placement-bytes!");
}

// =============================================================================
// RESET
// =============================================================================

#[test]
fn test_reset_after_exhaustion() {
    let mut arena = Arena::create(&ArenaConfig::new(64, 8)).unwrap();
    while arena.allocate().is_ok() {}
    assert!(arena.is_exhausted());

    arena.reset();
    let h = arena.allocate().unwrap();
    let range = arena.slots_ptr_range();
    let ptr = arena.slot(h).unwrap().as_ptr();
    assert!(range.contains(&ptr));
    assert_eq!(arena.stats().untouched, 7);
}

#[test]
fn test_owned_memory_returned_on_destroy() {
    let mut store = BudgetStore::new(1 << 16);
    {
        let mut arena = ArenaBuilder::new(ArenaConfig::unchecked(32, 8))
            .backing(&mut store)
            .build()
            .unwrap();
        let _ = arena.allocate().unwrap();
        arena.destroy().unwrap();
    }
    assert_eq!(store.outstanding(), 0);
    assert_eq!(store.remaining(), 1 << 16);
}
