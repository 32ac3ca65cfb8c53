//! # Guard Layer
//!
//! Corruption detection and fault reporting.
//!
//! ## Checks
//!
//! | Check            | When                         | Cost  | Level   |
//! |------------------|------------------------------|-------|---------|
//! | Handle ownership | every `free`                 | O(1)  | always  |
//! | Link range       | every pop                    | O(1)  | always  |
//! | Sentinel         | write on `free`, check on pop| O(1)  | On      |
//! | Double-free scan | every `free`                 | O(n)  | On      |
//! | Cycle check      | `free`, `destroy`, `verify`  | O(n)  | On      |
//! | Cycle check      | `reset`                      | O(n)  | Paranoid|
//!
//! ## Fault policy
//!
//! Every fault goes through exactly one [`FaultHook`]. The hook decides
//! whether the process continues: [`AbortHook`] stops it, [`PanicHook`]
//! unwinds, [`LogHook`] returns control so the caller sees the error value.
//! Either way the arena is poisoned until it is reset.

use crate::config::GuardLevel;
use crate::error::Fault;

/// Bit pattern written into every freed slot in guard mode.
///
/// A fibonacci run of bits, nibble-reversed so the low bytes carry the most
/// entropy on little-endian machines.
pub const SENTINEL: u64 = 0xFF30_0008_1110_0F1B;

/// Receives fatal arena faults.
///
/// Closures `FnMut(&Fault)` implement this trait.
pub trait FaultHook {
    /// Called once per fault, after it has been logged.
    fn on_fault(&mut self, fault: &Fault);
}

impl<F: FnMut(&Fault)> FaultHook for F {
    fn on_fault(&mut self, fault: &Fault) {
        self(fault);
    }
}

/// Aborts the process. The default: a corrupted pool must not keep running.
#[derive(Clone, Copy, Debug, Default)]
pub struct AbortHook;

impl FaultHook for AbortHook {
    fn on_fault(&mut self, fault: &Fault) {
        eprintln!("fixpool: fatal arena fault: {fault}");
        std::process::abort();
    }
}

/// Panics with the fault message.
#[derive(Clone, Copy, Debug, Default)]
pub struct PanicHook;

impl FaultHook for PanicHook {
    fn on_fault(&mut self, fault: &Fault) {
        panic!("fixpool: fatal arena fault: {fault}");
    }
}

/// Only logs. The fault is still returned to the caller and the arena is
/// still poisoned.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogHook;

impl FaultHook for LogHook {
    fn on_fault(&mut self, _fault: &Fault) {}
}

/// Guard level plus the hook faults are routed through.
pub(crate) struct Guard<'a> {
    level: GuardLevel,
    hook: Box<dyn FaultHook + 'a>,
    faults: u64,
}

impl<'a> Guard<'a> {
    pub(crate) fn new(level: GuardLevel, hook: Box<dyn FaultHook + 'a>) -> Self {
        Self {
            level,
            hook,
            faults: 0,
        }
    }

    #[inline]
    pub(crate) const fn level(&self) -> GuardLevel {
        self.level
    }

    #[inline]
    pub(crate) const fn checks_enabled(&self) -> bool {
        self.level.checks_enabled()
    }

    /// Logs the fault and hands it to the hook.
    #[cold]
    pub(crate) fn report(&mut self, fault: &Fault) {
        self.faults += 1;
        tracing::error!("arena fault: {}", fault);
        self.hook.on_fault(fault);
    }

    /// Faults reported over the arena's lifetime.
    #[inline]
    pub(crate) const fn faults(&self) -> u64 {
        self.faults
    }
}
