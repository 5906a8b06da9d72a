use std::cell::Cell;

/// In-flight mutation counter gating background list refetches: while any
/// mutation is unsettled, thread page fetches are deferred so a server
/// refresh cannot clobber optimistic state the user just changed.
#[derive(Debug)]
pub struct SyncGate {
    in_flight: Cell<usize>,
}

impl SyncGate {
    pub fn new() -> SyncGate {
        SyncGate {
            in_flight: Cell::new(0),
        }
    }

    /// Increment the counter; the guard decrements it on drop, so entry and
    /// settle are always paired whatever path the mutation takes out.
    pub fn enter(&self) -> GateGuard<'_> {
        self.in_flight.set(self.in_flight.get() + 1);
        GateGuard { gate: self }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.get()
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight.get() == 0
    }
}

impl Default for SyncGate {
    fn default() -> SyncGate {
        SyncGate::new()
    }
}

#[derive(Debug)]
pub struct GateGuard<'a> {
    gate: &'a SyncGate,
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        let n = self.gate.in_flight.get();
        debug_assert!(n > 0, "gate guard dropped with zero in flight");
        self.gate.in_flight.set(n.saturating_sub(1));
    }
}
