use std::{cell::RefCell, collections::HashMap};

use crate::api::SubjectId;

/// `current` is the latest known (or optimistic) true count; `previous` is
/// the last value the UI already animated to. Keeping both lets the UI detect
/// deltas without re-deriving them from list length, which is deliberately
/// decoupled from the count (hidden replies still count).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CommentCount {
    pub previous: usize,
    pub current: usize,
}

#[derive(Debug)]
pub struct CounterStore {
    counts: RefCell<HashMap<SubjectId, CommentCount>>,
}

impl CounterStore {
    pub fn new() -> CounterStore {
        CounterStore {
            counts: RefCell::new(HashMap::new()),
        }
    }

    pub fn get(&self, subject: &SubjectId) -> Option<CommentCount> {
        self.counts.borrow().get(subject).copied()
    }

    /// Record a server-reported count. On first sight both values seed to the
    /// server value; afterwards `previous` carries over unchanged so the UI's
    /// comparison is against the last unacknowledged baseline, not per-fetch
    /// noise.
    pub fn record_server(&self, subject: SubjectId, value: usize) -> CommentCount {
        let mut counts = self.counts.borrow_mut();
        let entry = counts.entry(subject).or_insert(CommentCount {
            previous: value,
            current: value,
        });
        entry.current = value;
        *entry
    }

    /// Optimistic local delta, applied to `current` only
    pub fn adjust(&self, subject: SubjectId, delta: i64) -> CommentCount {
        let mut counts = self.counts.borrow_mut();
        let entry = counts.entry(subject).or_insert(CommentCount {
            previous: 0,
            current: 0,
        });
        entry.current = (entry.current as i64 + delta).max(0) as usize;
        *entry
    }

    /// Acknowledge the current value (after navigating away and back, so no
    /// stale animation triggers)
    pub fn reset(&self, subject: &SubjectId) {
        if let Some(entry) = self.counts.borrow_mut().get_mut(subject) {
            entry.previous = entry.current;
        }
    }
}

impl Default for CounterStore {
    fn default() -> CounterStore {
        CounterStore::new()
    }
}
