//! Bounded command history.
//!
//! [`HistoryStore`] is a ring of reusable string slots plus a counter of how
//! many external commands have been recorded since startup. Once the ring is
//! full every new command overwrites the oldest one. The index arithmetic lives
//! in the free functions [`slot_for`] and [`label_for`] so it can be checked
//! without any I/O.

use crate::config::HISTORY_CAPACITY;

/// Ring slot that command number `counter` (0-based) is written to.
pub fn slot_for(counter: usize, capacity: usize) -> usize {
    counter % capacity
}

/// Label of the entry at `position` (0 = oldest retained) when `commands_run`
/// commands were recorded and `retained` of them are still stored.
///
/// Labels are contiguous and the most recent command carries `commands_run`.
pub fn label_for(position: usize, commands_run: usize, retained: usize) -> usize {
    commands_run - retained + position + 1
}

/// One listed history line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry<'a> {
    pub label: usize,
    pub line: &'a str,
}

#[derive(Debug, Clone)]
pub struct HistoryStore {
    slots: Vec<String>,
    commands_run: usize,
}

impl HistoryStore {
    /// A store with the shell's fixed capacity.
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }

    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "history capacity must be positive");
        Self {
            slots: vec![String::new(); capacity],
            commands_run: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Total number of commands recorded since startup.
    pub fn commands_run(&self) -> usize {
        self.commands_run
    }

    /// Number of entries currently retained: `min(commands_run, capacity)`.
    pub fn len(&self) -> usize {
        self.commands_run.min(self.capacity())
    }

    pub fn is_empty(&self) -> bool {
        self.commands_run == 0
    }

    /// Store `line` as the most recent command, overwriting the oldest entry
    /// when the ring is full.
    pub fn record(&mut self, line: &str) {
        let index = slot_for(self.commands_run, self.capacity());
        let slot = &mut self.slots[index];
        slot.clear();
        slot.push_str(line);
        self.commands_run += 1;
    }

    /// Retained entries, oldest first, labeled so the newest carries
    /// [`commands_run`](Self::commands_run).
    pub fn list(&self) -> Vec<HistoryEntry<'_>> {
        let retained = self.len();
        let first = self.commands_run - retained;
        (0..retained)
            .map(|position| HistoryEntry {
                label: label_for(position, self.commands_run, retained),
                line: &self.slots[slot_for(first + position, self.capacity())],
            })
            .collect()
    }

    /// Entry `offset` steps back from the most recent one (0 = most recent).
    ///
    /// Callers validate the offset first; `None` is returned for anything
    /// outside `0..len()` instead of reading a stale slot.
    pub fn retrieve(&self, offset: usize) -> Option<&str> {
        if offset >= self.len() {
            return None;
        }
        let counter = self.commands_run - 1 - offset;
        Some(&self.slots[slot_for(counter, self.capacity())])
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new()
    }
}
