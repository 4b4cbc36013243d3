//! Fixed-capacity, newest-first record buffer.
//!
//! Used for the error log and for each flight-plan feed. The front of the
//! log is always the most recently pushed entry; once the log is full the
//! oldest entry is dropped silently.

use serde::Serialize;
use std::collections::VecDeque;

/// Insertion-ordered ring buffer with oldest-eviction.
///
/// Invariant: `len() <= capacity()` after every operation.
///
/// Serializes as a plain JSON array, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BoundedLog<T> {
    entries: VecDeque<T>,
    #[serde(skip)]
    capacity: usize,
}

impl<T> BoundedLog<T> {
    /// Create an empty log that holds at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push an entry to the front, evicting from the back past capacity.
    pub fn push(&mut self, entry: T) {
        if self.capacity == 0 {
            return;
        }
        self.entries.push_front(entry);
        self.entries.truncate(self.capacity);
    }

    /// Most recently pushed entry still held.
    pub fn head(&self) -> Option<&T> {
        self.entries.front()
    }

    /// Entry at `index`, where 0 is the newest.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate newest to oldest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }
}
