// Weatherwire - Bounded display buffers
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Bounded buffers feeding the live display.
//!
//! - [`SlidingWindow`] keeps the last N samples, oldest first, for charting.
//! - [`LogRing`] keeps the last N log lines, newest first, for the log panel.

use std::collections::VecDeque;

/// Default capacity of both display buffers
pub const DEFAULT_CAPACITY: usize = 20;

/// A timestamped sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub value: f64,
    pub timestamp_ms: i64,
}

/// Fixed-capacity window; the oldest entry is evicted from the front.
#[derive(Debug, Clone)]
pub struct SlidingWindow<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> SlidingWindow<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Append an entry, evicting from the front past capacity.
    pub fn push(&mut self, item: T) {
        self.items.push_back(item);
        while self.items.len() > self.capacity {
            self.items.pop_front();
        }
    }

    /// Entries, oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }
}

impl SlidingWindow<Sample> {
    /// Sample values, oldest first.
    pub fn values(&self) -> Vec<f64> {
        self.items.iter().map(|s| s.value).collect()
    }

    /// Smallest and largest value in the window.
    pub fn value_range(&self) -> Option<(f64, f64)> {
        self.items.iter().map(|s| s.value).fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }
}

/// Fixed-capacity ring; new entries go to the front, the oldest fall off
/// the back.
#[derive(Debug, Clone)]
pub struct LogRing<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> LogRing<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn push(&mut self, item: T) {
        self.items.push_front(item);
        self.items.truncate(self.capacity);
    }

    /// Entries, newest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
