//! Operation sequence numbers for log entries.
//!
//! A [LogSequence] is owned by whoever creates it (usually a provider, see
//! [crate::provider::CspBuilder::sequence]) and may be shared by cloning its `Arc`. It starts at the
//! value given to [LogSequence::new], hands out strictly increasing ids from [LogSequence::next],
//! and can be moved back with [LogSequence::reset], e.g. between test cases.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct LogSequence(AtomicU64);

impl LogSequence {
    pub const fn new(start: u64) -> Self {
        Self(AtomicU64::new(start))
    }

    /// Advance the sequence and return the new value.
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn reset(&self, value: u64) {
        self.0.store(value, Ordering::Relaxed);
    }
}
