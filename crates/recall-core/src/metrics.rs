//! Global atomic counters for memory activity.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. on service shutdown).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters. No allocations, no locking.
pub struct Metrics {
    memories_created: AtomicU64,
    memories_reinforced: AtomicU64,
    retrievals: AtomicU64,
    evictions: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            memories_created: AtomicU64::new(0),
            memories_reinforced: AtomicU64::new(0),
            retrievals: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn inc_memories_created(&self) {
        self.memories_created.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "memories_created", "counter incremented");
    }

    /// A duplicate insert merged into an existing memory.
    pub fn inc_memories_reinforced(&self) {
        self.memories_reinforced.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "memories_reinforced", "counter incremented");
    }

    pub fn inc_retrievals(&self) {
        self.retrievals.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "retrievals", "counter incremented");
    }

    /// Add memories dropped by capacity enforcement.
    pub fn add_evictions(&self, n: u64) {
        self.evictions.fetch_add(n, Ordering::Relaxed);
        tracing::trace!(metric = "evictions", n, "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            memories_created = self.memories_created(),
            memories_reinforced = self.memories_reinforced(),
            retrievals = self.retrievals(),
            evictions = self.evictions(),
        );
    }

    pub fn memories_created(&self) -> u64 {
        self.memories_created.load(Ordering::Relaxed)
    }

    pub fn memories_reinforced(&self) -> u64 {
        self.memories_reinforced.load(Ordering::Relaxed)
    }

    pub fn retrievals(&self) -> u64 {
        self.retrievals.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.memories_created.store(0, Ordering::Relaxed);
        self.memories_reinforced.store(0, Ordering::Relaxed);
        self.retrievals.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
    }
}
