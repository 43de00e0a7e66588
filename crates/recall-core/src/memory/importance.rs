//! Decay-aware importance scoring.
//!
//! The score is never stored: it is recomputed against the current time for
//! every ranking, so eviction and retrieval always reflect recency.

use chrono::{DateTime, Utc};

use super::entry::MemoryEntry;

/// Time constant of the exponential decay, in days.
pub const DECAY_DAYS: f64 = 30.0;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Days elapsed since the entry was last accessed. Never negative.
pub fn age_days(entry: &MemoryEntry, now: DateTime<Utc>) -> f64 {
    let millis = (now - entry.last_accessed).num_milliseconds().max(0);
    millis as f64 / MILLIS_PER_DAY
}

/// `importance * exp(-age/30) * ln(access_count + 1) * type_weight`.
pub fn calculate_importance(entry: &MemoryEntry, now: DateTime<Utc>) -> f64 {
    let decay = (-age_days(entry, now) / DECAY_DAYS).exp();
    let access_boost = (f64::from(entry.access_count) + 1.0).ln();
    entry.importance * decay * access_boost * entry.kind.weight()
}
