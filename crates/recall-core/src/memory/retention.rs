//! Capacity enforcement: keep only the highest-ranked memories.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entry::MemoryEntry;
use super::importance::calculate_importance;

/// Result of a capacity pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactionResult {
    pub removed_count: usize,
    pub remaining_count: usize,
    pub removed_ids: Vec<String>,
}

/// Rank `entries` by current importance and keep the top `max_entries`.
///
/// On return `entries` is ordered highest-ranked first. Ties are broken by
/// newer creation time, then id, so the outcome is deterministic.
pub fn enforce_capacity(
    entries: &mut Vec<MemoryEntry>,
    max_entries: usize,
    now: DateTime<Utc>,
) -> CompactionResult {
    let mut ranked: Vec<(f64, MemoryEntry)> = entries
        .drain(..)
        .map(|e| (calculate_importance(&e, now), e))
        .collect();

    ranked.sort_by(|(score_a, a), (score_b, b)| {
        score_b
            .partial_cmp(score_a)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.created.cmp(&a.created))
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut removed_ids = Vec::new();
    for (index, (_, entry)) in ranked.into_iter().enumerate() {
        if index < max_entries {
            entries.push(entry);
        } else {
            removed_ids.push(entry.id);
        }
    }

    CompactionResult {
        removed_count: removed_ids.len(),
        remaining_count: entries.len(),
        removed_ids,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::entry::MemoryType;
    use chrono::Duration;

    fn entry(id: &str, importance: f64, age_days: i64) -> MemoryEntry {
        let now = Utc::now();
        let mut e = MemoryEntry::new(format!("content {id}"), MemoryType::Fact, now)
            .with_importance(importance);
        e.id = id.into();
        e.last_accessed = now - Duration::days(age_days);
        e
    }

    #[test]
    fn test_noop_under_capacity() {
        let mut entries = vec![entry("a", 0.5, 0), entry("b", 0.9, 0)];
        let r = enforce_capacity(&mut entries, 10, Utc::now());
        assert_eq!(r.removed_count, 0);
        assert_eq!(r.remaining_count, 2);
        assert_eq!(entries[0].id, "b");
    }

    #[test]
    fn test_drops_lowest_ranked() {
        let mut entries = vec![
            entry("stale", 0.9, 120),
            entry("fresh", 0.5, 0),
            entry("weak", 0.1, 0),
        ];
        let r = enforce_capacity(&mut entries, 1, Utc::now());
        assert_eq!(r.removed_count, 2);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "fresh");
        assert!(r.removed_ids.contains(&"stale".to_string()));
        assert!(r.removed_ids.contains(&"weak".to_string()));
    }

    #[test]
    fn test_zero_capacity_empties() {
        let mut entries = vec![entry("a", 0.5, 0)];
        let r = enforce_capacity(&mut entries, 0, Utc::now());
        assert_eq!(r.remaining_count, 0);
        assert!(entries.is_empty());
    }

    #[test]
    fn test_deterministic_with_equal_scores() {
        let now = Utc::now();
        let mut entries: Vec<MemoryEntry> = ["b", "a", "c"]
            .iter()
            .map(|id| {
                let mut e = MemoryEntry::new("same", MemoryType::Fact, now);
                e.id = (*id).to_string();
                e
            })
            .collect();
        let r = enforce_capacity(&mut entries, 1, now);
        assert_eq!(entries[0].id, "a");
        assert_eq!(r.removed_ids, vec!["b".to_string(), "c".to_string()]);
    }
}
