//! Capacity-bounded memory store with lexical retrieval.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entry::{sanitize_importance, MemoryEntry, MemoryType, NewMemory, DEFAULT_IMPORTANCE};
use super::importance::calculate_importance;
use super::retention::{enforce_capacity, CompactionResult};
use crate::error::{RecallError, Result};
use crate::{metrics::METRICS, obs};

/// Query tokens shorter than this many chars (inclusive) are ignored.
const MIN_TOKEN_CHARS: usize = 3;
/// Candidates at or below this total score are dropped.
const SCORE_FLOOR: f64 = 0.1;
const TAG_BONUS: f64 = 0.1;
const IMPORTANCE_WEIGHT: f64 = 0.3;

/// Parameters for [`MemoryStore::retrieve`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalQuery {
    pub text: String,
    pub types: Option<Vec<MemoryType>>,
    pub limit: usize,
    pub min_importance: f64,
}

impl RetrievalQuery {
    /// Query with the default limit (10) and importance floor (0.3).
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            types: None,
            limit: 10,
            min_importance: 0.3,
        }
    }

    pub fn with_types(mut self, types: Vec<MemoryType>) -> Self {
        self.types = Some(types);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_min_importance(mut self, min_importance: f64) -> Self {
        self.min_importance = min_importance;
        self
    }
}

/// Whether an insert created a new entry or reinforced an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Created,
    Reinforced,
}

/// The set of retained memories.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Vec<MemoryEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore a store from persisted or imported entries.
    ///
    /// Importance is clamped into `[0, 1]`, and entries sharing content and
    /// type are folded into the first occurrence.
    pub fn from_entries(entries: Vec<MemoryEntry>) -> Self {
        let mut index: HashMap<(String, MemoryType), usize> = HashMap::new();
        let mut merged: Vec<MemoryEntry> = Vec::with_capacity(entries.len());

        for mut entry in entries {
            entry.importance = sanitize_importance(entry.importance);
            let key = (entry.content.to_lowercase(), entry.kind);
            match index.get(&key) {
                Some(&pos) => absorb(&mut merged[pos], entry),
                None => {
                    index.insert(key, merged.len());
                    merged.push(entry);
                }
            }
        }

        Self { entries: merged }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[MemoryEntry] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&MemoryEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Insert a memory, merging into an existing entry with the same
    /// case-insensitive content and type.
    pub fn add(
        &mut self,
        content: &str,
        kind: MemoryType,
        opts: NewMemory,
        now: DateTime<Utc>,
    ) -> (MemoryEntry, AddOutcome) {
        if let Some(existing) = self.entries.iter_mut().find(|e| e.matches(content, kind)) {
            existing.reinforce(now);
            METRICS.inc_memories_reinforced();
            obs::emit_memory_reinforced(&existing.id, existing.access_count, existing.importance);
            return (existing.clone(), AddOutcome::Reinforced);
        }

        let mut entry = MemoryEntry::new(content, kind, now)
            .with_importance(opts.importance.unwrap_or(DEFAULT_IMPORTANCE))
            .with_tags(opts.tags);
        entry.source_conversation = opts.source_conversation;

        METRICS.inc_memories_created();
        obs::emit_memory_added(&entry.id, kind, entry.importance);
        self.entries.push(entry.clone());
        (entry, AddOutcome::Created)
    }

    /// Rank memories against `query`, most relevant first.
    ///
    /// Every returned entry is touched: retrieval reinforces future importance.
    pub fn retrieve(&mut self, query: &RetrievalQuery, now: DateTime<Utc>) -> Vec<MemoryEntry> {
        let query_tokens = tokenize(&query.text);

        let mut scored: Vec<(usize, f64)> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| match &query.types {
                Some(types) => types.contains(&e.kind),
                None => true,
            })
            .filter(|(_, e)| calculate_importance(e, now) >= query.min_importance)
            .map(|(i, e)| (i, relevance_score(e, &query_tokens, now)))
            .filter(|(_, score)| *score > SCORE_FLOOR)
            .collect();

        scored.sort_by(|(_, a), (_, b)| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(query.limit);

        let results: Vec<MemoryEntry> = scored
            .into_iter()
            .map(|(i, _)| {
                let entry = &mut self.entries[i];
                entry.touch(now);
                entry.clone()
            })
            .collect();

        METRICS.inc_retrievals();
        obs::emit_memories_retrieved(query_tokens.len(), results.len());
        results
    }

    /// Trim to the `max_entries` highest-ranked memories.
    pub fn enforce_capacity(&mut self, max_entries: usize, now: DateTime<Utc>) -> CompactionResult {
        let result = enforce_capacity(&mut self.entries, max_entries, now);
        if result.removed_count > 0 {
            METRICS.add_evictions(result.removed_count as u64);
            obs::emit_capacity_enforced(result.removed_count, result.remaining_count);
        }
        result
    }

    /// Remove a single memory by id.
    pub fn remove(&mut self, id: &str) -> Result<MemoryEntry> {
        let pos = self
            .entries
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| RecallError::EntryNotFound { id: id.into() })?;
        Ok(self.entries.remove(pos))
    }

    /// Memories (optionally of one type) ordered by current importance.
    pub fn ranked(&self, kind: Option<MemoryType>, now: DateTime<Utc>) -> Vec<(f64, MemoryEntry)> {
        let mut ranked: Vec<(f64, MemoryEntry)> = self
            .entries
            .iter()
            .filter(|e| kind.map_or(true, |k| e.kind == k))
            .map(|e| (calculate_importance(e, now), e.clone()))
            .collect();
        ranked.sort_by(|(a, _), (b, _)| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
        ranked
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Fold a duplicate into `kept`, keeping the stronger and fresher signal of each.
fn absorb(kept: &mut MemoryEntry, dup: MemoryEntry) {
    kept.importance = kept.importance.max(dup.importance);
    kept.access_count = kept.access_count.saturating_add(dup.access_count);
    kept.created = kept.created.min(dup.created);
    kept.last_accessed = kept.last_accessed.max(dup.last_accessed);
    kept.tags.extend(dup.tags);
    if kept.source_conversation.is_none() {
        kept.source_conversation = dup.source_conversation;
    }
}

/// Lowercased word tokens longer than three characters.
pub fn tokenize(text: &str) -> BTreeSet<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|t| t.trim_matches('\''))
        .filter(|t| t.chars().count() > MIN_TOKEN_CHARS)
        .map(str::to_string)
        .collect()
}

/// Lexical overlap plus tag bonus plus a share of current importance.
pub fn relevance_score(
    entry: &MemoryEntry,
    query_tokens: &BTreeSet<String>,
    now: DateTime<Utc>,
) -> f64 {
    let content_tokens = tokenize(&entry.content);
    let overlap = content_tokens.intersection(query_tokens).count();
    let relevance = overlap as f64 / query_tokens.len().max(1) as f64;

    let tag_hits = entry
        .tags
        .iter()
        .filter(|t| query_tokens.contains(&t.to_lowercase()))
        .count();

    relevance
        + TAG_BONUS * tag_hits as f64
        + IMPORTANCE_WEIGHT * calculate_importance(entry, now)
}
