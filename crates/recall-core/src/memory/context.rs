//! Context window assembly.
//!
//! A window merges the live conversation (short-term) with retrieved
//! context memories (medium-term) and durable facts, preferences,
//! patterns and corrections (long-term). The token count is advisory:
//! [`build_context_window`] never truncates, callers that need a hard cap
//! use [`ContextWindow::fit_to_budget`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entry::{MemoryEntry, MemoryType};
use crate::conversation::Exchange;

/// Importance assigned to synthetic short-term entries.
pub const SHORT_TERM_IMPORTANCE: f64 = 0.8;

/// Conversation history plus retrieved memories for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextWindow {
    pub short_term: Vec<MemoryEntry>,
    pub medium_term: Vec<MemoryEntry>,
    pub long_term: Vec<MemoryEntry>,
    pub max_tokens: usize,
    pub current_tokens: usize,
    /// Entries removed by [`ContextWindow::fit_to_budget`].
    #[serde(default)]
    pub dropped_count: usize,
}

impl ContextWindow {
    pub fn over_budget(&self) -> bool {
        self.current_tokens > self.max_tokens
    }

    pub fn len(&self) -> usize {
        self.short_term.len() + self.medium_term.len() + self.long_term.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Greedily keep short-term, then medium-term, then long-term entries
    /// while the running estimate stays within `max_tokens`.
    pub fn fit_to_budget(self) -> ContextWindow {
        let budget = self.max_tokens;
        let mut total_tokens = 0usize;
        let mut dropped_count = self.dropped_count;

        let mut pack = |entries: Vec<MemoryEntry>| -> Vec<MemoryEntry> {
            let mut kept = Vec::new();
            for entry in entries {
                let tokens = entry.estimated_tokens();
                if total_tokens + tokens <= budget {
                    total_tokens += tokens;
                    kept.push(entry);
                } else {
                    dropped_count += 1;
                }
            }
            kept
        };

        let short_term = pack(self.short_term);
        let medium_term = pack(self.medium_term);
        let long_term = pack(self.long_term);

        ContextWindow {
            short_term,
            medium_term,
            long_term,
            max_tokens: budget,
            current_tokens: total_tokens,
            dropped_count,
        }
    }

    /// Render the window as prompt sections.
    pub fn render(&self) -> String {
        let sections = [
            ("Conversation", &self.short_term),
            ("Context", &self.medium_term),
            ("Known about the user", &self.long_term),
        ];
        sections
            .iter()
            .filter(|(_, entries)| !entries.is_empty())
            .map(|(label, entries)| {
                let body = entries
                    .iter()
                    .map(|e| e.content.as_str())
                    .collect::<Vec<_>>()
                    .join("\n");
                format!("## {label}\n{body}")
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Build a window from the conversation history and already-retrieved memories.
pub fn build_context_window(
    history: &[Exchange],
    relevant: Vec<MemoryEntry>,
    max_tokens: usize,
    now: DateTime<Utc>,
) -> ContextWindow {
    let short_term: Vec<MemoryEntry> = history
        .iter()
        .map(|x| {
            MemoryEntry::new(
                format!("Q: {}\nA: {}", x.question, x.response),
                MemoryType::Context,
                now,
            )
            .with_importance(SHORT_TERM_IMPORTANCE)
        })
        .collect();

    let (long_term, medium_term): (Vec<MemoryEntry>, Vec<MemoryEntry>) =
        relevant.into_iter().partition(|e| e.kind.is_long_term());

    let current_tokens = short_term
        .iter()
        .chain(&medium_term)
        .chain(&long_term)
        .map(MemoryEntry::estimated_tokens)
        .sum();

    ContextWindow {
        short_term,
        medium_term,
        long_term,
        max_tokens,
        current_tokens,
        dropped_count: 0,
    }
}
