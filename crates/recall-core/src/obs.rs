//! Structured observability hooks for memory and conversation events.
//!
//! This module provides:
//! - Conversation-scoped tracing spans via the `ConversationSpan` RAII guard
//! - Emission functions for key events: memory added/reinforced/retrieved,
//!   capacity enforcement, conversation start and learning, storage faults
//!
//! Events are emitted with an `event` field so they can be filtered in
//! JSON log pipelines (`RUST_LOG`, `--json`).

use tracing::{info, warn};

use crate::memory::MemoryType;
use crate::storage::StateRecord;

/// RAII guard that enters a conversation-scoped tracing span.
///
/// ```ignore
/// let _span = ConversationSpan::enter("conv-123");
/// // tracing calls are now associated with conversation_id = "conv-123"
/// ```
pub struct ConversationSpan {
    _span: tracing::span::EnteredSpan,
}

impl ConversationSpan {
    pub fn enter(conversation_id: &str) -> Self {
        let span = tracing::info_span!("recall.conversation", conversation_id = %conversation_id);
        Self {
            _span: span.entered(),
        }
    }
}

pub fn emit_memory_added(id: &str, kind: MemoryType, importance: f64) {
    info!(event = "memory.added", id = %id, kind = %kind, importance = importance);
}

/// Emit event: a duplicate insert merged into an existing memory.
pub fn emit_memory_reinforced(id: &str, access_count: u32, importance: f64) {
    info!(
        event = "memory.reinforced",
        id = %id,
        access_count = access_count,
        importance = importance,
    );
}

pub fn emit_memories_retrieved(query_tokens: usize, returned: usize) {
    tracing::debug!(
        event = "memory.retrieved",
        query_tokens = query_tokens,
        returned = returned,
    );
}

pub fn emit_capacity_enforced(removed: usize, remaining: usize) {
    info!(
        event = "memory.capacity_enforced",
        removed = removed,
        remaining = remaining,
    );
}

pub fn emit_conversation_started(conversation_id: &str, topic: &str) {
    info!(event = "conversation.started", conversation_id = %conversation_id, topic = %topic);
}

pub fn emit_conversation_learned(conversation_id: &str, facts: usize) {
    info!(event = "conversation.learned", conversation_id = %conversation_id, facts = facts);
}

/// Emit event: a state record failed to persist (warning level).
pub fn emit_persist_error(record: StateRecord, error: &dyn std::fmt::Display) {
    warn!(event = "state.persist_error", record = %record, error = %error);
}

/// Emit event: a state record failed to load and its default was used.
pub fn emit_load_fallback(record: StateRecord, error: &dyn std::fmt::Display) {
    warn!(event = "state.load_fallback", record = %record, error = %error);
}
