//! The `MemoryManager` facade.
//!
//! Owns the memory store, the user profile, and the current conversation
//! behind a single read-write lock, and persists each logical record through
//! a [`StateStorage`] backend. Construct one per process and share it by
//! `Arc`; there is no global instance.
//!
//! Loading is forgiving: a record that cannot be read or decoded is logged
//! and replaced by its default. Saving is not: write failures are logged
//! and returned to the caller.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::RecallConfig;
use crate::conversation::{ContextUpdate, ConversationContext, UserProfile};
use crate::error::{RecallError, Result};
use crate::memory::{
    build_context_window, learn_from_conversation, ContextWindow, LearningSummary, MemoryEntry,
    MemoryStore, MemoryType, NewMemory, RetrievalQuery,
};
use crate::obs::{self, ConversationSpan};
use crate::snapshot::{ExportedState, ImportedState};
use crate::storage::{FsStateStorage, MemoryStateStorage, StateRecord, StateStorage};

/// A memory paired with its current importance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedMemory {
    pub score: f64,
    pub entry: MemoryEntry,
}

/// Counts describing the manager's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub total_memories: usize,
    pub by_type: BTreeMap<String, usize>,
    pub max_memories: usize,
    pub frequent_topics: usize,
    pub conversation_active: bool,
    pub history_len: usize,
}

struct ManagerState {
    store: MemoryStore,
    profile: UserProfile,
    context: Option<ConversationContext>,
}

pub struct MemoryManager {
    config: RecallConfig,
    storage: Box<dyn StateStorage>,
    state: RwLock<ManagerState>,
}

impl MemoryManager {
    /// Restore state from `storage`, falling back to defaults per record.
    pub fn open(config: RecallConfig, storage: Box<dyn StateStorage>) -> Self {
        let memories: Vec<MemoryEntry> =
            load_record(storage.as_ref(), StateRecord::Memories).unwrap_or_default();
        let profile: UserProfile =
            load_record(storage.as_ref(), StateRecord::Profile).unwrap_or_default();
        let context: Option<ConversationContext> =
            load_record(storage.as_ref(), StateRecord::Context);

        debug!(
            memories = memories.len(),
            conversation_active = context.is_some(),
            "memory manager opened"
        );

        Self {
            config,
            storage,
            state: RwLock::new(ManagerState {
                store: MemoryStore::from_entries(memories),
                profile,
                context,
            }),
        }
    }

    /// Open file-backed state under `config.data_dir`.
    pub fn open_dir(config: RecallConfig) -> Result<Self> {
        let storage = FsStateStorage::new(&config.data_dir)?;
        Ok(Self::open(config, Box::new(storage)))
    }

    /// Non-durable manager for tests and ephemeral services.
    pub fn in_memory(config: RecallConfig) -> Self {
        Self::open(config, Box::new(MemoryStateStorage::new()))
    }

    pub fn config(&self) -> &RecallConfig {
        &self.config
    }

    // ---- MemoryStore ----

    /// Insert a memory, or reinforce the existing one with equal content and type.
    pub fn add_memory(
        &self,
        content: &str,
        kind: MemoryType,
        opts: NewMemory,
    ) -> Result<MemoryEntry> {
        let now = Utc::now();
        let mut state = self.state.write();
        let (entry, _) = state.store.add(content, kind, opts, now);
        self.persist_memories(&mut state, now)?;
        Ok(entry)
    }

    /// Ranked lexical retrieval. Returned memories are touched and persisted.
    pub fn retrieve_memories(&self, query: &RetrievalQuery) -> Result<Vec<MemoryEntry>> {
        let now = Utc::now();
        let mut state = self.state.write();
        let results = state.store.retrieve(query, now);
        self.persist_memories(&mut state, now)?;
        Ok(results)
    }

    /// Delete a single memory by id.
    pub fn forget(&self, id: &str) -> Result<MemoryEntry> {
        let now = Utc::now();
        let mut state = self.state.write();
        let removed = state.store.remove(id)?;
        self.persist_memories(&mut state, now)?;
        Ok(removed)
    }

    /// Memories ordered by current importance, optionally of one type.
    pub fn list_memories(&self, kind: Option<MemoryType>) -> Vec<RankedMemory> {
        let state = self.state.read();
        state
            .store
            .ranked(kind, Utc::now())
            .into_iter()
            .map(|(score, entry)| RankedMemory { score, entry })
            .collect()
    }

    // ---- Conversation ----

    /// Replace the current conversation with a fresh one.
    pub fn start_conversation(&self, topic: Option<&str>) -> Result<ConversationContext> {
        let mut state = self.state.write();
        let context = ConversationContext::start(topic, &state.profile, Utc::now());
        obs::emit_conversation_started(&context.id, &context.topic);
        state.context = Some(context.clone());
        self.persist_context(&state)?;
        Ok(context)
    }

    /// Fold an exchange into the current conversation, starting one if needed.
    pub fn update_context(
        &self,
        question: &str,
        response: &str,
        update: &ContextUpdate,
    ) -> Result<ConversationContext> {
        let now = Utc::now();
        let mut guard = self.state.write();
        let state = &mut *guard;

        let context = state.context.get_or_insert_with(|| {
            let context = ConversationContext::start(None, &state.profile, now);
            obs::emit_conversation_started(&context.id, &context.topic);
            context
        });
        let _span = ConversationSpan::enter(&context.id);
        context.record_exchange(question, response, update);
        let snapshot = context.clone();

        if !update.preferences.is_empty() {
            state.profile.merge_preferences(&update.preferences);
            self.persist_profile(state)?;
        }
        self.persist_context(state)?;
        Ok(snapshot)
    }

    /// Conversation history plus memories relevant to `query`.
    pub fn build_context_window(&self, query: &str) -> Result<ContextWindow> {
        let now = Utc::now();
        let mut guard = self.state.write();
        let state = &mut *guard;

        let retrieval = RetrievalQuery::new(query).with_limit(self.config.window_memory_limit);
        let relevant = state.store.retrieve(&retrieval, now);
        self.persist_memories(state, now)?;

        let history = state
            .context
            .as_ref()
            .map(|c| c.history.as_slice())
            .unwrap_or(&[]);
        Ok(build_context_window(history, relevant, self.config.max_tokens, now))
    }

    /// Prompt briefing for the current conversation; empty when there is none.
    pub fn get_context_for_prompt(&self) -> String {
        let state = self.state.read();
        state
            .context
            .as_ref()
            .map(ConversationContext::prompt_briefing)
            .unwrap_or_default()
    }

    /// Record durable facts, topic and expertise from the current conversation.
    ///
    /// Returns `None` when no conversation is active.
    pub fn learn_from_conversation(&self) -> Result<Option<LearningSummary>> {
        let now = Utc::now();
        let mut guard = self.state.write();
        let state = &mut *guard;

        let Some(context) = state.context.as_ref() else {
            return Ok(None);
        };
        let _span = ConversationSpan::enter(&context.id);
        let summary = learn_from_conversation(context, &mut state.store, &mut state.profile, now);
        obs::emit_conversation_learned(&summary.conversation_id, summary.facts_recorded);

        self.persist_memories(state, now)?;
        self.persist_profile(state)?;
        Ok(Some(summary))
    }

    pub fn profile(&self) -> UserProfile {
        self.state.read().profile.clone()
    }

    pub fn current_context(&self) -> Option<ConversationContext> {
        self.state.read().context.clone()
    }

    pub fn stats(&self) -> MemoryStats {
        let state = self.state.read();
        let mut by_type = BTreeMap::new();
        for entry in state.store.entries() {
            *by_type.entry(entry.kind.to_string()).or_insert(0) += 1;
        }
        MemoryStats {
            total_memories: state.store.len(),
            by_type,
            max_memories: self.config.max_memories,
            frequent_topics: state.profile.frequent_topics.len(),
            conversation_active: state.context.is_some(),
            history_len: state.context.as_ref().map_or(0, |c| c.history.len()),
        }
    }

    // ---- Lifecycle ----

    /// Forget everything: memories, profile, and the current conversation.
    pub fn clear(&self) -> Result<()> {
        let mut state = self.state.write();
        state.store.clear();
        state.profile = UserProfile::default();
        state.context = None;
        for record in StateRecord::ALL {
            self.storage.remove(record).map_err(|e| {
                obs::emit_persist_error(record, &e);
                RecallError::from(e)
            })?;
        }
        tracing::info!(event = "state.cleared");
        Ok(())
    }

    /// Serialize memories, profile and current conversation as JSON.
    pub fn export_memories(&self) -> Result<String> {
        let state = self.state.read();
        let exported = ExportedState {
            memories: state.store.entries().to_vec(),
            profile: state.profile.clone(),
            context: state.context.clone(),
            exported_at: Utc::now(),
        };
        Ok(serde_json::to_string_pretty(&exported)?)
    }

    /// Apply an export payload; `false` if it could not be parsed or saved.
    pub fn import_memories(&self, data: &str) -> bool {
        match self.try_import(data) {
            Ok(()) => true,
            Err(e) => {
                warn!(event = "state.import_failed", error = %e);
                false
            }
        }
    }

    /// Parse first, then apply memories, profile and context independently.
    ///
    /// Imported memories are merged and clamped the same way a load is.
    pub fn try_import(&self, data: &str) -> Result<()> {
        let imported = ImportedState::parse(data)
            .map_err(|e| RecallError::InvalidImport(e.to_string()))?;
        if imported.is_empty() {
            debug!(event = "state.import_empty");
            return Ok(());
        }

        let now = Utc::now();
        let mut state = self.state.write();
        if let Some(memories) = imported.memories {
            state.store = MemoryStore::from_entries(memories);
            self.persist_memories(&mut state, now)?;
        }
        if let Some(profile) = imported.profile {
            state.profile = profile;
            self.persist_profile(&state)?;
        }
        if let Some(context) = imported.context {
            state.context = Some(context);
            self.persist_context(&state)?;
        }
        Ok(())
    }

    // ---- Persistence ----

    // Capacity is enforced before every memory write.
    fn persist_memories(&self, state: &mut ManagerState, now: DateTime<Utc>) -> Result<()> {
        state.store.enforce_capacity(self.config.max_memories, now);
        let bytes = serde_json::to_vec(state.store.entries())?;
        self.save(StateRecord::Memories, &bytes)
    }

    fn persist_profile(&self, state: &ManagerState) -> Result<()> {
        let bytes = serde_json::to_vec(&state.profile)?;
        self.save(StateRecord::Profile, &bytes)
    }

    fn persist_context(&self, state: &ManagerState) -> Result<()> {
        match &state.context {
            Some(context) => {
                let bytes = serde_json::to_vec(context)?;
                self.save(StateRecord::Context, &bytes)
            }
            None => Ok(self.storage.remove(StateRecord::Context)?),
        }
    }

    fn save(&self, record: StateRecord, bytes: &[u8]) -> Result<()> {
        self.storage.save(record, bytes).map_err(|e| {
            obs::emit_persist_error(record, &e);
            RecallError::from(e)
        })
    }
}

fn load_record<T: DeserializeOwned>(storage: &dyn StateStorage, record: StateRecord) -> Option<T> {
    match storage.load(record) {
        Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                obs::emit_load_fallback(record, &e);
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            obs::emit_load_fallback(record, &e);
            None
        }
    }
}
