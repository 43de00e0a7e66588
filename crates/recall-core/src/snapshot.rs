//! Full-state export and partial-tolerant import payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::conversation::{ConversationContext, UserProfile};
use crate::memory::MemoryEntry;

/// Everything the manager holds, as written by an export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedState {
    pub memories: Vec<MemoryEntry>,
    pub profile: UserProfile,
    pub context: Option<ConversationContext>,
    pub exported_at: DateTime<Utc>,
}

/// An import payload. Each field is applied only when present and non-null.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ImportedState {
    #[serde(default)]
    pub memories: Option<Vec<MemoryEntry>>,
    #[serde(default)]
    pub profile: Option<UserProfile>,
    #[serde(default)]
    pub context: Option<ConversationContext>,
}

impl ImportedState {
    pub fn parse(data: &str) -> serde_json::Result<Self> {
        serde_json::from_str(data)
    }

    /// Whether the payload names no record at all.
    pub fn is_empty(&self) -> bool {
        self.memories.is_none() && self.profile.is_none() && self.context.is_none()
    }
}
