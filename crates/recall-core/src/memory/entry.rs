//! Memory entries and their categories.

use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Base importance when the caller supplies none.
pub const DEFAULT_IMPORTANCE: f64 = 0.5;
/// Importance gained each time an existing memory is observed again.
pub const REINFORCEMENT_STEP: f64 = 0.1;

/// The category of a memory. Fixed at creation; drives importance weighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    Fact,
    Preference,
    Context,
    Pattern,
    Correction,
}

impl MemoryType {
    pub const ALL: [MemoryType; 5] = [
        Self::Fact,
        Self::Preference,
        Self::Context,
        Self::Pattern,
        Self::Correction,
    ];

    /// Multiplier applied to the importance score for this category.
    pub fn weight(self) -> f64 {
        match self {
            Self::Preference => 1.5,
            Self::Correction => 1.3,
            Self::Fact => 1.2,
            Self::Pattern => 1.1,
            Self::Context => 0.8,
        }
    }

    /// Long-term memories outlive a single conversation.
    pub fn is_long_term(self) -> bool {
        !matches!(self, Self::Context)
    }
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fact => write!(f, "fact"),
            Self::Preference => write!(f, "preference"),
            Self::Context => write!(f, "context"),
            Self::Pattern => write!(f, "pattern"),
            Self::Correction => write!(f, "correction"),
        }
    }
}

impl FromStr for MemoryType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fact" => Ok(Self::Fact),
            "preference" => Ok(Self::Preference),
            "context" => Ok(Self::Context),
            "pattern" => Ok(Self::Pattern),
            "correction" => Ok(Self::Correction),
            other => Err(format!("unknown memory type: {other}")),
        }
    }
}

/// A single retained memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MemoryType,
    pub content: String,
    /// Caller-supplied base weight in `[0, 1]`.
    pub importance: f64,
    pub created: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub access_count: u32,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_conversation: Option<String>,
}

impl MemoryEntry {
    /// Create a fresh entry observed once at `now`.
    pub fn new(content: impl Into<String>, kind: MemoryType, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            content: content.into(),
            importance: DEFAULT_IMPORTANCE,
            created: now,
            last_accessed: now,
            access_count: 1,
            tags: BTreeSet::new(),
            source_conversation: None,
        }
    }

    /// Set the base weight. Non-finite values fall back to [`DEFAULT_IMPORTANCE`].
    pub fn with_importance(mut self, importance: f64) -> Self {
        self.importance = sanitize_importance(importance);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_source(mut self, conversation_id: impl Into<String>) -> Self {
        self.source_conversation = Some(conversation_id.into());
        self
    }

    /// Whether `content`/`kind` identify this entry (content compared case-insensitively).
    pub fn matches(&self, content: &str, kind: MemoryType) -> bool {
        self.kind == kind && self.content.to_lowercase() == content.to_lowercase()
    }

    /// Record an access at `now`.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_accessed = now;
        self.access_count = self.access_count.saturating_add(1);
    }

    /// Record a repeated observation: an access plus an importance bump.
    pub fn reinforce(&mut self, now: DateTime<Utc>) {
        self.touch(now);
        self.importance = (self.importance + REINFORCEMENT_STEP).min(1.0);
    }

    /// Token estimate for the content (~4 chars per token).
    pub fn estimated_tokens(&self) -> usize {
        estimate_tokens(&self.content)
    }
}

/// Options accepted when adding a memory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewMemory {
    pub importance: Option<f64>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub source_conversation: Option<String>,
}

impl NewMemory {
    pub fn with_importance(mut self, importance: f64) -> Self {
        self.importance = Some(importance);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_source(mut self, conversation_id: impl Into<String>) -> Self {
        self.source_conversation = Some(conversation_id.into());
        self
    }
}

/// Clamp `importance` into `[0, 1]`, mapping NaN and infinities to the default.
pub fn sanitize_importance(importance: f64) -> f64 {
    if importance.is_finite() {
        importance.clamp(0.0, 1.0)
    } else {
        DEFAULT_IMPORTANCE
    }
}

/// Estimate token count from text (~4 chars per token heuristic).
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}
