//! The active conversation: rolling history, entities, key points, and the
//! per-message expertise and tone readings.

pub mod classify;
pub mod profile;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use classify::{classify_expertise, classify_tone, ExpertiseLevel, Tone};
pub use profile::UserProfile;

/// Topic used when a conversation starts without one.
pub const DEFAULT_TOPIC: &str = "General";
/// Question/response pairs kept in history.
pub const MAX_HISTORY: usize = 10;
/// Key points kept on the context.
pub const MAX_KEY_POINTS: usize = 20;
/// Key points rendered into the prompt briefing.
const PROMPT_KEY_POINTS: usize = 5;

/// One question and the response it received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    pub question: String,
    pub response: String,
}

/// Extra signals extracted from an exchange.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextUpdate {
    #[serde(default)]
    pub entities: Vec<String>,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub preferences: BTreeMap<String, Value>,
}

impl ContextUpdate {
    pub fn with_entities<I, S>(mut self, entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entities = entities.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_key_points<I, S>(mut self, key_points: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.key_points = key_points.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_preference(mut self, key: impl Into<String>, value: Value) -> Self {
        self.preferences.insert(key.into(), value);
        self
    }
}

/// Live state of the current dialogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    pub id: String,
    pub topic: String,
    /// Insertion-ordered, de-duplicated.
    #[serde(default)]
    pub entities: Vec<String>,
    #[serde(default)]
    pub key_points: Vec<String>,
    /// Snapshot of profile preferences at start, plus per-exchange updates.
    #[serde(default)]
    pub user_preferences: BTreeMap<String, Value>,
    /// Oldest first.
    #[serde(default)]
    pub history: Vec<Exchange>,
    #[serde(default)]
    pub emotional_tone: Tone,
    #[serde(default)]
    pub expertise: ExpertiseLevel,
    pub started_at: DateTime<Utc>,
}

impl ConversationContext {
    /// Start a conversation seeded with a copy of the profile's preferences.
    pub fn start(topic: Option<&str>, profile: &UserProfile, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            topic: topic.unwrap_or(DEFAULT_TOPIC).to_string(),
            entities: Vec::new(),
            key_points: Vec::new(),
            user_preferences: profile.preferences.clone(),
            history: Vec::new(),
            emotional_tone: Tone::default(),
            expertise: ExpertiseLevel::default(),
            started_at: now,
        }
    }

    pub fn previous_questions(&self) -> impl Iterator<Item = &str> {
        self.history.iter().map(|x| x.question.as_str())
    }

    pub fn previous_responses(&self) -> impl Iterator<Item = &str> {
        self.history.iter().map(|x| x.response.as_str())
    }

    /// Fold one exchange into the context.
    ///
    /// Expertise and tone are re-derived from `question` alone.
    pub fn record_exchange(&mut self, question: &str, response: &str, update: &ContextUpdate) {
        self.history.push(Exchange {
            question: question.to_string(),
            response: response.to_string(),
        });
        trim_front(&mut self.history, MAX_HISTORY);

        for entity in &update.entities {
            if !self.entities.contains(entity) {
                self.entities.push(entity.clone());
            }
        }

        self.key_points.extend(update.key_points.iter().cloned());
        trim_front(&mut self.key_points, MAX_KEY_POINTS);

        for (k, v) in &update.preferences {
            self.user_preferences.insert(k.clone(), v.clone());
        }

        self.expertise = classify_expertise(question);
        self.emotional_tone = classify_tone(question);
    }

    /// Human-readable briefing for a system prompt. May be empty.
    pub fn prompt_briefing(&self) -> String {
        let mut sections = Vec::new();

        if !self.key_points.is_empty() {
            let start = self.key_points.len().saturating_sub(PROMPT_KEY_POINTS);
            let bullets = self.key_points[start..]
                .iter()
                .map(|p| format!("- {p}"))
                .collect::<Vec<_>>()
                .join("\n");
            sections.push(format!("Key points from this conversation:\n{bullets}"));
        }

        if let Some(guidance) = self.expertise.guidance() {
            sections.push(format!("User expertise: {}. {guidance}", self.expertise));
        }

        if let Some(guidance) = self.emotional_tone.guidance() {
            sections.push(format!("User tone: {}. {guidance}", self.emotional_tone));
        }

        sections.join("\n\n")
    }
}

fn trim_front<T>(items: &mut Vec<T>, cap: usize) {
    if items.len() > cap {
        let excess = items.len() - cap;
        items.drain(..excess);
    }
}
