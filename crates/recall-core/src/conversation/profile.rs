//! Long-lived user profile.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::classify::ExpertiseLevel;

/// Most recent unique topics retained on the profile.
pub const MAX_FREQUENT_TOPICS: usize = 20;

/// Cross-conversation aggregate of preferences, expertise and topics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub preferences: BTreeMap<String, Value>,
    /// Expertise per domain entity.
    #[serde(default)]
    pub expertise: BTreeMap<String, ExpertiseLevel>,
    pub communication_style: String,
    #[serde(default)]
    pub interests: Vec<String>,
    /// Oldest first.
    #[serde(default)]
    pub frequent_topics: Vec<String>,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            id: "default".to_string(),
            preferences: BTreeMap::new(),
            expertise: BTreeMap::new(),
            communication_style: "balanced".to_string(),
            interests: Vec::new(),
            frequent_topics: Vec::new(),
        }
    }
}

impl UserProfile {
    pub fn merge_preferences(&mut self, preferences: &BTreeMap<String, Value>) {
        for (k, v) in preferences {
            self.preferences.insert(k.clone(), v.clone());
        }
    }

    /// Record a topic as most recent, dropping the oldest beyond the cap.
    pub fn record_topic(&mut self, topic: &str) {
        self.frequent_topics.retain(|t| t != topic);
        self.frequent_topics.push(topic.to_string());
        if self.frequent_topics.len() > MAX_FREQUENT_TOPICS {
            let excess = self.frequent_topics.len() - MAX_FREQUENT_TOPICS;
            self.frequent_topics.drain(..excess);
        }
    }

    pub fn set_expertise(&mut self, domain: &str, level: ExpertiseLevel) {
        self.expertise.insert(domain.to_string(), level);
    }
}
