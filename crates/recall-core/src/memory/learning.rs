//! Turning a finished conversation into durable memories.
//!
//! Substantial key points become fact memories tagged with the
//! conversation's entities, the topic is recorded on the profile, and the
//! detected expertise is attributed to the first entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entry::{MemoryType, NewMemory};
use super::store::MemoryStore;
use crate::conversation::{ConversationContext, ExpertiseLevel, UserProfile, DEFAULT_TOPIC};

/// Key points at or below this many chars are not worth remembering.
pub const MIN_KEY_POINT_CHARS: usize = 20;
/// Base importance of facts learned from a conversation.
pub const LEARNED_FACT_IMPORTANCE: f64 = 0.6;

/// What a learning pass recorded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearningSummary {
    pub conversation_id: String,
    pub facts_recorded: usize,
    pub topic_recorded: Option<String>,
    pub expertise_recorded: Option<(String, ExpertiseLevel)>,
}

/// Extract facts, topic and expertise from `context`.
pub fn learn_from_conversation(
    context: &ConversationContext,
    store: &mut MemoryStore,
    profile: &mut UserProfile,
    now: DateTime<Utc>,
) -> LearningSummary {
    let mut summary = LearningSummary {
        conversation_id: context.id.clone(),
        ..Default::default()
    };

    for point in &context.key_points {
        if point.chars().count() <= MIN_KEY_POINT_CHARS {
            continue;
        }
        let opts = NewMemory::default()
            .with_importance(LEARNED_FACT_IMPORTANCE)
            .with_tags(context.entities.iter().cloned())
            .with_source(context.id.clone());
        store.add(point, MemoryType::Fact, opts, now);
        summary.facts_recorded += 1;
    }

    if context.topic != DEFAULT_TOPIC {
        profile.record_topic(&context.topic);
        summary.topic_recorded = Some(context.topic.clone());
    }

    // Only the first entity is credited with the detected expertise.
    if let Some(domain) = context.entities.first() {
        profile.set_expertise(domain, context.expertise);
        summary.expertise_recorded = Some((domain.clone(), context.expertise));
    }

    summary
}
