//! Expertise and tone classifiers.
//!
//! Both are pure functions of a single piece of text; nothing accumulates
//! across calls.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

const EXPERT_TERMS: &[&str] = &[
    "architecture",
    "infrastructure",
    "optimization",
    "implementation",
    "algorithm",
    "protocol",
    "framework",
];

const BEGINNER_PHRASES: &[&str] = &[
    "what is",
    "how do i",
    "explain",
    "basic",
    "simple",
    "easy",
    "help me understand",
];

/// Tone categories in priority order; the first match wins.
const TONE_RULES: &[(Tone, &str)] = &[
    (Tone::Urgent, r"urgent|asap|quickly|emergency|help"),
    (Tone::Confused, r"confused|don'?t understand|unclear"),
    (Tone::Frustrated, r"frustrated|annoying|doesn'?t work"),
    (Tone::Curious, r"curious|wondering|interested"),
    (Tone::Positive, r"thanks|appreciate|great"),
];

/// Detected expertise of the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpertiseLevel {
    Beginner,
    #[default]
    Intermediate,
    Expert,
}

impl ExpertiseLevel {
    /// Prompt instruction for this level, if it warrants one.
    pub fn guidance(self) -> Option<&'static str> {
        match self {
            Self::Beginner => {
                Some("Explain concepts step by step in plain language and avoid jargon.")
            }
            Self::Expert => {
                Some("Use precise technical language and skip introductory explanations.")
            }
            Self::Intermediate => None,
        }
    }
}

impl std::fmt::Display for ExpertiseLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Beginner => write!(f, "beginner"),
            Self::Intermediate => write!(f, "intermediate"),
            Self::Expert => write!(f, "expert"),
        }
    }
}

/// Detected emotional tone of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Urgent,
    Confused,
    Frustrated,
    Curious,
    Positive,
    #[default]
    Neutral,
}

impl Tone {
    /// Prompt instruction for this tone, if it warrants one.
    pub fn guidance(self) -> Option<&'static str> {
        match self {
            Self::Urgent => Some("Be concise and lead with the actionable answer."),
            Self::Confused => Some("Clarify carefully and check each step is understood."),
            Self::Frustrated => {
                Some("Acknowledge the difficulty and focus on a working solution.")
            }
            Self::Curious => Some("Offer extra depth and related ideas worth exploring."),
            Self::Positive => Some("Keep the friendly, encouraging tone."),
            Self::Neutral => None,
        }
    }
}

impl std::fmt::Display for Tone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Urgent => write!(f, "urgent"),
            Self::Confused => write!(f, "confused"),
            Self::Frustrated => write!(f, "frustrated"),
            Self::Curious => write!(f, "curious"),
            Self::Positive => write!(f, "positive"),
            Self::Neutral => write!(f, "neutral"),
        }
    }
}

fn term_patterns(cell: &'static OnceLock<Vec<Regex>>, terms: &[&str]) -> &'static [Regex] {
    cell.get_or_init(|| {
        terms
            .iter()
            .filter_map(|t| Regex::new(&format!("(?i){}", regex::escape(t))).ok())
            .collect()
    })
}

fn count_matches(patterns: &[Regex], text: &str) -> usize {
    patterns.iter().map(|re| re.find_iter(text).count()).sum()
}

/// Classify expertise from vocabulary: more than two expert terms means
/// expert, more than one beginner phrase means beginner.
pub fn classify_expertise(text: &str) -> ExpertiseLevel {
    static EXPERT: OnceLock<Vec<Regex>> = OnceLock::new();
    static BEGINNER: OnceLock<Vec<Regex>> = OnceLock::new();

    let expert_hits = count_matches(term_patterns(&EXPERT, EXPERT_TERMS), text);
    let beginner_hits = count_matches(term_patterns(&BEGINNER, BEGINNER_PHRASES), text);

    if expert_hits > 2 {
        ExpertiseLevel::Expert
    } else if beginner_hits > 1 {
        ExpertiseLevel::Beginner
    } else {
        ExpertiseLevel::Intermediate
    }
}

/// Classify tone; categories are checked in fixed priority order.
pub fn classify_tone(text: &str) -> Tone {
    static RULES: OnceLock<Vec<(Tone, Regex)>> = OnceLock::new();
    let rules = RULES.get_or_init(|| {
        TONE_RULES
            .iter()
            .filter_map(|(tone, pattern)| {
                Regex::new(&format!("(?i){pattern}"))
                    .ok()
                    .map(|re| (*tone, re))
            })
            .collect()
    });

    rules
        .iter()
        .find(|(_, re)| re.is_match(text))
        .map(|(tone, _)| *tone)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expert_needs_more_than_two_terms() {
        assert_eq!(
            classify_expertise("The protocol implementation needs a new algorithm"),
            ExpertiseLevel::Expert
        );
        assert_eq!(
            classify_expertise("protocol and algorithm"),
            ExpertiseLevel::Intermediate
        );
    }

    #[test]
    fn test_repeated_terms_count_each_time() {
        assert_eq!(
            classify_expertise("framework vs framework vs Framework"),
            ExpertiseLevel::Expert
        );
    }

    #[test]
    fn test_beginner_needs_more_than_one_phrase() {
        assert_eq!(
            classify_expertise("What is a closure? Please explain simply."),
            ExpertiseLevel::Beginner
        );
        assert_eq!(
            classify_expertise("explain closures"),
            ExpertiseLevel::Intermediate
        );
    }

    #[test]
    fn test_expert_checked_before_beginner() {
        assert_eq!(
            classify_expertise("what is the basic architecture, infrastructure and protocol here"),
            ExpertiseLevel::Expert
        );
    }

    #[test]
    fn test_tone_priority() {
        assert_eq!(
            classify_tone("I'm confused and frustrated, this doesn't work"),
            Tone::Confused
        );
        assert_eq!(
            classify_tone("This is urgent and I'm confused"),
            Tone::Urgent
        );
        assert_eq!(classify_tone("this doesn't work at all"), Tone::Frustrated);
        assert_eq!(classify_tone("I'm curious about lifetimes"), Tone::Curious);
        assert_eq!(classify_tone("Thanks, that was great"), Tone::Positive);
        assert_eq!(classify_tone("Show me the config file"), Tone::Neutral);
    }

    #[test]
    fn test_tone_is_case_insensitive() {
        assert_eq!(classify_tone("ASAP please"), Tone::Urgent);
    }

    #[test]
    fn test_guidance_only_for_non_default() {
        assert!(ExpertiseLevel::Intermediate.guidance().is_none());
        assert!(ExpertiseLevel::Beginner.guidance().is_some());
        assert!(Tone::Neutral.guidance().is_none());
        assert!(Tone::Frustrated.guidance().is_some());
    }
}
