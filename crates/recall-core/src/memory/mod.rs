//! Memory subsystem: entries, decay-aware scoring, retrieval, retention,
//! context windows, and learning from conversations.

pub mod context;
pub mod entry;
pub mod importance;
pub mod learning;
pub mod retention;
pub mod store;

pub use context::{build_context_window, ContextWindow};
pub use entry::{estimate_tokens, sanitize_importance, MemoryEntry, MemoryType, NewMemory};
pub use importance::calculate_importance;
pub use learning::{learn_from_conversation, LearningSummary};
pub use retention::{enforce_capacity, CompactionResult};
pub use store::{relevance_score, tokenize, AddOutcome, MemoryStore, RetrievalQuery};
