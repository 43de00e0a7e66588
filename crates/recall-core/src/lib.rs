//! Recall Core Library
//!
//! Retains, scores, decays, and retrieves what an assistant learns during
//! conversations, and assembles bounded context windows for new requests.
//!
//! The entry point is [`MemoryManager`]; the pure building blocks
//! (scoring, retrieval, classifiers, window assembly) live in [`memory`]
//! and [`conversation`].

pub mod config;
pub mod conversation;
pub mod error;
pub mod manager;
pub mod memory;
pub mod metrics;
pub mod obs;
pub mod rpc;
pub mod snapshot;
pub mod storage;
pub mod telemetry;

pub use config::RecallConfig;
pub use conversation::{
    classify_expertise, classify_tone, ContextUpdate, ConversationContext, Exchange,
    ExpertiseLevel, Tone, UserProfile,
};
pub use error::{RecallError, Result};
pub use manager::{MemoryManager, MemoryStats, RankedMemory};
pub use memory::{
    calculate_importance, ContextWindow, LearningSummary, MemoryEntry, MemoryStore, MemoryType,
    NewMemory, RetrievalQuery,
};
pub use metrics::METRICS;
pub use rpc::{dispatch, Request, Response};
pub use snapshot::{ExportedState, ImportedState};
pub use storage::{
    FailingStateStorage, FsStateStorage, MemoryStateStorage, StateRecord, StateStorage,
    StorageError,
};
pub use telemetry::init_tracing;

/// Recall version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
