//! Persistence for the three logical state records.
//!
//! - `memories`: the retained memory list
//! - `profile`: the single user profile
//! - `context`: the current conversation, if any
//!
//! Backends store opaque JSON bytes per record. [`FsStateStorage`] writes a
//! directory of files; [`MemoryStateStorage`] keeps everything in process.

pub mod fakes;
pub mod fs;

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub use fakes::{FailingStateStorage, MemoryStateStorage};
pub use fs::FsStateStorage;

/// One of the independently persisted records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateRecord {
    Memories,
    Profile,
    Context,
}

impl StateRecord {
    pub const ALL: [StateRecord; 3] = [Self::Memories, Self::Profile, Self::Context];

    /// File stem used by file-backed storage.
    pub fn stem(self) -> &'static str {
        match self {
            Self::Memories => "memories",
            Self::Profile => "profile",
            Self::Context => "context",
        }
    }
}

impl fmt::Display for StateRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.stem())
    }
}

/// Errors from storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("digest mismatch for {record}: expected {expected}, got {actual}")]
    DigestMismatch {
        record: StateRecord,
        expected: String,
        actual: String,
    },

    #[error("corrupt state: {0}")]
    Corrupt(String),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Record-level state persistence.
///
/// Guarantees:
/// - `load` returns exactly the bytes of the last successful `save`.
/// - A record that was never saved, or was removed, loads as `None`.
pub trait StateStorage: Send + Sync {
    fn load(&self, record: StateRecord) -> StorageResult<Option<Vec<u8>>>;

    fn save(&self, record: StateRecord, data: &[u8]) -> StorageResult<()>;

    /// Delete a record. No-op if absent.
    fn remove(&self, record: StateRecord) -> StorageResult<()>;
}

/// Hex SHA-256 of `data`, used to detect torn or tampered files.
pub fn content_digest(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
