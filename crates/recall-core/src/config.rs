//! Runtime configuration.
//!
//! Defaults suit a single local user.
//! [`RecallConfig::from_env`] overlays `RECALL_*` environment variables.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{RecallError, Result};

/// Default retention ceiling for persisted memories.
pub const DEFAULT_MAX_MEMORIES: usize = 1000;
/// Default advisory token budget for context windows.
pub const DEFAULT_MAX_TOKENS: usize = 4000;
/// Default number of memories pulled into a context window.
pub const DEFAULT_WINDOW_MEMORY_LIMIT: usize = 15;

/// Recall configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecallConfig {
    /// Directory holding the persisted state records.
    pub data_dir: PathBuf,
    /// Maximum memories kept on every persist.
    pub max_memories: usize,
    /// Advisory token budget reported on context windows.
    pub max_tokens: usize,
    /// How many memories a context window retrieves.
    pub window_memory_limit: usize,
    /// Idle timeout for a service connection, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for RecallConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".recall"),
            max_memories: DEFAULT_MAX_MEMORIES,
            max_tokens: DEFAULT_MAX_TOKENS,
            window_memory_limit: DEFAULT_WINDOW_MEMORY_LIMIT,
            request_timeout_secs: 30,
        }
    }
}

impl RecallConfig {
    /// Defaults overlaid with any `RECALL_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(dir) = std::env::var("RECALL_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(v) = env_parse("RECALL_MAX_MEMORIES")? {
            config.max_memories = v;
        }
        if let Some(v) = env_parse("RECALL_MAX_TOKENS")? {
            config.max_tokens = v;
        }
        if let Some(v) = env_parse("RECALL_WINDOW_LIMIT")? {
            config.window_memory_limit = v;
        }
        if let Some(v) = env_parse("RECALL_TIMEOUT_SECS")? {
            config.request_timeout_secs = v;
        }
        Ok(config)
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_max_memories(mut self, max: usize) -> Self {
        self.max_memories = max;
        self
    }

    pub fn with_max_tokens(mut self, max: usize) -> Self {
        self.max_tokens = max;
        self
    }
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| RecallError::Config {
                key: key.to_string(),
                value: raw,
            }),
        Err(_) => Ok(None),
    }
}
