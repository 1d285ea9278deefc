//! Revision log configuration.

use folio_core::{DiffGranularity, RevisionError};
use serde::{Deserialize, Serialize};

/// Tunables for [`crate::RevisionService`].
///
/// Every field has a serde default, so a host can embed a partial
/// `"revisions": { ... }` block in its own config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RevisionConfig {
    /// Longest resolved chain a commit may extend. Once the base chain holds
    /// this many records the next commit is stored as a snapshot (default: 20)
    pub snapshot_interval: u32,
    /// Diff unit for delta payloads (default: words)
    pub diff_granularity: DiffGranularity,
    /// Materialized revisions kept in memory; 0 disables the cache (default: 256)
    pub cache_capacity: usize,
    /// Page size for `history` when the caller passes none (default: 50)
    pub history_limit: usize,
}

impl Default for RevisionConfig {
    fn default() -> Self {
        Self {
            snapshot_interval: 20,
            diff_granularity: DiffGranularity::default(),
            cache_capacity: 256,
            history_limit: 50,
        }
    }
}

impl RevisionConfig {
    /// Small interval and cache so tests cross snapshot boundaries quickly.
    pub fn for_testing() -> Self {
        Self {
            snapshot_interval: 4,
            diff_granularity: DiffGranularity::Words,
            cache_capacity: 16,
            history_limit: 10,
        }
    }

    /// Parse and validate a JSON config block.
    pub fn from_json_str(json: &str) -> Result<Self, RevisionError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| RevisionError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RevisionError> {
        if self.snapshot_interval == 0 {
            return Err(RevisionError::Config(
                "snapshot_interval must be at least 1".into(),
            ));
        }
        if self.history_limit == 0 {
            return Err(RevisionError::Config("history_limit must be at least 1".into()));
        }
        Ok(())
    }
}
