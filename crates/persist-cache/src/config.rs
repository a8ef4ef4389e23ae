use serde::{Deserialize, Serialize};

use crate::error::{CacheError, CacheResult};

/// What happens when the coordinator rejects the release notification sent
/// during a voluntary deactivation.
///
/// In both modes the object is ghostified; forgetting state is never blocked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeactivationErrors {
    /// Log the failure and keep it on the object for later inspection.
    #[default]
    Record,
    /// Return the failure to the caller after ghostifying.
    Propagate,
}

/// Configuration for a [`Cache`](crate::Cache).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Number of materialized objects an incremental GC pass evicts down to.
    pub target_size: usize,
    /// Handling of release-notification failures during deactivation.
    pub deactivation_errors: DeactivationErrors,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            target_size: 400,
            deactivation_errors: DeactivationErrors::Record,
        }
    }
}

impl CacheConfig {
    /// Parse a configuration from TOML. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> CacheResult<Self> {
        toml::from_str(s).map_err(|e| CacheError::Config(e.to_string()))
    }

    pub fn with_target_size(mut self, target_size: usize) -> Self {
        self.target_size = target_size;
        self
    }

    pub fn with_deactivation_errors(mut self, mode: DeactivationErrors) -> Self {
        self.deactivation_errors = mode;
        self
    }
}
