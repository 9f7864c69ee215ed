//! Simulation configuration, loadable from TOML.
//!
//! Every field has a default, so a config file only needs the keys it
//! changes:
//!
//! ```toml
//! max_steps_per_advance = 4
//! removal_policy = "refund"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

/// What happens to items held inside a building when it is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalPolicy {
    /// Held items are lost; an `ItemsDiscarded` event reports them.
    #[default]
    Discard,
    /// Held items go to the player inventory.
    Refund,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimConfig {
    /// Cap on steps run by a single `advance` call. Due steps beyond the
    /// cap are dropped rather than carried over.
    pub max_steps_per_advance: u32,
    pub removal_policy: RemovalPolicy,
    /// Return the construction cost to the player when a building is
    /// removed.
    pub refund_on_remove: bool,
    /// Capacity of the event queue.
    pub event_capacity: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            max_steps_per_advance: 5,
            removal_policy: RemovalPolicy::Discard,
            refund_on_remove: true,
            event_capacity: 1024,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("max_steps_per_advance must be at least 1")]
    ZeroStepCap,
}

impl SimConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_steps_per_advance == 0 {
            return Err(ConfigError::ZeroStepCap);
        }
        Ok(())
    }
}
