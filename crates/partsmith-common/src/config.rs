//! Runtime configuration model for Partsmith containers.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CompositionError, Result};

/// Strategy the container uses to walk a composition's bindings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Walk the bound composable parts on every request.
    #[default]
    Interpretive,
    /// Use a precompiled resolution plan.
    Compiled,
}

/// Root configuration for a Partsmith container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Resolution strategy.
    #[serde(default)]
    pub provider: ProviderKind,
    /// Persisted plan to load when `provider` is `Compiled`.
    ///
    /// When unset, the plan is compiled in memory from the composition.
    #[serde(default)]
    pub plan_path: Option<PathBuf>,
}

impl RuntimeConfig {
    /// Configuration selecting the compiled strategy with an in-memory plan.
    #[must_use]
    pub const fn compiled() -> Self {
        Self {
            provider: ProviderKind::Compiled,
            plan_path: None,
        }
    }

    /// Loads a configuration from a JSON file.
    ///
    /// Missing fields take their default values.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CompositionError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config = serde_json::from_str(&content)?;
        tracing::debug!(path = %path.display(), "runtime configuration loaded");
        Ok(config)
    }
}
