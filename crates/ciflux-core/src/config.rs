use crate::error::{CiError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File name looked up in the working directory by [`Settings::discover`].
pub const SETTINGS_FILE: &str = "ciflux.toml";

/// Defaults applied while normalizing a pipeline definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Settings {
    /// Stage given to jobs when no stage is declared anywhere
    #[serde(default = "default_stage")]
    pub default_stage: String,

    /// Image used when the pipeline does not name one
    #[serde(default = "default_image")]
    pub default_image: String,

    /// Artifact archive name when a job does not set one
    #[serde(default = "default_artifact_name")]
    pub default_artifact_name: String,

    /// Artifact expiry when a job does not set one
    #[serde(default = "default_artifact_expire_in")]
    pub default_artifact_expire_in: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_stage: default_stage(),
            default_image: default_image(),
            default_artifact_name: default_artifact_name(),
            default_artifact_expire_in: default_artifact_expire_in(),
        }
    }
}

fn default_stage() -> String {
    "test".to_string()
}

fn default_image() -> String {
    "local_system_shell".to_string()
}

fn default_artifact_name() -> String {
    "${CI_JOB_NAME}_${CI_COMMIT_REF_NAME}_${CI_JOB_ID}".to_string()
}

fn default_artifact_expire_in() -> String {
    "3 days".to_string()
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CiError::Config(format!(
                "Failed to read settings file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&content).map_err(|e| match e {
            CiError::Config(msg) => CiError::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    /// Parse settings from TOML text. Missing keys keep their defaults.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| CiError::Config(e.to_string()))
    }

    /// Load from `path` when given, otherwise from [`SETTINGS_FILE`] in `dir`
    /// if present, otherwise the built-in defaults.
    pub fn discover(path: Option<&Path>, dir: &Path) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }

        let candidate = dir.join(SETTINGS_FILE);
        if candidate.is_file() {
            log::debug!("Using settings from {}", candidate.display());
            return Self::load(&candidate);
        }

        Ok(Self::default())
    }
}
