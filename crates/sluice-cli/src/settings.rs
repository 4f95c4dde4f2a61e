//! CLI settings, loaded once at startup from an optional JSON file.

use std::path::Path;

use serde::{Deserialize, Serialize};
use sluice_core::app::{FaultPolicy, ReadNodeSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessorKind {
    #[default]
    Identity,
    Uppercase,
    Explode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliSettings {
    pub source: ReadNodeSettings,
    /// Maximum lines per batch.
    pub batch_size: usize,
    pub processor: ProcessorKind,
    pub fault_policy: FaultPolicy,
    /// Wrap each cycle in an in-memory transaction.
    pub transactional: bool,
}

impl Default for CliSettings {
    fn default() -> Self {
        Self {
            source: ReadNodeSettings {
                name: "stdin".to_string(),
                ..ReadNodeSettings::default()
            },
            batch_size: 100,
            processor: ProcessorKind::default(),
            fault_policy: FaultPolicy::default(),
            transactional: true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("cannot read settings file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid settings in {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error("batch_size must be greater than zero")]
    ZeroBatchSize,
}

impl CliSettings {
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let settings = match path {
            Some(path) => {
                let display = path.display().to_string();
                let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
                    path: display.clone(),
                    source,
                })?;
                Self::from_json(&raw).map_err(|source| SettingsError::Parse {
                    path: display,
                    source,
                })?
            }
            None => Self::default(),
        };

        if settings.batch_size == 0 {
            return Err(SettingsError::ZeroBatchSize);
        }
        Ok(settings)
    }

    fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
