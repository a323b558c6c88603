//! Panel configuration, stored as camelCase JSON next to the studio binary.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::capture::CaptureSettings;
use crate::status::DEFAULT_STATUS_CAPACITY;
use crate::transport::{Endpoint, DEFAULT_PATH};

pub const DEFAULT_CONFIG_PATH: &str = "config/voice_settings.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteConfig {
    pub ip_address: String,
    pub port_number: u16,
    pub path: String,
    pub capture_dir: PathBuf,
    pub capture_prefix: String,
    pub status_capacity: usize,
    pub panel_name: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            ip_address: "localhost".to_string(),
            port_number: 8889,
            path: DEFAULT_PATH.to_string(),
            capture_dir: PathBuf::from("."),
            capture_prefix: "studio".to_string(),
            status_capacity: DEFAULT_STATUS_CAPACITY,
            panel_name: "Voice Panel".to_string(),
        }
    }
}

impl RemoteConfig {
    /// Reads the config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("Config {} not found, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let config = Self::from_json(&text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.ip_address.clone(), self.port_number).with_path(self.path.clone())
    }

    pub fn capture_settings(&self) -> CaptureSettings {
        CaptureSettings::new(self.capture_dir.clone(), self.capture_prefix.clone())
    }
}
