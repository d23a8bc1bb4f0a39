pub mod device_config;
pub mod escalation_config;
pub mod location_config;

use std::path::{Path, PathBuf};

use anyhow::Result;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::config::device_config::DeviceConfig;
use crate::config::escalation_config::EscalationConfig;
use crate::config::location_config::LocationConfig;
use crate::utils::write_atomically;

pub const CONFIG_FILE_NAME: &str = "monitor_config.json";

/// Who is signed in. `None` means the monitor must not run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub user_id: Option<String>,
}

/// Where the status snapshots are written
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub directory: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            directory: PathBuf::from("status"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub session: SessionConfig,
    pub device: DeviceConfig,
    pub escalation: EscalationConfig,
    pub location: LocationConfig,
    pub store: StoreConfig,
}

impl AppConfig {
    /// Loads the config from a configuration file.
    pub async fn load_config(file_path: &Path) -> Result<Self> {
        if !file_path.exists() {
            warn!("Config file not found at {:?}, using default.", file_path);
            return Ok(Self::default());
        }

        let config_json = fs::read_to_string(file_path).await?;
        let config: Self = serde_json::from_str(&config_json)?;

        info!("Config loaded from {:?}", file_path);
        Ok(config)
    }

    /// Saves the current config to a configuration file.
    pub async fn save_config(&self, file_path: &Path) -> Result<()> {
        let config_json = match serde_json::to_string_pretty(&self) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize monitor config to JSON: {}", e);
                return Err(e.into());
            }
        };

        write_atomically(file_path, config_json).await?;

        info!("Monitor config saved to {:?}.", file_path);
        Ok(())
    }
}
