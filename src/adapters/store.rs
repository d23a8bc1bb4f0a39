//! File-backed status store
//! Keeps one JSON snapshot per user under the configured directory. Each
//! update overwrites the previous values; there is no history.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;

use crate::core::ports::StatusStore;
use crate::utils::write_atomically;

/// Latest known state of one user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub user_id: String,
    pub is_safe: Option<bool>,
    pub status_updated_at: Option<DateTime<Utc>>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub gps_updated_at: Option<DateTime<Utc>>,
}

pub struct FileStatusStore {
    directory: PathBuf,
    // Status and GPS updates race on the same file.
    write_lock: Mutex<()>,
}

impl FileStatusStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Reads the snapshot for `user_id`, if one was written.
    pub async fn load(&self, user_id: &str) -> Result<Option<StatusSnapshot>> {
        let path = self.snapshot_path(user_id)?;
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    fn snapshot_path(&self, user_id: &str) -> Result<PathBuf> {
        if user_id.is_empty()
            || user_id == "."
            || user_id == ".."
            || user_id.contains(['/', '\\'])
        {
            bail!("Invalid user id {:?}", user_id);
        }
        Ok(self.directory.join(format!("{}.json", user_id)))
    }

    async fn modify(&self, user_id: &str, apply: impl FnOnce(&mut StatusSnapshot)) -> Result<()> {
        let path = self.snapshot_path(user_id)?;
        let _guard = self.write_lock.lock().await;

        let mut snapshot = self.load(user_id).await?.unwrap_or_else(|| StatusSnapshot {
            user_id: user_id.to_string(),
            ..Default::default()
        });
        apply(&mut snapshot);

        write_atomically(&path, serde_json::to_string_pretty(&snapshot)?).await?;
        debug!("Status snapshot written to {}", path.display());
        Ok(())
    }
}

#[async_trait]
impl StatusStore for FileStatusStore {
    async fn update_user_status(&self, user_id: &str, is_safe: bool) -> Result<()> {
        info!("Recording status for {}: {}", user_id, if is_safe { "safe" } else { "unsafe" });
        self.modify(user_id, |snapshot| {
            snapshot.is_safe = Some(is_safe);
            snapshot.status_updated_at = Some(Utc::now());
        })
        .await
    }

    async fn update_user_gps(&self, user_id: &str, latitude: f64, longitude: f64) -> Result<()> {
        self.modify(user_id, |snapshot| {
            snapshot.latitude = Some(latitude);
            snapshot.longitude = Some(longitude);
            snapshot.gps_updated_at = Some(Utc::now());
        })
        .await
    }
}
