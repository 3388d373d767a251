//! The origin marker written at the top of every backup.
//!
//! A backup directory holds one folder per profile folder plus
//! `migration-origin.json`, which records where the data came from. Restore
//! reads it back to know which folders to bring home.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MARKER_FILE: &str = "migration-origin.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginMarker {
    pub backup_id: Uuid,
    pub machine: String,
    pub user: String,
    pub created_at: DateTime<Utc>,
    /// Folder names present in the backup, in copy order
    pub folders: Vec<String>,
}

impl OriginMarker {
    pub fn new(machine: impl Into<String>, user: impl Into<String>, folders: Vec<String>) -> Self {
        OriginMarker {
            backup_id: Uuid::new_v4(),
            machine: machine.into(),
            user: user.into(),
            created_at: Utc::now(),
            folders,
        }
    }

    /// Write the marker into `backup_dir`, returning its path.
    pub fn write(&self, backup_dir: &Path) -> Result<PathBuf, String> {
        let path = backup_dir.join(MARKER_FILE);
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to encode origin marker: {}", e))?;
        fs::write(&path, json)
            .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
        Ok(path)
    }

    /// Read the marker from `backup_dir`.
    pub fn read(backup_dir: &Path) -> Result<Self, String> {
        let path = backup_dir.join(MARKER_FILE);
        let text = fs::read_to_string(&path).map_err(|e| {
            format!(
                "No readable {} in {}: {}",
                MARKER_FILE,
                backup_dir.display(),
                e
            )
        })?;
        serde_json::from_str(&text).map_err(|e| format!("Malformed {}: {}", path.display(), e))
    }
}
