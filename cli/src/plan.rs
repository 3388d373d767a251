//! Turning a profile or a backup directory into transfer jobs.

use std::env;
use std::path::{Path, PathBuf};

use engine::TransferJob;

use crate::marker::OriginMarker;

/// Profile folders a backup covers, in copy order.
pub const PROFILE_FOLDERS: &[&str] = &[
    "Desktop",
    "Documents",
    "Downloads",
    "Pictures",
    "Music",
    "Videos",
    "Favorites",
];

/// Name of this machine, used as the backup subdirectory.
pub fn machine_name() -> String {
    env::var("COMPUTERNAME")
        .or_else(|_| env::var("HOSTNAME"))
        .ok()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| "unknown-machine".to_string())
}

pub fn user_name() -> String {
    env::var("USERNAME")
        .or_else(|_| env::var("USER"))
        .unwrap_or_else(|_| "unknown-user".to_string())
}

/// The current user's profile directory.
pub fn default_profile() -> Result<PathBuf, String> {
    env::var_os("USERPROFILE")
        .or_else(|| env::var_os("HOME"))
        .map(PathBuf::from)
        .ok_or_else(|| "Cannot determine the user profile; pass --profile".to_string())
}

/// Resolve requested folder names against the known set.
///
/// Matching ignores case. An empty request selects every folder.
pub fn select_folders(requested: &[String]) -> Result<Vec<&'static str>, String> {
    if requested.is_empty() {
        return Ok(PROFILE_FOLDERS.to_vec());
    }
    let mut selected = Vec::new();
    for name in requested {
        let folder = PROFILE_FOLDERS
            .iter()
            .find(|known| known.eq_ignore_ascii_case(name))
            .ok_or_else(|| {
                format!(
                    "Unknown folder '{}'. Must be one of: {}",
                    name,
                    PROFILE_FOLDERS.join(", ")
                )
            })?;
        if !selected.contains(folder) {
            selected.push(*folder);
        }
    }
    // Keep the canonical order regardless of how they were given
    selected.sort_by_key(|folder| PROFILE_FOLDERS.iter().position(|known| known == folder));
    Ok(selected)
}

/// Jobs for a backup, plus the folders skipped because the profile lacks them.
pub fn backup_jobs(
    profile: &Path,
    backup_dir: &Path,
    folders: &[&str],
    verify_written: &[&str],
) -> (Vec<TransferJob>, Vec<String>) {
    let mut jobs = Vec::new();
    let mut skipped = Vec::new();
    for folder in folders {
        let source = profile.join(folder);
        if !source.is_dir() {
            tracing::info!("{} not found in profile, skipping", folder);
            skipped.push(folder.to_string());
            continue;
        }
        let job = TransferJob::new(&source, backup_dir.join(folder), *folder)
            .with_verify_written(verify_written.contains(folder));
        jobs.push(job);
    }
    (jobs, skipped)
}

/// Jobs restoring every marker folder that exists in the backup.
pub fn restore_jobs(backup_dir: &Path, marker: &OriginMarker, profile: &Path) -> Vec<TransferJob> {
    marker
        .folders
        .iter()
        .filter_map(|folder| {
            let source = backup_dir.join(folder);
            if source.is_dir() {
                Some(TransferJob::new(&source, profile.join(folder), folder.as_str()))
            } else {
                tracing::warn!("{} listed in marker but missing from backup", folder);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_select_folders_defaults_to_all() {
        assert_eq!(select_folders(&[]).unwrap(), PROFILE_FOLDERS.to_vec());
    }

    #[test]
    fn test_select_folders_is_case_insensitive_and_ordered() {
        let requested = vec![
            "pictures".to_string(),
            "DESKTOP".to_string(),
            "Pictures".to_string(),
        ];
        assert_eq!(select_folders(&requested).unwrap(), vec!["Desktop", "Pictures"]);
    }

    #[test]
    fn test_select_folders_rejects_unknown() {
        let err = select_folders(&["AppData".to_string()]).unwrap_err();
        assert!(err.contains("AppData"));
    }

    #[test]
    fn test_backup_skips_folders_missing_from_profile() {
        let profile = TempDir::new().expect("Failed to create temp dir");
        fs::create_dir(profile.path().join("Documents")).expect("mkdir");
        fs::create_dir(profile.path().join("Music")).expect("mkdir");
        let backup = profile.path().join("backup");

        let (jobs, skipped) = backup_jobs(
            profile.path(),
            &backup,
            &["Desktop", "Documents", "Music"],
            &["Music"],
        );

        let labels: Vec<&str> = jobs.iter().map(|j| j.label()).collect();
        assert_eq!(labels, vec!["Documents", "Music"]);
        assert_eq!(skipped, vec!["Desktop".to_string()]);
        assert_eq!(jobs[0].destination_path(), backup.join("Documents"));
        assert!(!jobs[0].verify_written());
        assert!(jobs[1].verify_written());
    }

    #[test]
    fn test_restore_uses_marker_folders_present_in_backup() {
        let backup = TempDir::new().expect("Failed to create temp dir");
        fs::create_dir(backup.path().join("Pictures")).expect("mkdir");
        let marker = OriginMarker::new(
            "PC01",
            "ana",
            vec!["Documents".to_string(), "Pictures".to_string()],
        );
        let profile = PathBuf::from("/home/ana");

        let jobs = restore_jobs(backup.path(), &marker, &profile);

        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].source_path(), backup.path().join("Pictures"));
        assert_eq!(jobs[0].destination_path(), profile.join("Pictures"));
    }
}
