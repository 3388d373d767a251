//! Core data model for transfer jobs.
//!
//! This module defines the values that flow through the engine:
//! - TransferJob: one folder (or other unit) to move from source to destination
//! - FileInventory: file count, byte total, and per-file sizes of a tree
//! - ProgressSnapshot: one progress tick emitted while the copier runs
//! - CopyOutcome / VerificationResult: the terminal records of a job

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

/// A single unit of work: copy `source_path` into `destination_path`.
///
/// Immutable once created. Collaborators (backup/restore planners, the CLI)
/// build one per folder and hand it to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferJob {
    id: Uuid,
    source_path: PathBuf,
    destination_path: PathBuf,
    label: String,
    verify_written: bool,
}

impl TransferJob {
    pub fn new(
        source_path: impl AsRef<Path>,
        destination_path: impl AsRef<Path>,
        label: impl Into<String>,
    ) -> Self {
        TransferJob {
            id: Uuid::new_v4(),
            source_path: source_path.as_ref().to_path_buf(),
            destination_path: destination_path.as_ref().to_path_buf(),
            label: label.into(),
            verify_written: false,
        }
    }

    /// Request the slower read-back verification of written data.
    pub fn with_verify_written(mut self, verify_written: bool) -> Self {
        self.verify_written = verify_written;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn destination_path(&self) -> &Path {
        &self.destination_path
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn verify_written(&self) -> bool {
        self.verify_written
    }
}

/// File count and sizes of a directory tree.
///
/// `total_bytes` always equals the sum of `per_file_sizes`; the fields are
/// only changed through [`FileInventory::insert`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileInventory {
    file_count: u64,
    total_bytes: u64,
    per_file_sizes: BTreeMap<PathBuf, u64>,
}

impl FileInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a file. Re-inserting a path replaces its previous size.
    pub fn insert(&mut self, relative_path: PathBuf, size: u64) {
        match self.per_file_sizes.insert(relative_path, size) {
            Some(previous) => {
                self.total_bytes = self.total_bytes - previous + size;
            }
            None => {
                self.file_count += 1;
                self.total_bytes += size;
            }
        }
    }

    pub fn file_count(&self) -> u64 {
        self.file_count
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn is_empty(&self) -> bool {
        self.file_count == 0
    }

    pub fn size_of(&self, relative_path: &Path) -> Option<u64> {
        self.per_file_sizes.get(relative_path).copied()
    }

    pub fn files(&self) -> impl Iterator<Item = (&Path, u64)> {
        self.per_file_sizes.iter().map(|(p, s)| (p.as_path(), *s))
    }
}

/// One progress tick for a running job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub files_done: u64,
    pub files_total: u64,
    /// Derived from the file-count ratio, not from bytes on disk.
    pub bytes_estimated: u64,
    pub bytes_total: u64,
    pub elapsed: Duration,
    /// True when `files_done` was extrapolated because the count failed.
    pub estimated: bool,
}

impl ProgressSnapshot {
    /// Build a snapshot, estimating bytes from `files_done / files_total`.
    pub fn from_count(
        files_done: u64,
        files_total: u64,
        bytes_total: u64,
        elapsed: Duration,
        estimated: bool,
    ) -> Self {
        let bytes_estimated = if files_total == 0 {
            0
        } else {
            let ratio = (files_done as f64 / files_total as f64).min(1.0);
            (ratio * bytes_total as f64) as u64
        };
        ProgressSnapshot {
            files_done,
            files_total,
            bytes_estimated,
            bytes_total,
            elapsed,
            estimated,
        }
    }

    /// Completion percentage by file count, clamped to 100.
    pub fn percent(&self) -> u32 {
        if self.files_total == 0 {
            return 100;
        }
        let pct = self.files_done.saturating_mul(100) / self.files_total;
        pct.min(100) as u32
    }
}

/// Terminal classification of a copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyStatus {
    /// Copier succeeded and every source file is present at the destination
    Success,
    /// Copier succeeded but files are missing or failed read-back
    PartialFailure,
    /// Cancellation fired before the copier exited
    Cancelled,
    /// Missing source, launch failure, or copier exit code 8 or higher
    ProcessError,
}

impl fmt::Display for CopyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CopyStatus::Success => write!(f, "Success"),
            CopyStatus::PartialFailure => write!(f, "PartialFailure"),
            CopyStatus::Cancelled => write!(f, "Cancelled"),
            CopyStatus::ProcessError => write!(f, "ProcessError"),
        }
    }
}

/// Result of one `CopyEngine::copy` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyOutcome {
    pub status: CopyStatus,
    pub files_copied: u64,
    pub files_failed: u64,
    /// Source file count taken before the copy started
    pub files_total: u64,
    /// Copier exit code, when the copier ran to completion
    pub exit_code: Option<i32>,
    pub error_detail: Option<String>,
    pub elapsed: Duration,
}

impl CopyOutcome {
    /// An outcome for a job that never launched the copier.
    pub fn process_error(detail: impl Into<String>, elapsed: Duration) -> Self {
        CopyOutcome {
            status: CopyStatus::ProcessError,
            files_copied: 0,
            files_failed: 0,
            files_total: 0,
            exit_code: None,
            error_detail: Some(detail.into()),
            elapsed,
        }
    }

    /// True for Success and PartialFailure, the cases worth verifying.
    pub fn copier_succeeded(&self) -> bool {
        matches!(self.status, CopyStatus::Success | CopyStatus::PartialFailure)
    }
}

/// Terminal classification of a verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStatus {
    Verified,
    CountMismatch,
    SizeMismatch,
    EmptyDestination,
    Error,
}

impl VerificationStatus {
    pub fn is_verified(&self) -> bool {
        matches!(self, VerificationStatus::Verified)
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationStatus::Verified => write!(f, "Verified"),
            VerificationStatus::CountMismatch => write!(f, "CountMismatch"),
            VerificationStatus::SizeMismatch => write!(f, "SizeMismatch"),
            VerificationStatus::EmptyDestination => write!(f, "EmptyDestination"),
            VerificationStatus::Error => write!(f, "Error"),
        }
    }
}

/// Result of comparing a source tree with a destination tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationResult {
    pub status: VerificationStatus,
    pub message: String,
    /// Total bytes of the source tree
    pub total_bytes: u64,
    /// Missing or size-differing files (size check only)
    pub mismatched_files: u64,
}

/// Everything known about one job once the batch loop is done with it.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub job: TransferJob,
    pub outcome: CopyOutcome,
    /// Absent when the copier did not run to completion
    pub verification: Option<VerificationResult>,
}

impl JobReport {
    /// A job counts as good only if it copied and verified.
    pub fn is_ok(&self) -> bool {
        self.outcome.status == CopyStatus::Success
            && self
                .verification
                .as_ref()
                .map(|v| v.status.is_verified())
                .unwrap_or(false)
    }
}
