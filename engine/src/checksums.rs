//! Content checksums for read-back verification of written data.
//!
//! Size reconciliation (see `verify`) never reads file contents. When a job
//! asks for `verify_written`, the copy engine additionally re-reads every
//! copied file on both sides and compares digests. This module provides:
//! - SHA-256 and BLAKE3 streaming checksums
//! - A read-back pass over a source inventory

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::cancel::CancellationToken;
use crate::error::EngineError;
use crate::model::FileInventory;

/// Supported checksum algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    /// SHA-256 (cryptographic, 256-bit)
    Sha256,
    /// BLAKE3 (modern, fast, 256-bit)
    Blake3,
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha256 => write!(f, "sha256"),
            Self::Blake3 => write!(f, "blake3"),
        }
    }
}

impl ChecksumAlgorithm {
    /// Parse algorithm from string (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sha256" => Some(Self::Sha256),
            "blake3" => Some(Self::Blake3),
            _ => None,
        }
    }
}

/// A computed checksum value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumValue {
    algorithm: ChecksumAlgorithm,
    hex: String,
}

impl fmt::Display for ChecksumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

fn stream_file(path: &Path, mut update: impl FnMut(&[u8])) -> Result<(), EngineError> {
    let checksum_err = |source| EngineError::Checksum {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(checksum_err)?;
    let mut buffer = vec![0u8; 64 * 1024];
    loop {
        match file.read(&mut buffer) {
            Ok(0) => return Ok(()),
            Ok(n) => update(&buffer[..n]),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(checksum_err(e)),
        }
    }
}

/// Compute checksum for a file
pub fn compute_file_checksum(
    path: &Path,
    algorithm: ChecksumAlgorithm,
) -> Result<ChecksumValue, EngineError> {
    let hex = match algorithm {
        ChecksumAlgorithm::Sha256 => {
            use sha2::Digest;
            let mut hasher = sha2::Sha256::new();
            stream_file(path, |chunk| hasher.update(chunk))?;
            format!("{:x}", hasher.finalize())
        }
        ChecksumAlgorithm::Blake3 => {
            let mut hasher = blake3::Hasher::new();
            stream_file(path, |chunk| {
                hasher.update(chunk);
            })?;
            hasher.finalize().to_hex().to_string()
        }
    };
    Ok(ChecksumValue { algorithm, hex })
}

/// Outcome of re-reading every copied file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadbackReport {
    /// Files whose digests were compared
    pub checked: u64,
    /// Relative paths whose digests differ or could not be read
    pub mismatched: Vec<PathBuf>,
}

impl ReadbackReport {
    pub fn is_clean(&self) -> bool {
        self.mismatched.is_empty()
    }
}

/// Compare every file of `source_inventory` with its copy under `destination`.
///
/// A file that cannot be read on either side counts as a mismatch; one bad
/// file never aborts the pass. `cancel` is checked before every file and
/// stops the pass with `EngineError::Cancelled`.
pub fn readback(
    source_root: &Path,
    destination: &Path,
    source_inventory: &FileInventory,
    algorithm: ChecksumAlgorithm,
    cancel: &CancellationToken,
) -> Result<ReadbackReport, EngineError> {
    let mut report = ReadbackReport::default();

    for (relative, _) in source_inventory.files() {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        report.checked += 1;
        let src = compute_file_checksum(&source_root.join(relative), algorithm);
        let dst = compute_file_checksum(&destination.join(relative), algorithm);
        match (src, dst) {
            (Ok(a), Ok(b)) if a == b => {}
            (Ok(a), Ok(b)) => {
                tracing::warn!("read-back mismatch: {} ({} vs {})", relative.display(), a, b);
                report.mismatched.push(relative.to_path_buf());
            }
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!("read-back failed for {}: {}", relative.display(), e);
                report.mismatched.push(relative.to_path_buf());
            }
        }
    }

    Ok(report)
}
