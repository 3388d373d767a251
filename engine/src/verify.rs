//! Post-copy reconciliation of a source tree against its copy.
//!
//! Verification compares file counts and per-file byte sizes. It does not
//! hash contents; a `Verified` result means both trees hold the same relative
//! paths with the same sizes. Checks run cheapest first:
//! 1. both trees empty: trivially verified
//! 2. source has data, destination has none: `EmptyDestination`
//! 3. counts differ: `CountMismatch`
//! 4. per-file size comparison, aggregated: `SizeMismatch`

use std::path::Path;

use crate::error::EngineError;
use crate::inventory;
use crate::model::{FileInventory, VerificationResult, VerificationStatus};
use crate::units::format_size;

/// Sample paths listed in a size-mismatch message.
const MISMATCH_SAMPLES: usize = 5;

/// Verify `destination` against `source`.
///
/// Usable on its own for any two directory trees, independent of a copy.
pub fn verify(source: &Path, destination: &Path) -> VerificationResult {
    let scanned = inventory::scan(source)
        .and_then(|src| inventory::scan(destination).map(|dst| (src, dst)));

    let result = match scanned {
        Ok((src, dst)) => reconcile(&src, &dst),
        Err(e) => VerificationResult {
            status: VerificationStatus::Error,
            message: e.to_string(),
            total_bytes: 0,
            mismatched_files: 0,
        },
    };

    if result.status.is_verified() {
        tracing::info!("verified {}: {}", destination.display(), result.message);
    } else {
        tracing::warn!(
            status = %result.status,
            "verification of {} failed: {}",
            destination.display(),
            result.message
        );
    }
    result
}

/// Compare two inventories taken from a source and a destination tree.
pub fn reconcile(source: &FileInventory, destination: &FileInventory) -> VerificationResult {
    let total_bytes = source.total_bytes();
    let result = |status, message: String, mismatched_files| VerificationResult {
        status,
        message,
        total_bytes,
        mismatched_files,
    };

    if source.is_empty() && destination.is_empty() {
        return result(VerificationStatus::Verified, "No files to verify".to_string(), 0);
    }

    if source.total_bytes() > 0 && destination.total_bytes() == 0 {
        let err = EngineError::VerificationEmptyDestination {
            source_bytes: source.total_bytes(),
        };
        return result(
            VerificationStatus::EmptyDestination,
            err.to_string(),
            source.file_count(),
        );
    }

    if source.file_count() != destination.file_count() {
        let err = EngineError::VerificationCountMismatch {
            source_count: source.file_count(),
            destination_count: destination.file_count(),
        };
        return result(VerificationStatus::CountMismatch, err.to_string(), 0);
    }

    let mut mismatched = 0u64;
    let mut samples = Vec::new();
    for (relative, size) in source.files() {
        if destination.size_of(relative) != Some(size) {
            mismatched += 1;
            if samples.len() < MISMATCH_SAMPLES {
                samples.push(relative.display().to_string());
            }
        }
    }

    if mismatched > 0 {
        let err = EngineError::VerificationSizeMismatch { mismatched };
        let mut message = err.to_string();
        message.push_str(&format!(" ({})", samples.join(", ")));
        if mismatched as usize > samples.len() {
            message.push_str(&format!(" and {} more", mismatched as usize - samples.len()));
        }
        return result(VerificationStatus::SizeMismatch, message, mismatched);
    }

    result(
        VerificationStatus::Verified,
        format!(
            "All {} files verified ({})",
            source.file_count(),
            format_size(total_bytes)
        ),
        0,
    )
}
