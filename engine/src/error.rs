//! Error types for the copy-and-verify engine.
//!
//! `EngineError` covers conditions that stop a single job or a standalone
//! verification. The public contracts (`CopyEngine::copy`, `verify`,
//! `run_batch`) never return it directly: they fold it into a
//! `CopyOutcome` or `VerificationResult` so nothing escapes to the host.
//! Per-entry stat failures during enumeration are not errors at all; those
//! entries are simply left out of the inventory.

use std::io;
use std::path::PathBuf;

/// Errors raised while preparing, running, or verifying a transfer job.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Source directory does not exist
    #[error("Source directory not found: {}", path.display())]
    SourceNotFound { path: PathBuf },

    /// Source exists but is not a listable directory
    #[error("Source is not a readable directory: {}", path.display())]
    SourceNotDirectory {
        path: PathBuf,
        #[source]
        source: Option<io::Error>,
    },

    /// Destination directory could not be created
    #[error("Failed to create destination directory: {}", path.display())]
    DestinationCreateFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The bulk-copy program could not be started
    #[error("Failed to launch {program}: {source}")]
    ProcessLaunchFailure {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The bulk-copy program reported a fatal exit code (8 or higher)
    #[error("{program} failed with exit code {code}")]
    ProcessExitFailure { program: String, code: i32 },

    /// The bulk-copy program ended without an exit code (killed by a signal)
    #[error("{program} was terminated without an exit code")]
    ProcessTerminated { program: String },

    /// The job was cancelled before the copy finished
    #[error("Transfer cancelled")]
    Cancelled,

    /// Source and destination hold a different number of files
    #[error("File count mismatch: source has {source_count}, destination has {destination_count}")]
    VerificationCountMismatch {
        source_count: u64,
        destination_count: u64,
    },

    /// One or more destination files are missing or differ in size
    #[error("{mismatched} file(s) size mismatch or missing")]
    VerificationSizeMismatch { mismatched: u64 },

    /// Source holds data but every destination file is zero bytes
    #[error(
        "Destination is empty: source has {}, destination has 0 bytes",
        crate::units::format_size(*source_bytes)
    )]
    VerificationEmptyDestination { source_bytes: u64 },

    /// A verification root could not be listed
    #[error("Failed to read directory {}: {source}", path.display())]
    VerificationIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Read-back checksum computation failed
    #[error("Failed to checksum {}: {source}", path.display())]
    Checksum {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Configuration could not be read or is invalid
    #[error("Invalid configuration: {message}")]
    Config { message: String },
}
