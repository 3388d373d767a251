//! # Migration Engine - Copy and Verify Library
//!
//! A headless engine that moves user-profile folders between machines by
//! driving a bulk-copy program (robocopy on Windows) and then checking the
//! result. Designed as the foundation for multiple front ends (CLI,
//! automation).
//!
//! ## Overview
//!
//! Each folder is one `TransferJob`. For every job the engine:
//! - Enumerates the source to get a baseline (files and bytes)
//! - Launches the copier and polls the destination for progress
//! - Classifies the copier's exit into a `CopyOutcome`
//! - Verifies the destination against the source by count and size
//!
//! Cancellation is cooperative through a shared `CancellationToken`; the
//! copier is killed and reaped before `copy` returns.
//!
//! ## Basic Usage
//!
//! ```no_run
//! use engine::{run_batch, CancellationToken, CopyEngine, EngineConfig, TransferJob};
//!
//! let engine = CopyEngine::new(EngineConfig::default());
//! let jobs = vec![
//!     TransferJob::new("C:\\Users\\ana\\Documents", "E:\\PC01\\Documents", "Documents"),
//!     TransferJob::new("C:\\Users\\ana\\Pictures", "E:\\PC01\\Pictures", "Pictures"),
//! ];
//!
//! let summary = run_batch(&engine, &jobs, &CancellationToken::new(), None);
//! for report in &summary.reports {
//!     println!("{}: {}", report.job.label(), report.outcome.status);
//! }
//! ```
//!
//! ## Modules
//!
//! - **model**: Core data structures (TransferJob, FileInventory, outcomes)
//! - **error**: Error types and handling
//! - **inventory**: Recursive enumeration that never crosses reparse points
//! - **copy**: Copier lifecycle, exit classification, cancellation
//! - **monitor**: Background progress polling
//! - **verify**: Count and size reconciliation
//! - **batch**: Running several jobs and summarising them
//! - **checksums**: Content read-back for `verify_written` jobs

pub mod batch;
pub mod cancel;
pub mod checksums;
pub mod config;
pub mod copier;
pub mod copy;
pub mod error;
pub mod inventory;
pub mod model;
pub mod monitor;
pub mod progress;
pub mod units;
pub mod verify;

// Re-export main types and functions
pub use batch::{run_batch, run_job, BatchSummary};
pub use cancel::CancellationToken;
pub use checksums::{compute_file_checksum, ChecksumAlgorithm, ChecksumValue};
pub use config::{CopierConfig, CopierKind, EngineConfig};
pub use copier::{BulkCopier, CommandCopier, Robocopy};
pub use copy::CopyEngine;
pub use error::EngineError;
pub use model::{
    CopyOutcome, CopyStatus, FileInventory, JobReport, ProgressSnapshot, TransferJob,
    VerificationResult, VerificationStatus,
};
pub use progress::{ChannelSink, NullSink, ProgressEvent, ProgressSink};
pub use verify::verify;
