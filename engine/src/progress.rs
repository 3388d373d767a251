//! Progress reporting trait.
//!
//! This module defines the `ProgressSink` trait, which decouples the engine
//! from any presentation (console bar, log file, GUI). The engine has no
//! opinion on how progress is shown.
//!
//! `on_progress` is called from the monitor's background thread, so sinks
//! must be `Send + Sync`.

use crossbeam_channel::Sender;

use crate::model::{CopyOutcome, FileInventory, ProgressSnapshot, TransferJob, VerificationResult};

/// Receives events for the jobs an engine runs.
///
/// Only `on_progress` is required; the lifecycle hooks default to no-ops.
pub trait ProgressSink: Send + Sync {
    /// Called once the source baseline is known, before the copier starts.
    fn on_job_started(&self, _job: &TransferJob, _baseline: &FileInventory) {}

    /// Called on every monitor tick while the copier runs.
    fn on_progress(&self, job: &TransferJob, snapshot: &ProgressSnapshot);

    /// Called once the copy has a terminal outcome.
    fn on_job_completed(&self, _job: &TransferJob, _outcome: &CopyOutcome) {}

    /// Called after a job's verification (batch runs only).
    fn on_verified(&self, _job: &TransferJob, _result: &VerificationResult) {}
}

/// A sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn on_progress(&self, _job: &TransferJob, _snapshot: &ProgressSnapshot) {}
}

/// Events forwarded by [`ChannelSink`].
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    JobStarted {
        label: String,
        files_total: u64,
        bytes_total: u64,
    },
    Progress {
        label: String,
        snapshot: ProgressSnapshot,
    },
    JobCompleted {
        label: String,
        outcome: CopyOutcome,
    },
    Verified {
        label: String,
        result: VerificationResult,
    },
}

/// A `ProgressSink` that sends events to another thread via a channel.
///
/// Send errors (receiver dropped) are ignored; losing the observer never
/// affects the transfer.
pub struct ChannelSink {
    sender: Sender<ProgressEvent>,
}

impl ChannelSink {
    pub fn new(sender: Sender<ProgressEvent>) -> Self {
        ChannelSink { sender }
    }
}

impl ProgressSink for ChannelSink {
    fn on_job_started(&self, job: &TransferJob, baseline: &FileInventory) {
        let _ = self.sender.send(ProgressEvent::JobStarted {
            label: job.label().to_string(),
            files_total: baseline.file_count(),
            bytes_total: baseline.total_bytes(),
        });
    }

    fn on_progress(&self, job: &TransferJob, snapshot: &ProgressSnapshot) {
        let _ = self.sender.send(ProgressEvent::Progress {
            label: job.label().to_string(),
            snapshot: snapshot.clone(),
        });
    }

    fn on_job_completed(&self, job: &TransferJob, outcome: &CopyOutcome) {
        let _ = self.sender.send(ProgressEvent::JobCompleted {
            label: job.label().to_string(),
            outcome: outcome.clone(),
        });
    }

    fn on_verified(&self, job: &TransferJob, result: &VerificationResult) {
        let _ = self.sender.send(ProgressEvent::Verified {
            label: job.label().to_string(),
            result: result.clone(),
        });
    }
}
