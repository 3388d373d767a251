//! Running several jobs and accumulating their results.
//!
//! Each job is copied, then verified if the copier ran to completion. One
//! job's failure never stops the batch; only cancellation does. Results are
//! folded into a `BatchSummary` value that the loop returns.

use std::sync::Arc;
use std::thread;

use crate::cancel::CancellationToken;
use crate::copy::CopyEngine;
use crate::model::{CopyStatus, JobReport, TransferJob};
use crate::progress::ProgressSink;
use crate::verify;

/// Totals over the jobs of one batch.
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    /// Reports in job order
    pub reports: Vec<JobReport>,
    pub jobs_succeeded: usize,
    pub jobs_failed: usize,
    pub jobs_cancelled: usize,
    /// Jobs never started because cancellation fired first
    pub jobs_skipped: usize,
    pub files_copied: u64,
    pub bytes_verified: u64,
}

impl BatchSummary {
    /// Fold one report into the summary.
    pub fn record(mut self, report: JobReport) -> Self {
        self.files_copied += report.outcome.files_copied;
        if report.outcome.status == CopyStatus::Cancelled {
            self.jobs_cancelled += 1;
        } else if report.is_ok() {
            self.jobs_succeeded += 1;
            self.bytes_verified += report
                .verification
                .as_ref()
                .map(|v| v.total_bytes)
                .unwrap_or(0);
        } else {
            self.jobs_failed += 1;
        }
        self.reports.push(report);
        self
    }

    fn skip(mut self, count: usize) -> Self {
        self.jobs_skipped += count;
        self
    }

    /// True when every job copied and verified.
    pub fn is_clean(&self) -> bool {
        self.jobs_failed == 0 && self.jobs_cancelled == 0 && self.jobs_skipped == 0
    }

    pub fn was_cancelled(&self) -> bool {
        self.jobs_cancelled > 0 || self.jobs_skipped > 0
    }
}

/// Copy one job and verify it when the copier completed.
pub fn run_job(
    engine: &CopyEngine,
    job: &TransferJob,
    cancel: &CancellationToken,
    sink: Option<Arc<dyn ProgressSink>>,
) -> JobReport {
    let outcome = engine.copy(job, cancel, sink.clone());

    let verification = if outcome.copier_succeeded() {
        let result = verify::verify(job.source_path(), job.destination_path());
        if let Some(sink) = &sink {
            sink.on_verified(job, &result);
        }
        Some(result)
    } else {
        None
    };

    JobReport {
        job: job.clone(),
        outcome,
        verification,
    }
}

/// Run every job and return the accumulated summary.
///
/// Jobs run one at a time unless `max_concurrent_jobs` in the engine config
/// allows more; concurrent jobs must write to disjoint destinations.
pub fn run_batch(
    engine: &CopyEngine,
    jobs: &[TransferJob],
    cancel: &CancellationToken,
    sink: Option<Arc<dyn ProgressSink>>,
) -> BatchSummary {
    let workers = engine.config().max_concurrent_jobs.max(1).min(jobs.len().max(1));
    tracing::info!(jobs = jobs.len(), workers, "starting batch");

    let summary = if workers == 1 {
        run_sequential(engine, jobs, cancel, sink)
    } else {
        run_concurrent(engine, jobs, cancel, sink, workers)
    };

    tracing::info!(
        succeeded = summary.jobs_succeeded,
        failed = summary.jobs_failed,
        cancelled = summary.jobs_cancelled,
        skipped = summary.jobs_skipped,
        "batch finished"
    );
    summary
}

fn run_sequential(
    engine: &CopyEngine,
    jobs: &[TransferJob],
    cancel: &CancellationToken,
    sink: Option<Arc<dyn ProgressSink>>,
) -> BatchSummary {
    let mut summary = BatchSummary::default();
    for (index, job) in jobs.iter().enumerate() {
        if cancel.is_cancelled() {
            return summary.skip(jobs.len() - index);
        }
        summary = summary.record(run_job(engine, job, cancel, sink.clone()));
    }
    summary
}

fn run_concurrent(
    engine: &CopyEngine,
    jobs: &[TransferJob],
    cancel: &CancellationToken,
    sink: Option<Arc<dyn ProgressSink>>,
    workers: usize,
) -> BatchSummary {
    let (job_tx, job_rx) = crossbeam_channel::unbounded::<(usize, &TransferJob)>();
    let (report_tx, report_rx) = crossbeam_channel::unbounded::<(usize, JobReport)>();
    for entry in jobs.iter().enumerate() {
        let _ = job_tx.send(entry);
    }
    drop(job_tx);

    thread::scope(|scope| {
        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let report_tx = report_tx.clone();
            let sink = sink.clone();
            scope.spawn(move || {
                for (index, job) in job_rx.iter() {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let report = run_job(engine, job, cancel, sink.clone());
                    let _ = report_tx.send((index, report));
                }
            });
        }
    });
    drop(report_tx);

    let mut reports: Vec<(usize, JobReport)> = report_rx.iter().collect();
    reports.sort_by_key(|(index, _)| *index);

    let skipped = jobs.len() - reports.len();
    reports
        .into_iter()
        .fold(BatchSummary::default(), |summary, (_, report)| summary.record(report))
        .skip(skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::copier::CommandCopier;
    use crate::model::{CopyOutcome, VerificationResult, VerificationStatus};
    use std::fs;
    use std::time::Duration;

    fn engine(max_concurrent_jobs: usize) -> CopyEngine {
        let config = EngineConfig {
            poll_interval_ms: 20,
            cancel_check_interval_ms: 20,
            max_concurrent_jobs,
            ..EngineConfig::default()
        };
        let copier = CommandCopier::new(
            "sh",
            &["-c", "cp -R \"$0\"/. \"$1\"", "{source}", "{destination}"],
        );
        CopyEngine::with_copier(config, Box::new(copier))
    }

    fn report(status: CopyStatus, verification: Option<VerificationStatus>) -> JobReport {
        JobReport {
            job: TransferJob::new("s", "d", "Desktop"),
            outcome: CopyOutcome {
                status,
                files_copied: 2,
                files_failed: 0,
                files_total: 2,
                exit_code: Some(1),
                error_detail: None,
                elapsed: Duration::ZERO,
            },
            verification: verification.map(|status| VerificationResult {
                status,
                message: String::new(),
                total_bytes: 10,
                mismatched_files: 0,
            }),
        }
    }

    #[test]
    fn test_record_accumulates_by_status() {
        let summary = BatchSummary::default()
            .record(report(CopyStatus::Success, Some(VerificationStatus::Verified)))
            .record(report(CopyStatus::Success, Some(VerificationStatus::SizeMismatch)))
            .record(report(CopyStatus::Cancelled, None))
            .record(report(CopyStatus::ProcessError, None));

        assert_eq!(summary.jobs_succeeded, 1);
        assert_eq!(summary.jobs_failed, 2);
        assert_eq!(summary.jobs_cancelled, 1);
        assert_eq!(summary.files_copied, 8);
        assert_eq!(summary.bytes_verified, 10);
        assert_eq!(summary.reports.len(), 4);
        assert!(!summary.is_clean());
        assert!(summary.was_cancelled());
    }

    fn folders(root: &std::path::Path, names: &[&str]) -> Vec<TransferJob> {
        names
            .iter()
            .map(|name| {
                let src = root.join("profile").join(name);
                fs::create_dir_all(&src).expect("mkdir");
                fs::write(src.join("note.txt"), name.as_bytes()).expect("write");
                TransferJob::new(&src, root.join("backup").join(name), *name)
            })
            .collect()
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_job_does_not_stop_batch() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let mut jobs = folders(temp_dir.path(), &["Desktop", "Documents"]);
        jobs.insert(
            1,
            TransferJob::new(temp_dir.path().join("missing"), temp_dir.path().join("x"), "Music"),
        );

        let summary = run_batch(&engine(1), &jobs, &CancellationToken::new(), None);

        assert_eq!(summary.jobs_succeeded, 2);
        assert_eq!(summary.jobs_failed, 1);
        assert_eq!(summary.reports[1].outcome.status, CopyStatus::ProcessError);
        assert!(summary.reports[1].verification.is_none());
        assert!(summary.reports[2].is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_concurrent_batch_keeps_job_order() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let jobs = folders(temp_dir.path(), &["Desktop", "Documents", "Pictures", "Videos"]);

        let summary = run_batch(&engine(3), &jobs, &CancellationToken::new(), None);

        assert!(summary.is_clean());
        let labels: Vec<&str> = summary.reports.iter().map(|r| r.job.label()).collect();
        assert_eq!(labels, vec!["Desktop", "Documents", "Pictures", "Videos"]);
    }

    #[test]
    fn test_cancelled_batch_skips_remaining_jobs() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let jobs = folders(temp_dir.path(), &["Desktop", "Documents"]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = run_batch(&engine(1), &jobs, &cancel, None);

        assert!(summary.reports.is_empty());
        assert_eq!(summary.jobs_skipped, 2);
        assert!(summary.was_cancelled());
        assert!(!temp_dir.path().join("backup").exists());
    }
}
