//! Console rendering of engine events and batch summaries.

use engine::units::{format_duration, format_size};
use engine::{
    BatchSummary, CopyOutcome, FileInventory, ProgressSink, ProgressSnapshot, TransferJob,
    VerificationResult,
};

/// `ProgressSink` that draws a progress bar on stderr.
pub struct ConsoleSink {
    verbose: bool,
}

impl ConsoleSink {
    pub fn new(verbose: bool) -> Self {
        ConsoleSink { verbose }
    }

    fn progress_bar(percent: u32) -> String {
        let filled = (percent.min(100) / 5) as usize;
        let empty = 20 - filled;
        format!("[{}{}] {:3}%", "=".repeat(filled), " ".repeat(empty), percent)
    }

    /// One progress line. Extrapolated ticks are marked with `~`.
    pub fn progress_line(label: &str, snapshot: &ProgressSnapshot) -> String {
        let approx = if snapshot.estimated { "~" } else { "" };
        format!(
            "{}: {} | {}{}/{} files | {}{} of {} | {}",
            label,
            Self::progress_bar(snapshot.percent()),
            approx,
            snapshot.files_done,
            snapshot.files_total,
            approx,
            format_size(snapshot.bytes_estimated),
            format_size(snapshot.bytes_total),
            format_duration(snapshot.elapsed)
        )
    }
}

impl ProgressSink for ConsoleSink {
    fn on_job_started(&self, job: &TransferJob, baseline: &FileInventory) {
        eprintln!(
            "{}: {} files, {}",
            job.label(),
            baseline.file_count(),
            format_size(baseline.total_bytes())
        );
        if self.verbose {
            eprintln!("  Source: {}", job.source_path().display());
            eprintln!("  Destination: {}", job.destination_path().display());
        }
    }

    fn on_progress(&self, job: &TransferJob, snapshot: &ProgressSnapshot) {
        eprint!("\r{}", Self::progress_line(job.label(), snapshot));
        let _ = std::io::Write::flush(&mut std::io::stderr());
    }

    fn on_job_completed(&self, job: &TransferJob, outcome: &CopyOutcome) {
        eprintln!();
        eprintln!(
            "{}: {} ({} of {} files, {})",
            job.label(),
            outcome.status,
            outcome.files_copied,
            outcome.files_total,
            format_duration(outcome.elapsed)
        );
        if let Some(detail) = &outcome.error_detail {
            eprintln!("  {}", detail);
        }
    }

    fn on_verified(&self, job: &TransferJob, result: &VerificationResult) {
        eprintln!("{}: {}", job.label(), result.message);
    }
}

/// Print the end-of-run table.
pub fn print_summary(summary: &BatchSummary) {
    eprintln!();
    eprintln!("Summary:");
    for report in &summary.reports {
        let verification = match &report.verification {
            Some(result) => result.status.to_string(),
            None => "not verified".to_string(),
        };
        eprintln!(
            "  {:<10} {:<15} {}",
            report.job.label(),
            report.outcome.status.to_string(),
            verification
        );
    }
    eprintln!(
        "{} succeeded, {} failed, {} cancelled, {} not started",
        summary.jobs_succeeded, summary.jobs_failed, summary.jobs_cancelled, summary.jobs_skipped
    );
    eprintln!(
        "Files copied: {} | Verified: {}",
        summary.files_copied,
        format_size(summary.bytes_verified)
    );
}
