//! Copy orchestration.
//!
//! `CopyEngine::copy` runs one `TransferJob` end to end:
//! 1. check the source and take a baseline inventory
//! 2. create the destination and launch the bulk copier
//! 3. poll for exit and cancellation while the monitor reports progress
//! 4. classify the exit code and take one authoritative destination count
//! 5. optionally re-read every copied file (`verify_written`)
//!
//! Every failure is folded into the returned `CopyOutcome`.

use std::collections::VecDeque;
use std::fs;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;

use crate::cancel::CancellationToken;
use crate::checksums::{self, ReadbackReport};
use crate::config::EngineConfig;
use crate::copier::{self, BulkCopier};
use crate::error::EngineError;
use crate::inventory;
use crate::model::{CopyOutcome, CopyStatus, FileInventory, TransferJob};
use crate::monitor::{ProgressMonitor, Totals};
use crate::progress::{NullSink, ProgressSink};

/// Lines of copier output kept for error reports.
const OUTPUT_TAIL_LINES: usize = 20;

/// How long to wait for the output drains once the copier has exited.
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Runs transfer jobs through a bulk copier.
pub struct CopyEngine {
    copier: Box<dyn BulkCopier>,
    config: EngineConfig,
}

/// How waiting on the copier ended.
enum Waited {
    Exited(ExitStatus),
    Cancelled,
    WaitFailed(io::Error),
}

impl CopyEngine {
    /// Build an engine using the copier described in `config`.
    pub fn new(config: EngineConfig) -> Self {
        let copier = copier::from_config(&config.copier);
        CopyEngine { copier, config }
    }

    /// Build an engine around a specific copier.
    pub fn with_copier(config: EngineConfig, copier: Box<dyn BulkCopier>) -> Self {
        CopyEngine { copier, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Copy one job. Never panics on I/O or process failures; everything
    /// ends up in the returned outcome.
    pub fn copy(
        &self,
        job: &TransferJob,
        cancel: &CancellationToken,
        sink: Option<Arc<dyn ProgressSink>>,
    ) -> CopyOutcome {
        let span = tracing::info_span!("copy_job", label = job.label(), id = %job.id());
        let _guard = span.enter();

        let sink: Arc<dyn ProgressSink> = sink.unwrap_or_else(|| Arc::new(NullSink));
        let started = Instant::now();

        let outcome = self.run(job, cancel, &sink, started);

        match outcome.status {
            CopyStatus::Success => tracing::info!(
                files = outcome.files_copied,
                "copy finished in {:?}",
                outcome.elapsed
            ),
            CopyStatus::Cancelled => tracing::warn!(
                files = outcome.files_copied,
                "copy cancelled after {:?}",
                outcome.elapsed
            ),
            _ => tracing::warn!(
                status = %outcome.status,
                failed = outcome.files_failed,
                "copy did not complete cleanly: {}",
                outcome.error_detail.as_deref().unwrap_or("")
            ),
        }
        sink.on_job_completed(job, &outcome);
        outcome
    }

    fn run(
        &self,
        job: &TransferJob,
        cancel: &CancellationToken,
        sink: &Arc<dyn ProgressSink>,
        started: Instant,
    ) -> CopyOutcome {
        if let Err(e) = check_source(job.source_path()) {
            return CopyOutcome::process_error(e.to_string(), started.elapsed());
        }

        let baseline = inventory::enumerate(job.source_path());
        let totals = Totals {
            files: baseline.file_count(),
            bytes: baseline.total_bytes(),
        };
        tracing::info!(
            files = totals.files,
            bytes = totals.bytes,
            "copying {} -> {}",
            job.source_path().display(),
            job.destination_path().display()
        );
        sink.on_job_started(job, &baseline);

        let outcomes = OutcomeBuilder { totals, started };

        if cancel.is_cancelled() {
            let detail = EngineError::Cancelled.to_string();
            return outcomes.build(CopyStatus::Cancelled, 0, None, Some(detail));
        }

        if let Err(source) = fs::create_dir_all(job.destination_path()) {
            let err = EngineError::DestinationCreateFailed {
                path: job.destination_path().to_path_buf(),
                source,
            };
            return outcomes.build(CopyStatus::ProcessError, 0, None, Some(err.to_string()));
        }

        let mut command = self.copier.command(job);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        isolate(&mut command);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(source) => {
                let err = EngineError::ProcessLaunchFailure {
                    program: self.copier.name().to_string(),
                    source,
                };
                return outcomes.build(CopyStatus::ProcessError, 0, None, Some(err.to_string()));
            }
        };
        let pid = child.id();
        tracing::debug!(pid, "launched {}", self.copier.name());

        let stdout_tail = OutputTail::capture(child.stdout.take());
        let stderr_tail = OutputTail::capture(child.stderr.take());

        let monitor = ProgressMonitor::start(
            job.clone(),
            totals,
            self.config.poll_interval(),
            self.config.monitor_stop_grace(),
            Arc::clone(sink),
        );

        let waited = wait_for_exit(&mut child, cancel, self.config.cancel_check_interval());
        let last_seen = monitor.stop();

        match waited {
            Waited::Cancelled => {
                let copied = inventory::count_files(job.destination_path()).unwrap_or(last_seen);
                outcomes.build(
                    CopyStatus::Cancelled,
                    copied,
                    None,
                    Some(EngineError::Cancelled.to_string()),
                )
            }
            Waited::WaitFailed(e) => {
                let detail = format!("failed waiting for {}: {}", self.copier.name(), e);
                outcomes.build(CopyStatus::ProcessError, last_seen, None, Some(detail))
            }
            Waited::Exited(status) => {
                // Anything the copier left behind in its group goes with it
                kill_stragglers(pid);
                let output = stdout_tail
                    .finish(OUTPUT_DRAIN_GRACE)
                    .into_iter()
                    .chain(stderr_tail.finish(OUTPUT_DRAIN_GRACE))
                    .collect();
                self.classify_exit(job, &baseline, status, output, &outcomes, cancel)
            }
        }
    }

    fn classify_exit(
        &self,
        job: &TransferJob,
        baseline: &FileInventory,
        status: ExitStatus,
        output: Vec<String>,
        outcomes: &OutcomeBuilder,
        cancel: &CancellationToken,
    ) -> CopyOutcome {
        // One full count, not the monitor's estimate
        let copied = inventory::enumerate(job.destination_path()).file_count();

        let code = match status.code() {
            Some(code) => code,
            None => {
                let err = EngineError::ProcessTerminated {
                    program: self.copier.name().to_string(),
                };
                let detail = with_output(err, &output);
                return outcomes.build(CopyStatus::ProcessError, copied, None, Some(detail));
            }
        };

        if !copier::exit_code_is_success(code) {
            let err = EngineError::ProcessExitFailure {
                program: self.copier.name().to_string(),
                code,
            };
            let detail = with_output(err, &output);
            return outcomes.build(CopyStatus::ProcessError, copied, Some(code), Some(detail));
        }

        let mut outcome = outcomes.build(CopyStatus::Success, copied, Some(code), None);
        if outcome.files_failed > 0 {
            outcome.status = CopyStatus::PartialFailure;
            outcome.error_detail = Some(format!(
                "{} of {} files missing at destination",
                outcome.files_failed, outcome.files_total
            ));
        }

        if job.verify_written() {
            let readback = checksums::readback(
                job.source_path(),
                job.destination_path(),
                baseline,
                self.config.readback_algorithm,
                cancel,
            );
            outcome = apply_readback(outcome, readback);
        }

        outcome.elapsed = outcomes.started.elapsed();
        outcome
    }
}

/// Fold a read-back pass into the outcome of a completed copy.
fn apply_readback(
    mut outcome: CopyOutcome,
    readback: Result<ReadbackReport, EngineError>,
) -> CopyOutcome {
    match readback {
        Ok(report) => {
            tracing::info!(
                checked = report.checked,
                mismatched = report.mismatched.len(),
                "read-back verification done"
            );
            if !report.is_clean() {
                let mismatched = report.mismatched.len() as u64;
                outcome.status = CopyStatus::PartialFailure;
                outcome.files_failed = outcome.files_failed.max(mismatched);
                outcome.error_detail = Some(format!(
                    "{} file(s) failed read-back verification",
                    mismatched
                ));
            }
        }
        Err(err) => {
            tracing::warn!("read-back verification stopped: {}", err);
            outcome.status = CopyStatus::Cancelled;
            outcome.error_detail = Some(err.to_string());
        }
    }
    outcome
}

/// Fills in the fields every outcome of a launched job shares.
struct OutcomeBuilder {
    totals: Totals,
    started: Instant,
}

impl OutcomeBuilder {
    fn build(
        &self,
        status: CopyStatus,
        files_copied: u64,
        exit_code: Option<i32>,
        error_detail: Option<String>,
    ) -> CopyOutcome {
        CopyOutcome {
            status,
            files_copied,
            files_failed: self.totals.files.saturating_sub(files_copied),
            files_total: self.totals.files,
            exit_code,
            error_detail,
            elapsed: self.started.elapsed(),
        }
    }
}

/// The source must exist, be a directory, and be listable.
fn check_source(path: &Path) -> Result<(), EngineError> {
    let metadata = fs::metadata(path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            EngineError::SourceNotFound {
                path: path.to_path_buf(),
            }
        } else {
            EngineError::SourceNotDirectory {
                path: path.to_path_buf(),
                source: Some(e),
            }
        }
    })?;

    if !metadata.is_dir() {
        return Err(EngineError::SourceNotDirectory {
            path: path.to_path_buf(),
            source: None,
        });
    }

    fs::read_dir(path).map_err(|e| EngineError::SourceNotDirectory {
        path: path.to_path_buf(),
        source: Some(e),
    })?;
    Ok(())
}

/// Poll the child until it exits or `cancel` fires.
///
/// Exit is checked before cancellation, so a copier that finished during the
/// last sleep keeps its result. The child is always reaped.
fn wait_for_exit(child: &mut Child, cancel: &CancellationToken, interval: Duration) -> Waited {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Waited::Exited(status),
            Ok(None) => {}
            Err(e) => {
                terminate(child);
                return Waited::WaitFailed(e);
            }
        }
        if cancel.is_cancelled() {
            terminate(child);
            return Waited::Cancelled;
        }
        thread::sleep(interval);
    }
}

/// Start the copier as the leader of a new process group, so that killing
/// the group also reaches whatever it spawned.
fn isolate(command: &mut Command) {
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }
    #[cfg(not(unix))]
    let _ = command;
}

/// Kill the copier and everything in its process group, then reap it.
fn terminate(child: &mut Child) {
    kill_stragglers(child.id());
    if let Ok(None) = child.try_wait() {
        if let Err(e) = child.kill() {
            tracing::warn!(pid = child.id(), "failed to kill copier: {}", e);
        }
    }
    if let Err(e) = child.wait() {
        tracing::warn!(pid = child.id(), "failed to reap copier: {}", e);
    }
}

#[cfg(unix)]
fn kill_stragglers(leader: u32) {
    let Ok(pgid) = libc::pid_t::try_from(leader) else {
        return;
    };
    // SAFETY: kill(2) takes plain integers; a negative pid names the group.
    let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if rc != 0 {
        let err = io::Error::last_os_error();
        // ESRCH: the group is already empty
        if err.raw_os_error() != Some(libc::ESRCH) {
            tracing::warn!(pgid, "failed to kill copier process group: {}", err);
        }
    }
}

// Only the direct child is killed here
#[cfg(not(unix))]
fn kill_stragglers(_leader: u32) {}

fn with_output(err: EngineError, output: &[String]) -> String {
    if output.is_empty() {
        err.to_string()
    } else {
        format!("{}: {}", err, output.join(" | "))
    }
}

/// Drains a child pipe on a background thread, keeping the last lines.
///
/// Dropping it without `finish` detaches the drain.
struct OutputTail {
    lines: Option<Receiver<VecDeque<String>>>,
}

impl OutputTail {
    fn capture<R: Read + Send + 'static>(stream: Option<R>) -> Self {
        let lines = stream.and_then(|stream| {
            let (tx, rx) = crossbeam_channel::bounded(1);
            thread::Builder::new()
                .name("copier-output".to_string())
                .spawn(move || {
                    let mut reader = BufReader::new(stream);
                    let mut tail = VecDeque::with_capacity(OUTPUT_TAIL_LINES);
                    let mut buf = Vec::new();
                    loop {
                        buf.clear();
                        match reader.read_until(b'\n', &mut buf) {
                            Ok(0) | Err(_) => break,
                            Ok(_) => {
                                let line = String::from_utf8_lossy(&buf).trim().to_string();
                                if line.is_empty() {
                                    continue;
                                }
                                if tail.len() == OUTPUT_TAIL_LINES {
                                    tail.pop_front();
                                }
                                tail.push_back(line);
                            }
                        }
                    }
                    let _ = tx.send(tail);
                })
                .ok()
                .map(|_| rx)
        });
        OutputTail { lines }
    }

    /// Collect the captured lines, waiting at most `grace` for the pipe to
    /// close. A pipe still held open after that yields no lines.
    fn finish(self, grace: Duration) -> Vec<String> {
        let Some(lines) = self.lines else {
            return Vec::new();
        };
        match lines.recv_timeout(grace) {
            Ok(tail) => Vec::from(tail),
            Err(_) => {
                tracing::debug!("copier output still open after exit; not waiting for it");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::copier::CommandCopier;
    use crate::progress::{ChannelSink, ProgressEvent};
    use crate::verify;

    fn test_config() -> EngineConfig {
        EngineConfig {
            poll_interval_ms: 20,
            cancel_check_interval_ms: 20,
            ..EngineConfig::default()
        }
    }

    fn sh_engine(script: &str) -> CopyEngine {
        let copier = CommandCopier::new("sh", &["-c", script, "{source}", "{destination}"]);
        CopyEngine::with_copier(test_config(), Box::new(copier))
    }

    /// The default command copier: `cp -R` without a shell in between.
    fn cp_engine() -> CopyEngine {
        CopyEngine::new(test_config())
    }

    #[cfg(unix)]
    fn process_alive(pid: libc::pid_t) -> bool {
        // SAFETY: signal 0 only checks that the process exists
        if unsafe { libc::kill(pid, 0) } != 0 {
            return false;
        }
        // A killed orphan can linger as a zombie until init reaps it
        match fs::read_to_string(format!("/proc/{}/stat", pid)) {
            Ok(stat) => !stat
                .rsplit(')')
                .next()
                .map(|rest| rest.trim_start().starts_with('Z'))
                .unwrap_or(false),
            Err(_) => true,
        }
    }

    fn populate(root: &Path, files: &[(&str, &[u8])]) {
        for (name, data) in files {
            let path = root.join(name);
            fs::create_dir_all(path.parent().unwrap()).expect("mkdir");
            fs::write(path, data).expect("write");
        }
    }

    #[test]
    fn test_missing_source_never_launches_copier() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let marker = temp_dir.path().join("launched");
        let copier = CommandCopier::new(
            "sh",
            &["-c", "touch \"$0\"", marker.to_str().unwrap(), "{source}", "{destination}"],
        );
        let engine = CopyEngine::with_copier(test_config(), Box::new(copier));
        let job = TransferJob::new(
            temp_dir.path().join("no-such-folder"),
            temp_dir.path().join("dst"),
            "Documents",
        );

        let outcome = engine.copy(&job, &CancellationToken::new(), None);

        assert_eq!(outcome.status, CopyStatus::ProcessError);
        assert!(outcome.error_detail.unwrap().contains("Source directory not found"));
        assert!(!marker.exists(), "copier must not be launched");
        assert!(!temp_dir.path().join("dst").exists());
    }

    #[test]
    fn test_launch_failure_is_process_error() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        populate(&src, &[("a.txt", b"a")]);
        let copier = CommandCopier::new("/nonexistent/bulk-copier", &["{source}", "{destination}"]);
        let engine = CopyEngine::with_copier(test_config(), Box::new(copier));
        let job = TransferJob::new(&src, temp_dir.path().join("dst"), "Desktop");

        let outcome = engine.copy(&job, &CancellationToken::new(), None);

        assert_eq!(outcome.status, CopyStatus::ProcessError);
        assert_eq!(outcome.files_total, 1);
        assert!(outcome.error_detail.unwrap().contains("Failed to launch"));
    }

    #[cfg(unix)]
    #[test]
    fn test_successful_copy_verifies() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        let dst = temp_dir.path().join("backup").join("Documents");
        populate(
            &src,
            &[("a.txt", b"alpha"), ("sub/b.txt", b"bravo!"), ("sub/deeper/c.bin", &[1u8; 300])],
        );
        let job = TransferJob::new(&src, &dst, "Documents");

        let outcome = cp_engine().copy(&job, &CancellationToken::new(), None);

        assert_eq!(outcome.status, CopyStatus::Success);
        assert_eq!(outcome.exit_code, Some(0));
        assert_eq!(outcome.files_total, 3);
        assert_eq!(outcome.files_copied, 3);
        assert_eq!(outcome.files_failed, 0);
        assert_eq!(fs::read(dst.join("sub/b.txt")).expect("read"), b"bravo!");

        let result = verify::verify(&src, &dst);
        assert!(result.status.is_verified(), "{}", result.message);
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_code_seven_is_success() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        fs::create_dir_all(&src).expect("mkdir");
        let job = TransferJob::new(&src, temp_dir.path().join("dst"), "Music");

        let outcome = sh_engine("exit 7").copy(&job, &CancellationToken::new(), None);

        assert_eq!(outcome.status, CopyStatus::Success);
        assert_eq!(outcome.exit_code, Some(7));
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_code_eight_is_process_error() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        fs::create_dir_all(&src).expect("mkdir");
        let job = TransferJob::new(&src, temp_dir.path().join("dst"), "Music");

        let outcome = sh_engine("echo 'ERROR 5 (0x00000005) Accessing Source Directory'; exit 8")
            .copy(&job, &CancellationToken::new(), None);

        assert_eq!(outcome.status, CopyStatus::ProcessError);
        assert_eq!(outcome.exit_code, Some(8));
        let detail = outcome.error_detail.unwrap();
        assert!(detail.contains("exit code 8"), "{}", detail);
        assert!(detail.contains("Accessing Source Directory"), "{}", detail);
    }

    #[cfg(unix)]
    #[test]
    fn test_missing_files_are_partial_failure() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        populate(&src, &[("a.txt", b"a"), ("b.txt", b"b")]);
        let job = TransferJob::new(&src, temp_dir.path().join("dst"), "Pictures");

        let outcome = sh_engine("exit 1").copy(&job, &CancellationToken::new(), None);

        assert_eq!(outcome.status, CopyStatus::PartialFailure);
        assert_eq!(outcome.files_copied, 0);
        assert_eq!(outcome.files_failed, 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_cancel_kills_running_copier() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        populate(&src, &[("a.txt", b"a")]);
        let job = TransferJob::new(&src, temp_dir.path().join("dst"), "Videos");

        let cancel = CancellationToken::new();
        let remote = cancel.clone();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            remote.cancel();
        });

        let started = Instant::now();
        let outcome = sh_engine("exec sleep 30").copy(&job, &cancel, None);
        canceller.join().expect("canceller panicked");

        assert_eq!(outcome.status, CopyStatus::Cancelled);
        assert_eq!(outcome.exit_code, None);
        // The copier was killed and reaped rather than waited out
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[test]
    fn test_cancel_kills_processes_spawned_by_copier() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        populate(&src, &[("a.txt", b"a")]);
        let pid_file = temp_dir.path().join("helper.pid");
        let job = TransferJob::new(&src, temp_dir.path().join("dst"), "Documents");

        let cancel = CancellationToken::new();
        let remote = cancel.clone();
        let watched = pid_file.clone();
        let canceller = thread::spawn(move || {
            let started = Instant::now();
            while !watched.exists() && started.elapsed() < Duration::from_secs(5) {
                thread::sleep(Duration::from_millis(10));
            }
            thread::sleep(Duration::from_millis(50));
            remote.cancel();
        });

        // Not exec'd: the shell stays the direct child and the helper is its child
        let outcome = sh_engine("sleep 37 & echo $! > \"$0/../helper.pid\"; wait")
            .copy(&job, &cancel, None);
        canceller.join().expect("canceller panicked");
        assert_eq!(outcome.status, CopyStatus::Cancelled);

        let pid: libc::pid_t = fs::read_to_string(&pid_file)
            .expect("helper pid")
            .trim()
            .parse()
            .expect("numeric pid");
        let started = Instant::now();
        while process_alive(pid) && started.elapsed() < Duration::from_secs(3) {
            thread::sleep(Duration::from_millis(20));
        }
        assert!(!process_alive(pid), "helper {} outlived the cancelled copy", pid);
    }

    #[cfg(unix)]
    #[test]
    fn test_background_helper_does_not_hold_up_completion() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        fs::create_dir_all(&src).expect("mkdir");
        let job = TransferJob::new(&src, temp_dir.path().join("dst"), "Music");

        let started = Instant::now();
        let outcome = sh_engine("sleep 30 & exit 8").copy(&job, &CancellationToken::new(), None);

        assert_eq!(outcome.status, CopyStatus::ProcessError);
        assert_eq!(outcome.exit_code, Some(8));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_before_cancel_keeps_exit_status() {
        let mut child = Command::new("sh")
            .args(["-c", "exit 3"])
            .spawn()
            .expect("spawn sh");
        // Let the child finish before the loop first looks at it
        thread::sleep(Duration::from_millis(300));
        let cancel = CancellationToken::new();
        cancel.cancel();

        match wait_for_exit(&mut child, &cancel, Duration::from_millis(20)) {
            Waited::Exited(status) => assert_eq!(status.code(), Some(3)),
            Waited::Cancelled => panic!("finished copier reported as cancelled"),
            Waited::WaitFailed(e) => panic!("wait failed: {}", e),
        }
    }

    #[test]
    fn test_cancelled_readback_cancels_outcome() {
        let outcome = CopyOutcome {
            status: CopyStatus::Success,
            files_copied: 4,
            files_failed: 0,
            files_total: 4,
            exit_code: Some(1),
            error_detail: None,
            elapsed: Duration::ZERO,
        };

        let outcome = apply_readback(outcome, Err(EngineError::Cancelled));

        assert_eq!(outcome.status, CopyStatus::Cancelled);
        assert_eq!(outcome.exit_code, Some(1));
        assert_eq!(outcome.error_detail.as_deref(), Some("Transfer cancelled"));
    }

    #[test]
    fn test_cancelled_before_launch() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        populate(&src, &[("a.txt", b"a")]);
        let marker = temp_dir.path().join("launched");
        let copier = CommandCopier::new(
            "sh",
            &["-c", "touch \"$0\"", marker.to_str().unwrap(), "{source}", "{destination}"],
        );
        let engine = CopyEngine::with_copier(test_config(), Box::new(copier));
        let job = TransferJob::new(&src, temp_dir.path().join("dst"), "Favorites");

        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = engine.copy(&job, &cancel, None);

        assert_eq!(outcome.status, CopyStatus::Cancelled);
        assert_eq!(outcome.files_total, 1);
        assert!(!marker.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_verify_written_catches_corrupted_content() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        populate(&src, &[("a.txt", b"Y"), ("b.txt", b"same")]);
        let engine = sh_engine("cp -R \"$0\"/. \"$1\" && printf X > \"$1/a.txt\"");

        let plain = TransferJob::new(&src, temp_dir.path().join("plain"), "Documents");
        let outcome = engine.copy(&plain, &CancellationToken::new(), None);
        assert_eq!(outcome.status, CopyStatus::Success);

        let checked = TransferJob::new(&src, temp_dir.path().join("checked"), "Documents")
            .with_verify_written(true);
        let outcome = engine.copy(&checked, &CancellationToken::new(), None);
        assert_eq!(outcome.status, CopyStatus::PartialFailure);
        assert_eq!(outcome.files_failed, 1);
        assert!(outcome.error_detail.unwrap().contains("read-back"));
    }

    #[cfg(unix)]
    #[test]
    fn test_progress_events_reach_sink() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        populate(&src, &[("a.txt", b"aaaa"), ("b.txt", b"bbbb")]);
        let job = TransferJob::new(&src, temp_dir.path().join("dst"), "Downloads");

        let (tx, rx) = crossbeam_channel::unbounded();
        let sink: Arc<dyn ProgressSink> = Arc::new(ChannelSink::new(tx));
        let outcome = sh_engine("sleep 0.3; cp -R \"$0\"/. \"$1\"").copy(
            &job,
            &CancellationToken::new(),
            Some(sink),
        );
        assert_eq!(outcome.status, CopyStatus::Success);

        let events: Vec<ProgressEvent> = rx.try_iter().collect();
        assert!(matches!(
            events.first(),
            Some(ProgressEvent::JobStarted { files_total: 2, bytes_total: 8, .. })
        ));
        assert!(events.iter().any(|e| matches!(e, ProgressEvent::Progress { .. })));
        assert!(matches!(events.last(), Some(ProgressEvent::JobCompleted { .. })));
    }
}
