//! Background progress polling for a running copy.
//!
//! The copier reports nothing back, so progress is measured from the outside:
//! every tick the monitor counts files under the destination and turns that
//! into a `ProgressSnapshot`. Byte progress is estimated from the file-count
//! ratio; summing sizes every tick would cost as much as the copy on large
//! trees. When a count fails (files appearing and vanishing mid-walk), the
//! tick extrapolates from the last real count and is flagged `estimated`.
//!
//! Shared state is two atomics: the `running` flag and the last observed
//! count. Stopping is signalled by dropping a channel sender.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::inventory;
use crate::model::{ProgressSnapshot, TransferJob};
use crate::progress::ProgressSink;

#[derive(Debug, Default)]
struct MonitorState {
    running: AtomicBool,
    last_count: AtomicU64,
}

/// Expected totals for the job, taken from the source baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Totals {
    pub files: u64,
    pub bytes: u64,
}

/// Tracks the last real count so failed ticks can be extrapolated.
#[derive(Debug, Clone, Copy, Default)]
struct CountTracker {
    last_count: u64,
    last_at: Duration,
}

impl CountTracker {
    fn observe(&mut self, count: u64, at: Duration) {
        self.last_count = count;
        self.last_at = at;
    }

    fn extrapolate(&self, now: Duration, files_total: u64) -> u64 {
        extrapolate(self.last_count, self.last_at, now, files_total)
    }
}

/// Estimate the current count from the rate seen up to the last real count.
///
/// The result never drops below `last_count` and never passes `files_total`
/// (unless the last real count already did).
pub fn extrapolate(last_count: u64, last_at: Duration, now: Duration, files_total: u64) -> u64 {
    if last_count == 0 || last_at.is_zero() || now <= last_at {
        return last_count;
    }
    let rate = last_count as f64 / last_at.as_secs_f64();
    let gained = rate * (now - last_at).as_secs_f64();
    let estimate = last_count.saturating_add(gained as u64);
    estimate.min(files_total.max(last_count))
}

/// Handle to a running monitor thread.
///
/// Dropping the handle stops the monitor without waiting for it.
pub struct ProgressMonitor {
    state: Arc<MonitorState>,
    stop_tx: Option<Sender<()>>,
    done_rx: Receiver<()>,
    handle: Option<JoinHandle<()>>,
    stop_grace: Duration,
}

impl ProgressMonitor {
    /// Start polling `job.destination_path()` every `interval`.
    pub fn start(
        job: TransferJob,
        totals: Totals,
        interval: Duration,
        stop_grace: Duration,
        sink: Arc<dyn ProgressSink>,
    ) -> Self {
        let state = Arc::new(MonitorState::default());
        state.running.store(true, Ordering::Release);

        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(0);

        let thread_state = Arc::clone(&state);
        let destination = job.destination_path().to_path_buf();
        let handle = thread::Builder::new()
            .name(format!("monitor-{}", job.label()))
            .spawn(move || {
                run_loop(
                    &job,
                    &destination,
                    totals,
                    interval,
                    &stop_rx,
                    &thread_state,
                    sink.as_ref(),
                );
                drop(done_tx);
            });

        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                // Progress is optional; the copy goes on without it.
                tracing::warn!("failed to start progress monitor: {}", e);
                None
            }
        };

        ProgressMonitor {
            state,
            stop_tx: Some(stop_tx),
            done_rx,
            handle,
            stop_grace,
        }
    }

    /// Last file count actually observed at the destination.
    pub fn last_count(&self) -> u64 {
        self.state.last_count.load(Ordering::Acquire)
    }

    /// Stop the monitor and return the last observed count.
    ///
    /// Waits at most the stop grace for an in-flight tick; a tick still
    /// counting a huge tree after that is left to finish on its own and
    /// emits nothing.
    pub fn stop(mut self) -> u64 {
        self.signal_stop();
        match self.done_rx.recv_timeout(self.stop_grace) {
            Err(RecvTimeoutError::Timeout) => {
                tracing::debug!("progress monitor still busy after stop; detaching");
            }
            _ => {
                if let Some(handle) = self.handle.take() {
                    let _ = handle.join();
                }
            }
        }
        self.last_count()
    }

    fn signal_stop(&mut self) {
        self.state.running.store(false, Ordering::Release);
        self.stop_tx.take();
    }
}

impl Drop for ProgressMonitor {
    fn drop(&mut self) {
        self.signal_stop();
    }
}

fn run_loop(
    job: &TransferJob,
    destination: &Path,
    totals: Totals,
    interval: Duration,
    stop_rx: &Receiver<()>,
    state: &MonitorState,
    sink: &dyn ProgressSink,
) {
    let started = Instant::now();
    let mut tracker = CountTracker::default();

    loop {
        match stop_rx.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {}
            // Sender dropped (or an explicit message): the job has ended
            _ => break,
        }

        let elapsed = started.elapsed();
        let (files_done, estimated) = match inventory::count_files(destination) {
            Ok(count) => {
                tracker.observe(count, elapsed);
                state.last_count.store(count, Ordering::Release);
                (count, false)
            }
            Err(e) => {
                tracing::debug!(
                    "progress count failed for {}, extrapolating: {}",
                    destination.display(),
                    e
                );
                (tracker.extrapolate(elapsed, totals.files), true)
            }
        };

        if !state.running.load(Ordering::Acquire) {
            break;
        }

        let snapshot = ProgressSnapshot::from_count(
            files_done,
            totals.files,
            totals.bytes,
            elapsed,
            estimated,
        );
        tracing::debug!(
            label = job.label(),
            files_done,
            files_total = totals.files,
            estimated,
            "progress tick"
        );
        sink.on_progress(job, &snapshot);
    }
}
