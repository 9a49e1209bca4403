//! Bounded worker pool that runs one unit of work per selected source.
//!
//! Workers are plain threads fed through a crossbeam channel. Each worker owns
//! a single-threaded tokio runtime and blocks on one adapter at a time, so the
//! number of concurrent network calls never exceeds the pool width.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info, warn};
use tokio::runtime::Runtime;
use tracing::info_span;

use super::registry::TaskEntry;
use crate::dedup::{BatchOutcome, DedupGate};
use crate::error::{SearchError, SourceError};
use crate::job::RawJob;
use crate::sources::{FetchRequest, RegisteredSource};

/// State shared by every unit of one task.
pub struct RunContext {
    pub entry: Arc<TaskEntry>,
    pub gate: DedupGate,
    pub request: FetchRequest,
    /// Per-source cap applied to each adapter's merged output.
    pub cap: usize,
    halted: AtomicBool,
}

impl RunContext {
    pub fn new(entry: Arc<TaskEntry>, gate: DedupGate, request: FetchRequest, cap: usize) -> Self {
        Self {
            entry,
            gate,
            request,
            cap,
            halted: AtomicBool::new(false),
        }
    }

    /// Stops further dispatch after a storage failure.
    pub fn halt(&self) {
        self.halted.store(true, Ordering::SeqCst);
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    fn should_skip(&self) -> bool {
        self.is_halted() || self.entry.cancel_requested()
    }
}

pub struct SourceUnit {
    pub source: RegisteredSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOutcome {
    Saved(BatchOutcome),
    AdapterFailed(String),
    StorageFailed(String),
    /// Fetched this many records, then dropped them because the run was halted.
    Discarded(usize),
    Skipped,
}

#[derive(Debug, Clone)]
pub struct UnitReport {
    pub source: String,
    pub outcome: UnitOutcome,
    pub elapsed: Duration,
}

pub struct SourcePool {
    unit_sender: Sender<SourceUnit>,
    report_receiver: Receiver<UnitReport>,
    workers: Vec<JoinHandle<()>>,
}

impl SourcePool {
    /// Starts `worker_count` workers. `capacity` bounds both channels and
    /// should be at least the number of units that will be submitted, so
    /// submission never waits on workers.
    pub fn new(ctx: Arc<RunContext>, worker_count: usize, capacity: usize) -> Self {
        let worker_count = worker_count.max(1);
        let capacity = capacity.max(worker_count);
        let (unit_sender, unit_receiver) = bounded::<SourceUnit>(capacity);
        let (report_sender, report_receiver) = bounded::<UnitReport>(capacity);

        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let unit_rx = unit_receiver.clone();
            let report_tx = report_sender.clone();
            let worker_ctx = Arc::clone(&ctx);

            let handle = thread::spawn(move || {
                run_worker(worker_id, unit_rx, report_tx, worker_ctx);
            });
            workers.push(handle);
        }

        debug!("Started {} source workers", worker_count);

        Self {
            unit_sender,
            report_receiver,
            workers,
        }
    }

    pub fn submit(&self, unit: SourceUnit) -> Result<(), SearchError> {
        self.unit_sender
            .send(unit)
            .map_err(|_| SearchError::PoolClosed)
    }

    /// Blocks for the next unit report. `None` once every worker has exited.
    pub fn recv_report(&self) -> Option<UnitReport> {
        self.report_receiver.recv().ok()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn wait(self) {
        drop(self.unit_sender);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Source worker {} panicked: {:?}", i, e);
            }
        }

        debug!("All source workers have stopped");
    }
}

fn run_worker(
    worker_id: usize,
    unit_receiver: Receiver<SourceUnit>,
    report_sender: Sender<UnitReport>,
    ctx: Arc<RunContext>,
) {
    debug!("Source worker {} started", worker_id);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => Some(rt),
        Err(e) => {
            error!("Source worker {} could not build a runtime: {}", worker_id, e);
            None
        }
    };

    loop {
        match unit_receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(unit) => {
                let started = Instant::now();
                let source = unit.source.id.clone();
                let outcome = run_guarded(&ctx, &source, || {
                    run_unit(runtime.as_ref(), &ctx, &unit)
                });
                let report = UnitReport {
                    source,
                    outcome,
                    elapsed: started.elapsed(),
                };

                if let Err(e) = report_sender.send(report) {
                    error!("Source worker {} failed to send report: {}", worker_id, e);
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => {
                break;
            }
        }
    }

    debug!("Source worker {} stopped", worker_id);
}

/// Runs `work` for one unit, converting a panic anywhere in it into a
/// failure for that source so the worker keeps serving the queue and the
/// supervisor still gets a report.
fn run_guarded<F>(ctx: &RunContext, source: &str, work: F) -> UnitOutcome
where
    F: FnOnce() -> UnitOutcome,
{
    match panic::catch_unwind(AssertUnwindSafe(work)) {
        Ok(outcome) => outcome,
        Err(_) => {
            let message = "worker panicked while handling source".to_string();
            error!("[{}] {}", source, message);
            let mut task = ctx.entry.lock();
            if task.progress(source).map_or(true, |p| !p.state.is_finished()) {
                task.record_failure(source, message.clone());
            }
            UnitOutcome::AdapterFailed(message)
        }
    }
}

/// Runs one source end to end and applies its outcome to the task.
///
/// The batch is persisted before the task is touched, and the task is then
/// updated under one lock, so pollers see a source's found and saved counts
/// arrive together. The halted check and the write share the store lock, so
/// once one unit's write fails no other unit of the run can land records.
fn run_unit(runtime: Option<&Runtime>, ctx: &RunContext, unit: &SourceUnit) -> UnitOutcome {
    let source = unit.source.id.as_str();

    if ctx.should_skip() {
        debug!("[{}] Not dispatched", source);
        ctx.entry.lock().record_skipped(source);
        return UnitOutcome::Skipped;
    }

    ctx.entry.lock().mark_running(source);
    let _span = info_span!("source_fetch", source = %source).entered();
    info!("[{}] Fetching", source);

    let mut jobs = match fetch(runtime, &unit.source, &ctx.request) {
        Ok(jobs) => jobs,
        Err(e) => {
            let message = e.to_string();
            warn!("[{}] Failed: {}", source, message);
            ctx.entry.lock().record_failure(source, message.clone());
            return UnitOutcome::AdapterFailed(message);
        }
    };
    jobs.truncate(ctx.cap);
    let found = jobs.len();

    match ctx.gate.persist_batch_unless(jobs, &ctx.halted) {
        Ok(Some(outcome)) => {
            info!("[{}] {} jobs, {} new", source, outcome.found, outcome.saved);
            ctx.entry.lock().record_success(source, outcome);
            UnitOutcome::Saved(outcome)
        }
        Ok(None) => {
            warn!("[{}] Discarding {} jobs, task already failed", source, found);
            ctx.entry.lock().record_discarded(source, found);
            UnitOutcome::Discarded(found)
        }
        Err(e) => {
            error!("[{}] Failed to store jobs: {}", source, e);
            ctx.halt();
            let message = format!("Storage error: {}", e);
            ctx.entry.lock().record_failure(source, message.clone());
            UnitOutcome::StorageFailed(message)
        }
    }
}

/// Calls the adapter, turning a panic into a typed failure so the worker survives.
fn fetch(
    runtime: Option<&Runtime>,
    source: &RegisteredSource,
    request: &FetchRequest,
) -> Result<Vec<RawJob>, SourceError> {
    let runtime =
        runtime.ok_or_else(|| SourceError::Other("worker runtime unavailable".to_string()))?;

    match panic::catch_unwind(AssertUnwindSafe(|| {
        runtime.block_on(source.adapter.fetch(request))
    })) {
        Ok(result) => result,
        Err(_) => Err(SourceError::Other("adapter panicked".to_string())),
    }
}
