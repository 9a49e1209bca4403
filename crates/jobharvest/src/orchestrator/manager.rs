//! Accepts searches, runs them in the background and answers polls.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use log::{error, info, warn};
use tracing::info_span;
use uuid::Uuid;

use super::pool::{RunContext, SourcePool, SourceUnit, UnitOutcome};
use super::registry::{TaskEntry, TaskRegistry};
use super::task::{SourceState, Task, TaskSnapshot, TaskStatus};
use crate::config::Config;
use crate::dedup::DedupGate;
use crate::error::SearchError;
use crate::search::SearchCriteria;
use crate::sources::{FetchRequest, RegisteredSource, SourceRegistry};

/// Entry point for running searches.
///
/// `submit` validates a request and returns a task id straight away; the run
/// itself happens on a supervisor thread per task which feeds a bounded
/// [`SourcePool`]. Pollers read snapshots through `get_task`.
pub struct SearchManager {
    gate: DedupGate,
    sources: Arc<SourceRegistry>,
    tasks: Arc<TaskRegistry>,
    config: Config,
    supervisors: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl SearchManager {
    pub fn new(gate: DedupGate, sources: SourceRegistry, config: &Config) -> Self {
        Self {
            gate,
            sources: Arc::new(sources),
            tasks: Arc::new(TaskRegistry::new(config.task_ttl_secs)),
            config: config.clone(),
            supervisors: Mutex::new(HashMap::new()),
        }
    }

    fn supervisors(&self) -> MutexGuard<'_, HashMap<String, JoinHandle<()>>> {
        match self.supervisors.lock() {
            Ok(g) => g,
            Err(poisoned) => {
                warn!("Supervisor table lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Validates `criteria` and starts a search. Returns the new task id.
    ///
    /// Rejected requests never create a task.
    pub fn submit(&self, mut criteria: SearchCriteria) -> Result<String, SearchError> {
        criteria.normalize();
        criteria.validate()?;
        let selection = self.sources.select(&criteria.sources)?;

        self.tasks.evict_expired();
        self.supervisors().retain(|_, handle| !handle.is_finished());

        let cap = self.config.results_per_source(criteria.max_results_per_source);
        criteria.max_results_per_source = Some(cap);
        let request = FetchRequest::from_criteria(&criteria, cap);

        let id = Uuid::new_v4().to_string();
        let runnable: Vec<String> = selection.runnable.iter().map(|s| s.id.clone()).collect();
        let mut task = Task::new(id.clone(), criteria.clone(), &runnable, selection.skipped);
        task.start();
        let entry = self.tasks.insert(task);

        info!(
            "Search {} started: keywords [{}], sources [{}]",
            id,
            criteria.keyword_label(),
            runnable.join(", ")
        );

        let width = self.config.max_concurrency.max(1).min(runnable.len());
        let ctx = Arc::new(RunContext::new(entry, self.gate.clone(), request, cap as usize));
        let units = selection.runnable;
        let task_id = id.clone();

        let handle = thread::Builder::new()
            .name(format!("search-{}", &id[..8]))
            .spawn(move || supervise(&task_id, ctx, units, width))
            .map_err(|e| {
                self.tasks.remove(&id);
                SearchError::Spawn(e.to_string())
            })?;

        self.supervisors().insert(id.clone(), handle);
        Ok(id)
    }

    /// Current snapshot of a task.
    pub fn get_task(&self, id: &str) -> Result<TaskSnapshot, SearchError> {
        self.tasks.evict_expired();
        self.tasks
            .snapshot(id)
            .ok_or_else(|| SearchError::TaskNotFound { id: id.to_string() })
    }

    /// Snapshots of every task still held, oldest first.
    pub fn list_tasks(&self) -> Vec<TaskSnapshot> {
        self.tasks.evict_expired();
        self.tasks.snapshots()
    }

    /// Requests cooperative cancellation. Idempotent; a no-op on finished tasks.
    pub fn cancel(&self, id: &str) -> Result<(), SearchError> {
        let entry = self
            .tasks
            .get(id)
            .ok_or_else(|| SearchError::TaskNotFound { id: id.to_string() })?;

        let status = entry.lock().status;
        if status.is_terminal() {
            return Ok(());
        }
        if !entry.cancel_requested() {
            info!("Search {} cancellation requested", id);
            entry.request_cancel();
        }
        Ok(())
    }

    /// Removes a finished task and returns its final snapshot.
    pub fn acknowledge(&self, id: &str) -> Result<TaskSnapshot, SearchError> {
        let snapshot = self.tasks.acknowledge(id)?;
        self.supervisors().remove(id);
        Ok(snapshot)
    }

    /// Blocks until the task's supervisor has finished, then returns the
    /// final snapshot.
    pub fn wait(&self, id: &str) -> Result<TaskSnapshot, SearchError> {
        let handle = self.supervisors().remove(id);
        if let Some(handle) = handle {
            if let Err(e) = handle.join() {
                error!("Supervisor for search {} panicked: {:?}", id, e);
            }
        }
        self.tasks
            .snapshot(id)
            .ok_or_else(|| SearchError::TaskNotFound { id: id.to_string() })
    }
}

/// Drives one task: dispatches every unit, drains every report, then assigns
/// the terminal status exactly once.
fn supervise(id: &str, ctx: Arc<RunContext>, units: Vec<RegisteredSource>, width: usize) {
    let span = info_span!("search_task", task_id = %id, sources = units.len(), width);
    let _guard = span.enter();

    let pool = SourcePool::new(Arc::clone(&ctx), width, units.len());
    let mut outstanding = 0usize;
    let mut skipped = 0usize;

    for source in units {
        let source_id = source.id.clone();
        match pool.submit(SourceUnit { source }) {
            Ok(()) => outstanding += 1,
            Err(e) => {
                warn!("[{}] Could not dispatch: {}", source_id, e);
                ctx.entry.lock().record_skipped(&source_id);
                skipped += 1;
            }
        }
    }

    while outstanding > 0 {
        match pool.recv_report() {
            Some(report) => {
                outstanding -= 1;
                if report.outcome == UnitOutcome::Skipped {
                    skipped += 1;
                }
            }
            None => {
                error!("Source workers exited with {} unit(s) outstanding", outstanding);
                skipped += outstanding;
                break;
            }
        }
    }
    pool.wait();

    let status = if ctx.is_halted() {
        TaskStatus::Failed
    } else if ctx.entry.cancel_requested() && skipped > 0 {
        TaskStatus::Cancelled
    } else {
        TaskStatus::Completed
    };

    finish(&ctx.entry, status);
}

fn finish(entry: &TaskEntry, status: TaskStatus) {
    let mut task = entry.lock();
    task.finish(status);
    log_summary(&task);
}

fn log_summary(task: &Task) {
    info!(
        "Search {} {} in {:.1}s: {}/{} sources, {} jobs found, {} new",
        task.id,
        task.status,
        task.elapsed_seconds(),
        task.completed_sources,
        task.total_sources,
        task.jobs_found,
        task.new_jobs_saved
    );

    for p in &task.source_status {
        let elapsed = p
            .elapsed_seconds()
            .map(|s| format!("{:.1}s", s))
            .unwrap_or_else(|| "-".to_string());
        let marker = match p.state {
            SourceState::Failed => " [error]",
            SourceState::Skipped => " [skipped]",
            SourceState::Discarded => " [discarded]",
            _ => "",
        };
        info!("  {:<12} {:>5} jobs {:>7}{}", p.source, p.jobs, elapsed, marker);
    }

    for e in &task.errors {
        warn!("  {}: {}", e.source, e.message);
    }
}
