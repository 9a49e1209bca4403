//! The mutable record of one search run and its per-source progress.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::dedup::BatchOutcome;
use crate::search::SearchCriteria;

/// Task lifecycle. `Completed`, `Cancelled` and `Failed` are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Cancelled | TaskStatus::Failed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Cancelled => "cancelled",
            TaskStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceState {
    Pending,
    Running,
    Completed,
    Failed,
    /// Never dispatched: cancelled, halted after a storage failure, or unavailable.
    Skipped,
    /// Fetched, but the records were dropped because the task had already failed.
    Discarded,
}

impl SourceState {
    pub fn is_finished(&self) -> bool {
        !matches!(self, SourceState::Pending | SourceState::Running)
    }
}

/// Progress of one selected source within a task.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceProgress {
    pub source: String,
    pub state: SourceState,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub jobs: usize,
    pub saved: usize,
    pub error: Option<String>,
}

impl SourceProgress {
    fn new(source: &str, state: SourceState) -> Self {
        Self {
            source: source.to_string(),
            state,
            started_at: None,
            finished_at: None,
            jobs: 0,
            saved: 0,
            error: None,
        }
    }

    pub fn elapsed_seconds(&self) -> Option<f64> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some(seconds_between(start, end)),
            _ => None,
        }
    }
}

/// A non-fatal error reported by one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFailure {
    pub source: String,
    pub message: String,
}

/// One search run.
///
/// Only the orchestrator mutates a task, and always while holding the task's
/// lock, so one source's counters are applied in a single step.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub status: TaskStatus,
    pub criteria: SearchCriteria,
    pub total_sources: usize,
    pub completed_sources: usize,
    /// Most recently started source still in flight. Display only.
    pub current_source: Option<String>,
    /// Jobs returned per source, for sources that finished successfully.
    pub source_results: BTreeMap<String, usize>,
    pub jobs_found: usize,
    pub new_jobs_saved: usize,
    pub errors: Vec<SourceFailure>,
    /// Requested sources dropped at submission because they were unavailable.
    pub skipped_sources: Vec<String>,
    pub source_status: Vec<SourceProgress>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Creates a pending task for the runnable `sources`.
    pub fn new(id: String, criteria: SearchCriteria, sources: &[String], skipped: Vec<String>) -> Self {
        let mut source_status: Vec<SourceProgress> = sources
            .iter()
            .map(|s| SourceProgress::new(s, SourceState::Pending))
            .collect();
        for s in &skipped {
            let mut progress = SourceProgress::new(s, SourceState::Skipped);
            progress.error = Some("source not available".to_string());
            source_status.push(progress);
        }

        Self {
            id,
            status: TaskStatus::Pending,
            criteria,
            total_sources: sources.len(),
            completed_sources: 0,
            current_source: None,
            source_results: BTreeMap::new(),
            jobs_found: 0,
            new_jobs_saved: 0,
            errors: Vec::new(),
            skipped_sources: skipped,
            source_status,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn start(&mut self) {
        if self.status == TaskStatus::Pending {
            self.status = TaskStatus::Running;
            self.started_at = Some(Utc::now());
        }
    }

    pub fn progress(&self, source: &str) -> Option<&SourceProgress> {
        self.source_status.iter().find(|p| p.source == source)
    }

    fn progress_mut(&mut self, source: &str) -> Option<&mut SourceProgress> {
        self.source_status
            .iter_mut()
            .find(|p| p.source == source && p.state != SourceState::Skipped)
    }

    pub fn mark_running(&mut self, source: &str) {
        if let Some(p) = self.progress_mut(source) {
            p.state = SourceState::Running;
            p.started_at = Some(Utc::now());
        }
        self.current_source = Some(source.to_string());
    }

    /// Applies one source's persisted batch.
    pub fn record_success(&mut self, source: &str, outcome: BatchOutcome) {
        self.completed_sources += 1;
        self.jobs_found += outcome.found;
        self.new_jobs_saved += outcome.saved;
        self.source_results.insert(source.to_string(), outcome.found);
        self.finish_source(source, SourceState::Completed, outcome.found, outcome.saved, None);
    }

    /// Records an adapter or storage failure. The source still counts as completed.
    pub fn record_failure(&mut self, source: &str, message: String) {
        self.completed_sources += 1;
        self.errors.push(SourceFailure {
            source: source.to_string(),
            message: message.clone(),
        });
        self.finish_source(source, SourceState::Failed, 0, 0, Some(message));
    }

    /// Records a source whose fetched records were dropped.
    pub fn record_discarded(&mut self, source: &str, found: usize) {
        self.completed_sources += 1;
        self.finish_source(source, SourceState::Discarded, found, 0, None);
    }

    /// Records a source that was never dispatched.
    pub fn record_skipped(&mut self, source: &str) {
        if let Some(p) = self.progress_mut(source) {
            if p.state == SourceState::Pending {
                p.state = SourceState::Skipped;
            }
        }
    }

    fn finish_source(
        &mut self,
        source: &str,
        state: SourceState,
        jobs: usize,
        saved: usize,
        error: Option<String>,
    ) {
        if let Some(p) = self.progress_mut(source) {
            p.state = state;
            p.finished_at = Some(Utc::now());
            p.jobs = jobs;
            p.saved = saved;
            p.error = error;
        }
        if self.current_source.as_deref() == Some(source) {
            self.current_source = self
                .source_status
                .iter()
                .rev()
                .find(|p| p.state == SourceState::Running)
                .map(|p| p.source.clone());
        }
    }

    /// Moves the task into a terminal state. A terminal task never changes again.
    pub fn finish(&mut self, status: TaskStatus) {
        if self.status.is_terminal() || !status.is_terminal() {
            return;
        }
        for p in self.source_status.iter_mut() {
            if p.state == SourceState::Pending {
                p.state = SourceState::Skipped;
            }
        }
        self.status = status;
        self.finished_at = Some(Utc::now());
        self.current_source = None;
    }

    pub fn elapsed_seconds(&self) -> f64 {
        match self.started_at {
            Some(start) => seconds_between(start, self.finished_at.unwrap_or_else(Utc::now)),
            None => 0.0,
        }
    }
}

fn seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds().max(0) as f64 / 1000.0
}

/// Read-only copy of a task handed to pollers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSnapshot {
    #[serde(flatten)]
    pub task: Task,
    pub elapsed_seconds: f64,
    pub cancel_requested: bool,
}

impl TaskSnapshot {
    pub fn new(task: &Task, cancel_requested: bool) -> Self {
        Self {
            task: task.clone(),
            elapsed_seconds: task.elapsed_seconds(),
            cancel_requested,
        }
    }

    pub fn status(&self) -> TaskStatus {
        self.task.status
    }

    pub fn is_terminal(&self) -> bool {
        self.task.status.is_terminal()
    }
}
