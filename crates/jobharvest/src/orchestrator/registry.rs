//! In-memory registry of search tasks, shared by the orchestrator and pollers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};

use super::task::{Task, TaskSnapshot};
use crate::error::SearchError;

/// A registered task plus its cooperative cancel flag.
pub struct TaskEntry {
    task: Mutex<Task>,
    cancel: AtomicBool,
}

impl TaskEntry {
    fn new(task: Task) -> Self {
        Self {
            task: Mutex::new(task),
            cancel: AtomicBool::new(false),
        }
    }

    /// Locks the task. All mutation happens under this guard.
    pub fn lock(&self) -> MutexGuard<'_, Task> {
        match self.task.lock() {
            Ok(g) => g,
            Err(poisoned) => {
                warn!("Task lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        let task = self.lock();
        TaskSnapshot::new(&task, self.cancel_requested())
    }

    pub fn request_cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn cancel_requested(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}

/// Ten years; keeps the TTL inside chrono's range.
const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 3600;

/// Upper bound on how often a poll-driven sweep runs.
const SWEEP_INTERVAL_SECS: i64 = 30;

/// Tasks by id. Terminal tasks are evicted once they have been finished for
/// longer than the TTL, or as soon as a client acknowledges them.
pub struct TaskRegistry {
    tasks: RwLock<HashMap<String, Arc<TaskEntry>>>,
    ttl: Duration,
    sweep_interval: Duration,
    /// Millisecond timestamp of the last throttled sweep.
    last_sweep_ms: AtomicI64,
}

impl TaskRegistry {
    pub fn new(ttl_secs: u64) -> Self {
        let ttl = Duration::seconds(ttl_secs.min(MAX_TTL_SECS) as i64);
        Self {
            tasks: RwLock::new(HashMap::new()),
            ttl,
            sweep_interval: ttl.min(Duration::seconds(SWEEP_INTERVAL_SECS)),
            last_sweep_ms: AtomicI64::new(i64::MIN),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<TaskEntry>>> {
        match self.tasks.read() {
            Ok(g) => g,
            Err(poisoned) => {
                warn!("Task registry lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<TaskEntry>>> {
        match self.tasks.write() {
            Ok(g) => g,
            Err(poisoned) => {
                warn!("Task registry lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    pub fn insert(&self, task: Task) -> Arc<TaskEntry> {
        let id = task.id.clone();
        let entry = Arc::new(TaskEntry::new(task));
        self.write().insert(id, Arc::clone(&entry));
        entry
    }

    pub fn get(&self, id: &str) -> Option<Arc<TaskEntry>> {
        self.read().get(id).cloned()
    }

    pub fn snapshot(&self, id: &str) -> Option<TaskSnapshot> {
        self.get(id).map(|entry| entry.snapshot())
    }

    /// Snapshots of every registered task, oldest first.
    pub fn snapshots(&self) -> Vec<TaskSnapshot> {
        let entries: Vec<Arc<TaskEntry>> = self.read().values().cloned().collect();
        let mut snapshots: Vec<TaskSnapshot> = entries.iter().map(|e| e.snapshot()).collect();
        snapshots.sort_by_key(|s| s.task.started_at);
        snapshots
    }

    pub fn remove(&self, id: &str) -> Option<Arc<TaskEntry>> {
        self.write().remove(id)
    }

    /// Removes a terminal task and returns its final snapshot.
    pub fn acknowledge(&self, id: &str) -> Result<TaskSnapshot, SearchError> {
        let entry = self
            .get(id)
            .ok_or_else(|| SearchError::TaskNotFound { id: id.to_string() })?;
        let snapshot = entry.snapshot();
        if !snapshot.is_terminal() {
            return Err(SearchError::TaskStillRunning { id: id.to_string() });
        }
        self.remove(id);
        debug!("Task {} acknowledged and removed", id);
        Ok(snapshot)
    }

    /// Throttled sweep for the poll path: runs at most once per sweep
    /// interval, and only one concurrent caller wins a due sweep.
    pub fn evict_expired(&self) -> usize {
        let now = Utc::now();
        let now_ms = now.timestamp_millis();
        let last = self.last_sweep_ms.load(Ordering::SeqCst);
        if now_ms.saturating_sub(last) < self.sweep_interval.num_milliseconds() {
            return 0;
        }
        if self
            .last_sweep_ms
            .compare_exchange(last, now_ms, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return 0;
        }
        self.evict_expired_at(now)
    }

    /// Drops terminal tasks that finished at least one TTL before `now`.
    ///
    /// Candidates are found under the read lock; the write lock is only taken
    /// when something is due.
    pub fn evict_expired_at(&self, now: DateTime<Utc>) -> usize {
        let candidates: Vec<String> = self
            .read()
            .iter()
            .filter(|(_, entry)| self.is_expired(entry, now))
            .map(|(id, _)| id.clone())
            .collect();
        if candidates.is_empty() {
            return 0;
        }

        let mut tasks = self.write();
        let mut evicted = 0;
        for id in candidates {
            if tasks.get(&id).is_some_and(|entry| self.is_expired(entry, now)) {
                tasks.remove(&id);
                evicted += 1;
            }
        }
        if evicted > 0 {
            debug!("Evicted {} expired task(s)", evicted);
        }
        evicted
    }

    fn is_expired(&self, entry: &TaskEntry, now: DateTime<Utc>) -> bool {
        let task = entry.lock();
        match task.finished_at {
            Some(finished) if task.status.is_terminal() => now - finished >= self.ttl,
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::task::TaskStatus;
    use crate::search::SearchCriteria;

    fn task(id: &str) -> Task {
        let mut task = Task::new(
            id.to_string(),
            SearchCriteria::new(["A"]),
            &["A".to_string()],
            Vec::new(),
        );
        task.start();
        task
    }

    #[test]
    fn test_insert_and_snapshot() {
        let registry = TaskRegistry::new(60);
        let entry = registry.insert(task("t1"));
        entry.lock().mark_running("A");

        let snap = registry.snapshot("t1").unwrap();
        assert_eq!(snap.task.current_source.as_deref(), Some("A"));
        assert!(!snap.cancel_requested);
        assert!(registry.snapshot("missing").is_none());

        entry.request_cancel();
        assert!(registry.snapshot("t1").unwrap().cancel_requested);
    }

    #[test]
    fn test_acknowledge() {
        let registry = TaskRegistry::new(60);
        let entry = registry.insert(task("t1"));

        assert!(matches!(
            registry.acknowledge("t1"),
            Err(SearchError::TaskStillRunning { .. })
        ));
        assert!(matches!(
            registry.acknowledge("nope"),
            Err(SearchError::TaskNotFound { .. })
        ));

        entry.lock().finish(TaskStatus::Completed);
        let snap = registry.acknowledge("t1").unwrap();
        assert_eq!(snap.status(), TaskStatus::Completed);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_evict_expired_keeps_running_tasks() {
        let registry = TaskRegistry::new(10);
        registry.insert(task("running"));
        let done = registry.insert(task("done"));
        done.lock().finish(TaskStatus::Cancelled);

        assert_eq!(registry.evict_expired(), 0);
        assert_eq!(registry.len(), 2);

        let later = Utc::now() + Duration::seconds(11);
        assert_eq!(registry.evict_expired_at(later), 1);
        assert!(registry.get("done").is_none());
        assert!(registry.get("running").is_some());

        let much_later = Utc::now() + Duration::days(365);
        assert_eq!(registry.evict_expired_at(much_later), 0);
    }

    #[test]
    fn test_poll_sweep_is_throttled() {
        let registry = TaskRegistry::new(3600);
        let old = registry.insert(task("old"));
        old.lock().finish(TaskStatus::Completed);
        old.lock().finished_at = Some(Utc::now() - Duration::hours(2));

        assert_eq!(registry.evict_expired(), 1);

        let again = registry.insert(task("again"));
        again.lock().finish(TaskStatus::Completed);
        again.lock().finished_at = Some(Utc::now() - Duration::hours(2));

        // Within the sweep interval the poll path leaves it alone.
        assert_eq!(registry.evict_expired(), 0);
        assert!(registry.get("again").is_some());
        assert_eq!(registry.evict_expired_at(Utc::now()), 1);
        assert!(registry.is_empty());
    }
}
