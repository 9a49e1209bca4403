//! Test harness for isolated orchestrator runs.
//!
//! `TestHarness` owns a temporary directory with a file-backed job store and
//! a source registry that tests fill with scripted adapters.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tempfile::TempDir;

use jobharvest::db::job_repo;
use jobharvest::{
    Config, Database, DedupGate, SearchManager, SourceAdapter, SourceRegistry, TaskSnapshot,
};

pub struct TestHarness {
    temp_dir: TempDir,
    pub db_path: PathBuf,
    pub db: Database,
    registry: Option<SourceRegistry>,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("data").join("jobs.db");
        let db = Database::open(&db_path).expect("Failed to open job store");

        Self {
            temp_dir,
            db_path,
            db,
            registry: Some(SourceRegistry::new()),
        }
    }

    /// Registers a free, keyless source.
    pub fn register<A: SourceAdapter + 'static>(&mut self, id: &str, adapter: A) -> &mut Self {
        self.register_shared(id, Arc::new(adapter))
    }

    pub fn register_shared(&mut self, id: &str, adapter: Arc<dyn SourceAdapter>) -> &mut Self {
        self.registry
            .as_mut()
            .expect("registry already handed to a manager")
            .register(id, adapter, false, true)
            .expect("Failed to register source");
        self
    }

    /// Builds a manager over the registered sources. Can be called once.
    pub fn manager(&mut self, config: &Config) -> SearchManager {
        let registry = self
            .registry
            .take()
            .expect("registry already handed to a manager");
        SearchManager::new(DedupGate::new(self.db.clone()), registry, config)
    }

    /// A second, independent connection to the same store file.
    pub fn reopen(&self) -> Database {
        Database::open(&self.db_path).expect("Failed to reopen job store")
    }

    pub fn stored_count(&self) -> u64 {
        job_repo::count(&self.reopen()).expect("Failed to count jobs")
    }

    pub fn stored_sources(&self) -> Vec<String> {
        job_repo::distinct_sources(&self.reopen()).expect("Failed to list sources")
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Polls until `done` holds for the task's snapshot, panicking after five seconds.
pub fn poll_until<F>(manager: &SearchManager, id: &str, done: F) -> TaskSnapshot
where
    F: Fn(&TaskSnapshot) -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let snapshot = manager.get_task(id).expect("task disappeared");
        if done(&snapshot) {
            return snapshot;
        }
        assert!(Instant::now() < deadline, "timed out waiting on task {}", id);
        thread::sleep(Duration::from_millis(10));
    }
}
