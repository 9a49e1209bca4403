//! Scripted source adapters for orchestrator tests. None of them touch the network.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use crossbeam_channel::{unbounded, Receiver, Sender};

use jobharvest::{FetchRequest, RawJob, SourceAdapter, SourceError};

/// How long a gated adapter waits for release before giving up.
const GATE_TIMEOUT: Duration = Duration::from_secs(10);

/// Counts how often an adapter was invoked.
#[derive(Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Returns a fixed batch.
pub struct StaticSource {
    pub jobs: Vec<RawJob>,
    pub calls: CallCounter,
}

impl StaticSource {
    pub fn new(jobs: Vec<RawJob>) -> Self {
        Self {
            jobs,
            calls: CallCounter::default(),
        }
    }
}

#[async_trait]
impl SourceAdapter for StaticSource {
    async fn fetch(&self, _request: &FetchRequest) -> Result<Vec<RawJob>, SourceError> {
        self.calls.hit();
        Ok(self.jobs.clone())
    }
}

/// Always fails with the given error.
pub struct FailingSource {
    pub error: SourceError,
    pub calls: CallCounter,
}

impl FailingSource {
    pub fn transport(message: &str) -> Self {
        Self {
            error: SourceError::Transport(message.to_string()),
            calls: CallCounter::default(),
        }
    }
}

#[async_trait]
impl SourceAdapter for FailingSource {
    async fn fetch(&self, _request: &FetchRequest) -> Result<Vec<RawJob>, SourceError> {
        self.calls.hit();
        Err(self.error.clone())
    }
}

/// Registered but never runnable, like a keyed source without a key.
pub struct UnavailableSource;

#[async_trait]
impl SourceAdapter for UnavailableSource {
    fn is_available(&self) -> bool {
        false
    }

    async fn fetch(&self, _request: &FetchRequest) -> Result<Vec<RawJob>, SourceError> {
        Err(SourceError::MissingCredentials("TEST_KEY".to_string()))
    }
}

/// Signals when it starts, then blocks until released.
///
/// The blocking wait is fine here: every pool worker runs its own
/// single-threaded runtime and handles one source at a time.
pub struct GatedSource {
    pub jobs: Vec<RawJob>,
    pub calls: CallCounter,
    started: Sender<()>,
    release: Receiver<()>,
}

/// Test-side handle of a [`GatedSource`].
pub struct Gate {
    started: Receiver<()>,
    release: Sender<()>,
}

impl Gate {
    /// Waits until the adapter has been invoked.
    pub fn wait_started(&self) {
        self.started
            .recv_timeout(GATE_TIMEOUT)
            .expect("gated source was never started");
    }

    pub fn has_started(&self) -> bool {
        !self.started.is_empty()
    }

    pub fn release(&self) {
        let _ = self.release.send(());
    }
}

impl GatedSource {
    pub fn new(jobs: Vec<RawJob>) -> (Self, Gate) {
        let (started_tx, started_rx) = unbounded();
        let (release_tx, release_rx) = unbounded();
        let source = Self {
            jobs,
            calls: CallCounter::default(),
            started: started_tx,
            release: release_rx,
        };
        let gate = Gate {
            started: started_rx,
            release: release_tx,
        };
        (source, gate)
    }
}

#[async_trait]
impl SourceAdapter for GatedSource {
    async fn fetch(&self, _request: &FetchRequest) -> Result<Vec<RawJob>, SourceError> {
        self.calls.hit();
        let _ = self.started.send(());
        match self.release.recv_timeout(GATE_TIMEOUT) {
            Ok(()) => Ok(self.jobs.clone()),
            Err(_) => Err(SourceError::Other("gate never released".to_string())),
        }
    }
}

/// Sleeps, tracking the highest number of adapters running at once.
pub struct SlowSource {
    pub delay: Duration,
    pub in_flight: Arc<AtomicUsize>,
    pub peak: Arc<AtomicUsize>,
    pub jobs: Vec<RawJob>,
}

#[async_trait]
impl SourceAdapter for SlowSource {
    async fn fetch(&self, _request: &FetchRequest) -> Result<Vec<RawJob>, SourceError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(self.jobs.clone())
    }
}
