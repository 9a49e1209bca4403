//! Job fingerprinting and the dedup gate in front of the job store.
//!
//! A fingerprint is a SHA-256 over the normalised title, company and URL of a
//! posting. The source is not part of it, so the same posting reached through
//! two aggregators collapses to one row. The store's primary key on the
//! fingerprint is the only arbiter of novelty; concurrent writers race safely
//! through `INSERT OR IGNORE`.

use std::sync::atomic::AtomicBool;

use chrono::Utc;
use log::debug;
use sha2::{Digest, Sha256};

use crate::db::{job_repo, Database, DatabaseError};
use crate::job::{JobRecord, RawJob};

/// Lower-cases, trims and collapses internal whitespace.
fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn normalize_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_lowercase()
}

/// Computes the fingerprint for the identifying fields of a posting.
///
/// Pure function of its inputs: identical content always yields the same
/// 64-character lowercase hex key, across runs and processes.
pub fn fingerprint_parts(title: &str, company: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_text(title).as_bytes());
    hasher.update([0x1f]);
    hasher.update(normalize_text(company).as_bytes());
    hasher.update([0x1f]);
    hasher.update(normalize_url(url).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Result of pushing one source's batch through the gate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Records offered to the gate.
    pub found: usize,
    /// Records that were not already stored and have now been written.
    pub saved: usize,
}

/// Novelty check plus upsert-ignore write path guarding the job store.
#[derive(Clone)]
pub struct DedupGate {
    db: Database,
}

impl DedupGate {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Fingerprints a raw posting.
    pub fn fingerprint(&self, raw: &RawJob) -> String {
        raw.fingerprint()
    }

    /// Returns true if no record with this fingerprint is stored yet.
    pub fn is_novel(&self, fingerprint: &str) -> Result<bool, DatabaseError> {
        Ok(!job_repo::exists(&self.db, fingerprint)?)
    }

    /// Stores a single record. Returns false (not an error) if it was already present.
    pub fn persist(&self, record: &JobRecord) -> Result<bool, DatabaseError> {
        let saved = job_repo::insert_ignore_batch(&self.db, std::slice::from_ref(record))?;
        Ok(saved == 1)
    }

    /// Fingerprints and stores one source's output as a single transaction.
    ///
    /// Either every novel record lands or, on error, none of them do.
    pub fn persist_batch(&self, batch: Vec<RawJob>) -> Result<BatchOutcome, DatabaseError> {
        let found = batch.len();
        if found == 0 {
            return Ok(BatchOutcome::default());
        }

        let scraped_at = Utc::now();
        let records: Vec<JobRecord> = batch
            .into_iter()
            .map(|raw| JobRecord::from_raw(raw, scraped_at))
            .collect();

        let saved = job_repo::insert_ignore_batch(&self.db, &records)?;
        debug!("Dedup gate: {} offered, {} new", found, saved);

        Ok(BatchOutcome { found, saved })
    }

    /// Like [`DedupGate::persist_batch`], but the `halted` check and the write
    /// happen under one store lock, and a failed write raises `halted` before
    /// the lock is released. Returns `None` when the batch was refused.
    pub fn persist_batch_unless(
        &self,
        batch: Vec<RawJob>,
        halted: &AtomicBool,
    ) -> Result<Option<BatchOutcome>, DatabaseError> {
        let found = batch.len();
        let scraped_at = Utc::now();
        let records: Vec<JobRecord> = batch
            .into_iter()
            .map(|raw| JobRecord::from_raw(raw, scraped_at))
            .collect();

        let saved = job_repo::insert_ignore_batch_unless(&self.db, &records, halted)?;
        Ok(saved.map(|saved| {
            debug!("Dedup gate: {} offered, {} new", found, saved);
            BatchOutcome { found, saved }
        }))
    }
}
