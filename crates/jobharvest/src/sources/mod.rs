//! Job source adapters and the registry that catalogs them.
//!
//! An adapter turns a [`FetchRequest`] into raw postings or a typed
//! [`SourceError`]. It never panics on bad input from upstream; malformed
//! items are skipped and transport failures are returned as errors so the
//! orchestrator can record them and carry on with the other sources.

use async_trait::async_trait;

use crate::error::SourceError;
use crate::job::RawJob;
use crate::search::{ExperienceLevel, JobType, RemotePreference, SearchCriteria};

pub mod adzuna;
pub mod arbeitnow;
pub mod common;
pub mod html;
pub mod http;
pub mod jobicy;
pub mod reed;
pub mod registry;
pub mod remoteok;
pub mod remotive;

pub use http::HttpClient;
pub use registry::{RegisteredSource, SourceInfo, SourceRegistry, SourceSelection};

/// The slice of search criteria an adapter sees, with the per-source cap applied.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    /// Normalised keyword set; empty means no keyword filter.
    pub keywords: Vec<String>,
    pub location: Option<String>,
    pub remote: RemotePreference,
    pub job_type: Option<JobType>,
    pub experience_level: Option<ExperienceLevel>,
    pub salary_min: Option<f64>,
    /// Upper bound on postings returned per keyword.
    pub max_results: usize,
    pub posted_in_last_days: Option<u32>,
}

impl FetchRequest {
    pub fn from_criteria(criteria: &SearchCriteria, max_results: u32) -> Self {
        Self {
            keywords: criteria.keywords.clone(),
            location: criteria.location.clone(),
            remote: criteria.remote,
            job_type: criteria.job_type,
            experience_level: criteria.experience_level,
            salary_min: criteria.salary_min,
            max_results: max_results as usize,
            posted_in_last_days: criteria.posted_in_last_days,
        }
    }

    /// Keyword match against the searchable text of a posting.
    pub fn matches(&self, text: &str) -> bool {
        common::matches_keywords(text, &self.keywords)
    }

    /// Salary floor check on a posting's known maximum.
    pub fn admits_salary(&self, known_max: Option<f64>) -> bool {
        common::passes_salary_floor(self.salary_min, known_max)
    }
}

impl Default for FetchRequest {
    fn default() -> Self {
        Self {
            keywords: Vec::new(),
            location: None,
            remote: RemotePreference::Any,
            job_type: None,
            experience_level: None,
            salary_min: None,
            max_results: 100,
            posted_in_last_days: None,
        }
    }
}

/// Capability implemented by every job source.
///
/// Implementations must be safe to call concurrently with other adapters.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Whether the adapter can run, e.g. its API key is configured.
    fn is_available(&self) -> bool {
        true
    }

    /// Fetches postings for the request, merged and de-duplicated.
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<RawJob>, SourceError>;
}
