//! Job listing records as produced by source adapters and stored in the database.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dedup::fingerprint_parts;

/// Format used for `date_scraped` (UTC, sortable as text).
pub const SCRAPED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Remote classification of a posting as reported (or inferred) by its source.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RemoteKind {
    Remote,
    #[serde(rename = "On-site")]
    OnSite,
    Hybrid,
    #[default]
    Unknown,
}

impl RemoteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteKind::Remote => "Remote",
            RemoteKind::OnSite => "On-site",
            RemoteKind::Hybrid => "Hybrid",
            RemoteKind::Unknown => "Unknown",
        }
    }

    /// Lenient parse used for stored values; anything unrecognised is `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "remote" => RemoteKind::Remote,
            "on-site" | "onsite" | "on site" => RemoteKind::OnSite,
            "hybrid" => RemoteKind::Hybrid,
            _ => RemoteKind::Unknown,
        }
    }
}

impl std::fmt::Display for RemoteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A job posting as returned by an adapter, before fingerprinting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawJob {
    pub title: String,
    pub company: String,
    pub location: String,
    /// May contain sanitized markup.
    pub description: String,
    pub url: String,
    /// Registry identifier of the source that produced this posting.
    pub source: String,
    pub remote: RemoteKind,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub salary_currency: String,
    pub job_type: String,
    pub experience_level: String,
    /// Posted date exactly as the source supplied it.
    pub date_posted: String,
    /// Comma-separated free-form tags.
    pub tags: String,
    pub company_logo: Option<String>,
}

impl RawJob {
    /// Creates a posting with the identifying fields set and everything else empty.
    pub fn new(title: &str, company: &str, url: &str, source: &str) -> Self {
        Self {
            title: title.to_string(),
            company: company.to_string(),
            url: url.to_string(),
            source: source.to_string(),
            ..Default::default()
        }
    }

    /// Dedup identity of this posting.
    pub fn fingerprint(&self) -> String {
        fingerprint_parts(&self.title, &self.company, &self.url)
    }
}

/// A fingerprinted job record, the unit of persistence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub fingerprint: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub description: String,
    pub url: String,
    pub source: String,
    pub remote: RemoteKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary_min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary_max: Option<f64>,
    pub salary_currency: String,
    pub job_type: String,
    pub experience_level: String,
    pub date_posted: String,
    pub date_scraped: String,
    pub tags: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_logo: Option<String>,
}

impl JobRecord {
    /// Fingerprints a raw posting and stamps it with the scrape time.
    ///
    /// Descriptions are trimmed; non-positive salaries are dropped.
    pub fn from_raw(raw: RawJob, scraped_at: DateTime<Utc>) -> Self {
        let fingerprint = raw.fingerprint();
        Self {
            fingerprint,
            title: raw.title.trim().to_string(),
            company: raw.company.trim().to_string(),
            location: raw.location.trim().to_string(),
            description: raw.description.trim().to_string(),
            url: raw.url.trim().to_string(),
            source: raw.source,
            remote: raw.remote,
            salary_min: raw.salary_min.filter(|v| *v > 0.0),
            salary_max: raw.salary_max.filter(|v| *v > 0.0),
            salary_currency: raw.salary_currency,
            job_type: raw.job_type,
            experience_level: raw.experience_level,
            date_posted: raw.date_posted,
            date_scraped: scraped_at.format(SCRAPED_AT_FORMAT).to_string(),
            tags: raw.tags,
            company_logo: raw.company_logo.filter(|s| !s.is_empty()),
        }
    }
}
