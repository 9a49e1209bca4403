//! RemoteOK: free feed of remote jobs, no key. The whole feed comes back in
//! one response and is filtered locally.

use async_trait::async_trait;
use log::{debug, info};
use serde_json::Value;

use super::common::{dedup_raw, join_tags, positive_f64, str_field};
use super::html::clean_html;
use super::{FetchRequest, HttpClient, SourceAdapter};
use crate::error::SourceError;
use crate::job::{RawJob, RemoteKind};

pub const SOURCE_ID: &str = "RemoteOK";
const BASE_URL: &str = "https://remoteok.com/api";

pub struct RemoteOkSource {
    http: HttpClient,
}

impl RemoteOkSource {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

#[async_trait]
impl SourceAdapter for RemoteOkSource {
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<RawJob>, SourceError> {
        if request.remote.excludes_remote_only() {
            debug!("[{}] Remote-only board, skipped for on-site search", SOURCE_ID);
            return Ok(Vec::new());
        }

        let payload = self.http.send_json(SOURCE_ID, self.http.get(BASE_URL)).await?;
        let jobs = dedup_raw(parse_listings(&payload, request)?);
        info!("[{}] Found {} jobs matching criteria", SOURCE_ID, jobs.len());
        Ok(jobs)
    }
}

/// Parses the feed. The first element is a legal notice, not a job.
pub fn parse_listings(payload: &Value, request: &FetchRequest) -> Result<Vec<RawJob>, SourceError> {
    let items = payload
        .as_array()
        .ok_or_else(|| SourceError::Parse("expected a JSON array".to_string()))?;

    let mut jobs = Vec::new();
    for item in items.iter().skip(1) {
        if jobs.len() >= request.max_results {
            break;
        }

        let title = str_field(item, "position");
        if title.is_empty() {
            continue;
        }
        let company = str_field(item, "company");
        let description = str_field(item, "description");
        let tags = join_tags(item.get("tags"));

        let searchable = format!("{} {} {} {}", title, company, description, tags);
        if !request.matches(&searchable) {
            continue;
        }

        let salary_min = positive_f64(item.get("salary_min"));
        let salary_max = positive_f64(item.get("salary_max"));
        if !request.admits_salary(salary_max) {
            continue;
        }

        let mut url = match str_field(item, "apply_url") {
            "" => str_field(item, "url").to_string(),
            apply => apply.to_string(),
        };
        if !url.is_empty() && !url.starts_with("http") {
            url = format!("https://remoteok.com{}", url);
        }

        let location = match str_field(item, "location") {
            "" => "Remote",
            loc => loc,
        };

        jobs.push(RawJob {
            title: title.to_string(),
            company: company.to_string(),
            location: location.to_string(),
            description: clean_html(description),
            url,
            source: SOURCE_ID.to_string(),
            remote: RemoteKind::Remote,
            salary_min,
            salary_max,
            salary_currency: "USD".to_string(),
            job_type: request
                .job_type
                .map(|t| t.as_str())
                .unwrap_or("Full-time")
                .to_string(),
            experience_level: String::new(),
            date_posted: str_field(item, "date").to_string(),
            tags,
            company_logo: Some(str_field(item, "company_logo").to_string()).filter(|s| !s.is_empty()),
        });
    }
    Ok(jobs)
}
