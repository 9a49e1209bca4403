//! Arbeitnow: free paginated job board API, no key. Pages are walked until
//! the cap is met and filtered locally.

use async_trait::async_trait;
use log::{info, warn};
use serde_json::Value;

use super::common::{dedup_raw, join_tags, str_field};
use super::html::clean_html;
use super::{FetchRequest, HttpClient, SourceAdapter};
use crate::error::SourceError;
use crate::job::{RawJob, RemoteKind};

pub const SOURCE_ID: &str = "Arbeitnow";
const BASE_URL: &str = "https://www.arbeitnow.com/api/job-board-api";
const MAX_PAGES: u32 = 5;

pub struct ArbeitnowSource {
    http: HttpClient,
}

impl ArbeitnowSource {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

#[async_trait]
impl SourceAdapter for ArbeitnowSource {
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<RawJob>, SourceError> {
        let mut jobs = Vec::new();

        for page in 1..=MAX_PAGES {
            if jobs.len() >= request.max_results {
                break;
            }

            let req = self.http.get(BASE_URL).query(&[("page", page)]);
            let payload = match self.http.send_json(SOURCE_ID, req).await {
                Ok(payload) => payload,
                // Later pages failing still leaves the earlier ones usable.
                Err(e) if page > 1 => {
                    warn!("[{}] Page {} failed: {}", SOURCE_ID, page, e);
                    break;
                }
                Err(e) => return Err(e),
            };

            let parsed = parse_page(&payload, request)?;
            let remaining = request.max_results - jobs.len();
            jobs.extend(parsed.jobs.into_iter().take(remaining));

            if parsed.is_empty_page || !parsed.has_next {
                break;
            }
        }

        let jobs = dedup_raw(jobs);
        info!("[{}] Found {} jobs matching criteria", SOURCE_ID, jobs.len());
        Ok(jobs)
    }
}

/// One parsed page of results.
pub struct ParsedPage {
    pub jobs: Vec<RawJob>,
    /// The page had no listings at all (before filtering).
    pub is_empty_page: bool,
    pub has_next: bool,
}

pub fn parse_page(payload: &Value, request: &FetchRequest) -> Result<ParsedPage, SourceError> {
    let items = payload
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| SourceError::Parse("missing 'data' array".to_string()))?;

    let has_next = payload
        .get("links")
        .and_then(|l| l.get("next"))
        .and_then(Value::as_str)
        .is_some_and(|next| !next.is_empty());

    let mut jobs = Vec::new();
    for item in items {
        let title = str_field(item, "title");
        if title.is_empty() {
            continue;
        }
        let is_remote = item.get("remote").and_then(Value::as_bool).unwrap_or(false);
        if !request.remote.admits_remote_flag(is_remote) {
            continue;
        }

        let company = str_field(item, "company_name");
        let description = str_field(item, "description");
        let tags = join_tags(item.get("tags"));

        let searchable = format!("{} {} {} {}", title, company, description, tags);
        if !request.matches(&searchable) {
            continue;
        }

        let url = match str_field(item, "url") {
            "" => format!("https://www.arbeitnow.com/view/{}", str_field(item, "slug")),
            u => u.to_string(),
        };

        let job_type = match join_tags(item.get("job_types")) {
            jt if jt.is_empty() => request.job_type.map(|t| t.as_str().to_string()).unwrap_or_default(),
            jt => jt,
        };

        // created_at is a unix timestamp.
        let date_posted = match item.get("created_at") {
            Some(Value::Number(n)) => n
                .as_i64()
                .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
                .map(|dt| dt.to_rfc3339())
                .unwrap_or_default(),
            Some(Value::String(s)) => s.clone(),
            _ => String::new(),
        };

        jobs.push(RawJob {
            title: title.to_string(),
            company: company.to_string(),
            location: str_field(item, "location").to_string(),
            description: clean_html(description),
            url,
            source: SOURCE_ID.to_string(),
            remote: if is_remote { RemoteKind::Remote } else { RemoteKind::OnSite },
            job_type,
            date_posted,
            tags,
            ..Default::default()
        });
    }

    Ok(ParsedPage {
        is_empty_page: items.is_empty(),
        jobs,
        has_next,
    })
}
