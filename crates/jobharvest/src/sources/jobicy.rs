//! Jobicy: free remote-jobs API, no key. Filters by tag and geography; one
//! request per keyword, at most 50 results each.

use async_trait::async_trait;
use log::debug;
use serde_json::Value;

use super::common::{fetch_per_keyword, join_tags, positive_f64, str_field};
use super::html::clean_html;
use super::{FetchRequest, HttpClient, SourceAdapter};
use crate::error::SourceError;
use crate::job::{RawJob, RemoteKind};

pub const SOURCE_ID: &str = "Jobicy";
const BASE_URL: &str = "https://jobicy.com/api/v2/remote-jobs";
const MAX_COUNT: usize = 50;

pub struct JobicySource {
    http: HttpClient,
}

impl JobicySource {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    async fn fetch_keyword(
        &self,
        request: &FetchRequest,
        keyword: Option<String>,
    ) -> Result<Vec<RawJob>, SourceError> {
        let mut params: Vec<(&str, String)> =
            vec![("count", request.max_results.min(MAX_COUNT).to_string())];
        if let Some(ref location) = request.location {
            params.push(("geo", location.clone()));
        }
        if let Some(kw) = keyword {
            params.push(("tag", kw));
        }

        let payload = self
            .http
            .send_json(SOURCE_ID, self.http.get(BASE_URL).query(&params))
            .await?;
        parse_listings(&payload, request)
    }
}

#[async_trait]
impl SourceAdapter for JobicySource {
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<RawJob>, SourceError> {
        if request.remote.excludes_remote_only() {
            debug!("[{}] Remote-only board, skipped for on-site search", SOURCE_ID);
            return Ok(Vec::new());
        }
        fetch_per_keyword(SOURCE_ID, &request.keywords, |kw| self.fetch_keyword(request, kw)).await
    }
}

pub fn parse_listings(payload: &Value, request: &FetchRequest) -> Result<Vec<RawJob>, SourceError> {
    let items: &[Value] = match payload.get("jobs") {
        Some(Value::Array(items)) => items.as_slice(),
        // Jobicy answers an unmatched tag with a success flag and no jobs.
        None if payload.get("success").is_some() => &[],
        _ => return Err(SourceError::Parse("missing 'jobs' array".to_string())),
    };

    let mut jobs = Vec::new();
    for item in items {
        if jobs.len() >= request.max_results {
            break;
        }

        let title = str_field(item, "jobTitle");
        if title.is_empty() {
            continue;
        }
        let company = str_field(item, "companyName");
        let description = str_field(item, "jobDescription");
        let geo = match str_field(item, "jobGeo") {
            "" => "Remote",
            g => g,
        };
        // jobType is a list in v2 responses and a string in older ones.
        let job_type = join_tags(item.get("jobType"));

        let salary_min = positive_f64(item.get("annualSalaryMin"));
        let salary_max = positive_f64(item.get("annualSalaryMax"));
        if !request.admits_salary(salary_max) {
            continue;
        }

        let searchable = format!("{} {} {} {} {}", title, company, description, geo, job_type);
        if !request.matches(&searchable) {
            continue;
        }

        let currency = match str_field(item, "salaryCurrency") {
            "" => "USD",
            c => c,
        };

        jobs.push(RawJob {
            title: title.to_string(),
            company: company.to_string(),
            location: geo.to_string(),
            description: clean_html(description),
            url: str_field(item, "url").to_string(),
            source: SOURCE_ID.to_string(),
            remote: RemoteKind::Remote,
            salary_min,
            salary_max,
            salary_currency: currency.to_string(),
            job_type,
            experience_level: str_field(item, "jobLevel").to_string(),
            date_posted: str_field(item, "pubDate").to_string(),
            tags: join_tags(item.get("jobIndustry")),
            company_logo: Some(str_field(item, "companyLogo").to_string()).filter(|s| !s.is_empty()),
        });
    }
    Ok(jobs)
}
