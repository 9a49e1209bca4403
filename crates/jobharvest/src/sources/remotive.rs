//! Remotive: free remote-jobs API, no key. Supports server-side search and
//! categories; one request per keyword.

use async_trait::async_trait;
use log::debug;
use serde_json::Value;

use super::common::{fetch_per_keyword, join_tags, parse_salary_string, str_field, title_case_label};
use super::html::clean_html;
use super::{FetchRequest, HttpClient, SourceAdapter};
use crate::error::SourceError;
use crate::job::{RawJob, RemoteKind};

pub const SOURCE_ID: &str = "Remotive";
const BASE_URL: &str = "https://remotive.com/api/remote-jobs";

/// Keyword fragments mapped to Remotive category slugs, first match wins.
const CATEGORY_TRIGGERS: &[(&str, &str)] = &[
    ("software", "software-dev"),
    ("engineer", "software-dev"),
    ("developer", "software-dev"),
    ("data", "data"),
    ("analyst", "data"),
    ("machine learning", "data"),
    ("design", "design"),
    ("marketing", "marketing"),
    ("product", "product"),
    ("customer", "customer-support"),
    ("sales", "sales"),
    ("devops", "devops-sysadmin"),
    ("finance", "finance-legal"),
    ("hr", "hr"),
    ("writing", "writing"),
    ("qa", "qa"),
];

pub fn category_for(keyword: &str) -> Option<&'static str> {
    let kw = keyword.to_lowercase();
    CATEGORY_TRIGGERS
        .iter()
        .find(|(trigger, _)| kw.contains(trigger))
        .map(|(_, cat)| *cat)
}

pub struct RemotiveSource {
    http: HttpClient,
}

impl RemotiveSource {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    async fn fetch_keyword(
        &self,
        request: &FetchRequest,
        keyword: Option<String>,
    ) -> Result<Vec<RawJob>, SourceError> {
        let mut params: Vec<(&str, String)> =
            vec![("limit", request.max_results.min(1000).to_string())];
        if let Some(ref kw) = keyword {
            if let Some(category) = category_for(kw) {
                params.push(("category", category.to_string()));
            }
            params.push(("search", kw.clone()));
        }

        let payload = self
            .http
            .send_json(SOURCE_ID, self.http.get(BASE_URL).query(&params))
            .await?;
        parse_listings(&payload, request)
    }
}

#[async_trait]
impl SourceAdapter for RemotiveSource {
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<RawJob>, SourceError> {
        if request.remote.excludes_remote_only() {
            debug!("[{}] Remote-only board, skipped for on-site search", SOURCE_ID);
            return Ok(Vec::new());
        }
        fetch_per_keyword(SOURCE_ID, &request.keywords, |kw| self.fetch_keyword(request, kw)).await
    }
}

pub fn parse_listings(payload: &Value, request: &FetchRequest) -> Result<Vec<RawJob>, SourceError> {
    let items = payload
        .get("jobs")
        .and_then(Value::as_array)
        .ok_or_else(|| SourceError::Parse("missing 'jobs' array".to_string()))?;

    let mut jobs = Vec::new();
    for item in items {
        if jobs.len() >= request.max_results {
            break;
        }

        let title = str_field(item, "title");
        if title.is_empty() {
            continue;
        }
        let company = str_field(item, "company_name");
        let description = str_field(item, "description");
        let tags = join_tags(item.get("tags"));

        let (salary_min, salary_max) = parse_salary_string(str_field(item, "salary"));
        if !request.admits_salary(salary_max) {
            continue;
        }

        let searchable = format!("{} {} {} {}", title, company, description, tags);
        if !request.matches(&searchable) {
            continue;
        }

        let location = match str_field(item, "candidate_required_location") {
            "" => "Worldwide",
            loc => loc,
        };

        jobs.push(RawJob {
            title: title.to_string(),
            company: company.to_string(),
            location: location.to_string(),
            description: clean_html(description),
            url: str_field(item, "url").to_string(),
            source: SOURCE_ID.to_string(),
            remote: RemoteKind::Remote,
            salary_min,
            salary_max,
            salary_currency: "USD".to_string(),
            job_type: title_case_label(str_field(item, "job_type")),
            experience_level: String::new(),
            date_posted: str_field(item, "publication_date").to_string(),
            tags,
            company_logo: Some(str_field(item, "company_logo").to_string()).filter(|s| !s.is_empty()),
        });
    }
    Ok(jobs)
}
