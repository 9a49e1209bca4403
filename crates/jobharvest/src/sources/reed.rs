//! Reed.co.uk: keyed search API. Authenticates with HTTP basic auth, the key
//! as user name and an empty password.

use async_trait::async_trait;
use log::{info, warn};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use super::common::{fetch_per_keyword, positive_f64, str_field};
use super::html::clean_html;
use super::{FetchRequest, HttpClient, SourceAdapter};
use crate::config::ReedConfig;
use crate::error::SourceError;
use crate::job::{RawJob, RemoteKind};
use crate::search::JobType;
use crate::secrets::{resolve_secret_optional, SecretError};

pub const SOURCE_ID: &str = "Reed";
const BASE_URL: &str = "https://www.reed.co.uk/api/1.0/search";
const MAX_PER_REQUEST: usize = 100;
const MAX_PAGES: usize = 10;

pub struct ReedSource {
    http: HttpClient,
    api_key: Option<SecretString>,
}

impl ReedSource {
    pub fn from_config(http: HttpClient, config: &ReedConfig) -> Result<Self, SecretError> {
        let api_key = resolve_secret_optional(
            config.api_key.as_deref(),
            config.api_key_file.as_deref(),
            config.api_key_env_var.as_deref(),
        )?;
        if api_key.is_none() {
            info!("[{}] API key not configured, source unavailable", SOURCE_ID);
        }
        Ok(Self { http, api_key })
    }

    async fn fetch_keyword(
        &self,
        api_key: &SecretString,
        request: &FetchRequest,
        keyword: Option<String>,
    ) -> Result<Vec<RawJob>, SourceError> {
        let mut jobs = Vec::new();
        let mut skip = 0usize;

        for page in 0..MAX_PAGES {
            if jobs.len() >= request.max_results {
                break;
            }
            let take = MAX_PER_REQUEST.min(request.max_results - jobs.len());

            let mut params: Vec<(&str, String)> = vec![
                ("resultsToTake", take.to_string()),
                ("resultsToSkip", skip.to_string()),
            ];
            if let Some(ref kw) = keyword {
                params.push(("keywords", kw.clone()));
            }
            if let Some(ref location) = request.location {
                params.push(("locationName", location.clone()));
            }
            if let Some(salary) = request.salary_min.filter(|s| *s > 0.0) {
                params.push(("minimumSalary", (salary as u64).to_string()));
            }
            match request.job_type {
                Some(JobType::FullTime) => params.push(("fullTime", "true".to_string())),
                Some(JobType::PartTime) => params.push(("partTime", "true".to_string())),
                Some(JobType::Contract) => params.push(("contract", "true".to_string())),
                Some(JobType::Internship) | Some(JobType::Freelance) => {
                    params.push(("temp", "true".to_string()))
                }
                None => {}
            }

            let req = self
                .http
                .get(BASE_URL)
                .basic_auth(api_key.expose_secret(), Some(""))
                .query(&params);
            let payload = match self.http.send_json(SOURCE_ID, req).await {
                Ok(payload) => payload,
                Err(e) if page > 0 => {
                    warn!("[{}] Page {} failed: {}", SOURCE_ID, page + 1, e);
                    break;
                }
                Err(e) => return Err(e),
            };

            let parsed = parse_results(&payload, request)?;
            skip += parsed.raw_count;
            jobs.extend(parsed.jobs);
            if parsed.raw_count < take {
                break;
            }
        }

        jobs.truncate(request.max_results);
        Ok(jobs)
    }
}

#[async_trait]
impl SourceAdapter for ReedSource {
    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<RawJob>, SourceError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| SourceError::MissingCredentials("REED_API_KEY".to_string()))?;

        fetch_per_keyword(SOURCE_ID, &request.keywords, |kw| {
            self.fetch_keyword(api_key, request, kw)
        })
        .await
    }
}

pub struct ParsedResults {
    pub jobs: Vec<RawJob>,
    /// Listings in the response before local filtering, for paging.
    pub raw_count: usize,
}

pub fn parse_results(payload: &Value, request: &FetchRequest) -> Result<ParsedResults, SourceError> {
    let items = match payload {
        Value::Array(items) => items,
        other => other
            .get("results")
            .and_then(Value::as_array)
            .ok_or_else(|| SourceError::Parse("missing 'results' array".to_string()))?,
    };

    let job_type = request.job_type.map(|t| t.as_str()).unwrap_or("");
    let mut jobs = Vec::new();
    for item in items {
        let title = str_field(item, "jobTitle");
        if title.is_empty() {
            continue;
        }
        let description = str_field(item, "jobDescription");

        let is_remote = format!("{} {}", title, description)
            .to_lowercase()
            .contains("remote");
        if !request.remote.admits_remote_flag(is_remote) {
            continue;
        }

        let salary_min = positive_f64(item.get("minimumSalary"));
        let salary_max = positive_f64(item.get("maximumSalary"));
        if !request.admits_salary(salary_max) {
            continue;
        }

        jobs.push(RawJob {
            title: title.to_string(),
            company: str_field(item, "employerName").to_string(),
            location: str_field(item, "locationName").to_string(),
            description: clean_html(description),
            url: str_field(item, "jobUrl").to_string(),
            source: SOURCE_ID.to_string(),
            remote: if is_remote { RemoteKind::Remote } else { RemoteKind::OnSite },
            salary_min,
            salary_max,
            salary_currency: "GBP".to_string(),
            job_type: job_type.to_string(),
            experience_level: String::new(),
            date_posted: str_field(item, "date").to_string(),
            tags: String::new(),
            company_logo: None,
        });
    }

    Ok(ParsedResults {
        jobs,
        raw_count: items.len(),
    })
}
