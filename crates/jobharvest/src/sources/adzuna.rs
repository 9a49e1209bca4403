//! Adzuna: keyed search API (free developer keys at developer.adzuna.com).
//! One request series per keyword, paged 50 at a time.

use async_trait::async_trait;
use log::{info, warn};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use super::common::{fetch_per_keyword, positive_f64, str_field, title_case_label};
use super::html::{clean_html, strip_html};
use super::{FetchRequest, HttpClient, SourceAdapter};
use crate::config::AdzunaConfig;
use crate::error::SourceError;
use crate::job::{RawJob, RemoteKind};
use crate::secrets::{resolve_secret_optional, SecretError};

pub const SOURCE_ID: &str = "Adzuna";
const BASE_URL: &str = "https://api.adzuna.com/v1/api/jobs";
const RESULTS_PER_PAGE: usize = 50;

struct Credentials {
    app_id: SecretString,
    app_key: SecretString,
}

pub struct AdzunaSource {
    http: HttpClient,
    credentials: Option<Credentials>,
    country: String,
}

impl AdzunaSource {
    /// Builds the adapter, resolving credentials. Missing credentials leave the
    /// adapter registered but unavailable.
    pub fn from_config(http: HttpClient, config: &AdzunaConfig) -> Result<Self, SecretError> {
        let app_id = resolve_secret_optional(
            config.app_id.as_deref(),
            config.app_id_file.as_deref(),
            config.app_id_env_var.as_deref(),
        )?;
        let app_key = resolve_secret_optional(
            config.app_key.as_deref(),
            config.app_key_file.as_deref(),
            config.app_key_env_var.as_deref(),
        )?;

        let credentials = match (app_id, app_key) {
            (Some(app_id), Some(app_key)) => Some(Credentials { app_id, app_key }),
            _ => {
                info!("[{}] API keys not configured, source unavailable", SOURCE_ID);
                None
            }
        };

        Ok(Self {
            http,
            credentials,
            country: config.country.to_ascii_lowercase(),
        })
    }

    async fn fetch_keyword(
        &self,
        credentials: &Credentials,
        request: &FetchRequest,
        keyword: Option<String>,
    ) -> Result<Vec<RawJob>, SourceError> {
        let max_pages = (request.max_results / RESULTS_PER_PAGE).max(1);
        let mut jobs = Vec::new();

        for page in 1..=max_pages {
            if jobs.len() >= request.max_results {
                break;
            }

            let mut params: Vec<(&str, String)> = vec![
                ("app_id", credentials.app_id.expose_secret().to_string()),
                ("app_key", credentials.app_key.expose_secret().to_string()),
                ("results_per_page", RESULTS_PER_PAGE.to_string()),
                ("content-type", "application/json".to_string()),
            ];
            if let Some(ref kw) = keyword {
                params.push(("what", kw.clone()));
            }
            if let Some(ref location) = request.location {
                params.push(("where", location.clone()));
            }
            if let Some(salary) = request.salary_min.filter(|s| *s > 0.0) {
                params.push(("salary_min", (salary as u64).to_string()));
            }
            if let Some(days) = request.posted_in_last_days {
                params.push(("max_days_old", days.to_string()));
            }

            let url = format!("{}/{}/search/{}", BASE_URL, self.country, page);
            let payload = match self
                .http
                .send_json(SOURCE_ID, self.http.get(&url).query(&params))
                .await
            {
                Ok(payload) => payload,
                Err(e) if page > 1 => {
                    warn!("[{}] Page {} failed: {}", SOURCE_ID, page, e);
                    break;
                }
                Err(e) => return Err(e),
            };

            let page_jobs = parse_results(&payload, request, &self.country)?;
            if page_jobs.is_empty() {
                break;
            }
            let remaining = request.max_results - jobs.len();
            jobs.extend(page_jobs.into_iter().take(remaining));
        }

        Ok(jobs)
    }
}

#[async_trait]
impl SourceAdapter for AdzunaSource {
    fn is_available(&self) -> bool {
        self.credentials.is_some()
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<RawJob>, SourceError> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or_else(|| SourceError::MissingCredentials("ADZUNA_APP_ID / ADZUNA_APP_KEY".to_string()))?;

        fetch_per_keyword(SOURCE_ID, &request.keywords, |kw| {
            self.fetch_keyword(credentials, request, kw)
        })
        .await
    }
}

/// Currency of the Adzuna country site.
pub fn currency_for_country(country: &str) -> &'static str {
    match country {
        "gb" => "GBP",
        "at" | "be" | "de" | "es" | "fr" | "it" | "nl" => "EUR",
        "au" => "AUD",
        "ca" => "CAD",
        "in" => "INR",
        "nz" => "NZD",
        "pl" => "PLN",
        "sg" => "SGD",
        "za" => "ZAR",
        "br" => "BRL",
        "ch" => "CHF",
        "mx" => "MXN",
        _ => "USD",
    }
}

/// Parses one results page. An empty result means there are no more pages.
pub fn parse_results(
    payload: &Value,
    request: &FetchRequest,
    country: &str,
) -> Result<Vec<RawJob>, SourceError> {
    let items = payload
        .get("results")
        .and_then(Value::as_array)
        .ok_or_else(|| SourceError::Parse("missing 'results' array".to_string()))?;

    let mut jobs = Vec::new();
    for item in items {
        let title = strip_html(str_field(item, "title"));
        if title.is_empty() {
            continue;
        }
        let description = str_field(item, "description");

        let is_remote = format!("{} {}", title, description)
            .to_lowercase()
            .contains("remote");
        if !request.remote.admits_remote_flag(is_remote) {
            continue;
        }

        let company = item
            .get("company")
            .map(|c| str_field(c, "display_name"))
            .unwrap_or("");

        let location = match item.get("location") {
            Some(loc) => {
                let areas: Vec<&str> = loc
                    .get("area")
                    .and_then(Value::as_array)
                    .map(|a| a.iter().filter_map(Value::as_str).collect())
                    .unwrap_or_default();
                if areas.is_empty() {
                    str_field(loc, "display_name").to_string()
                } else {
                    areas.join(", ")
                }
            }
            None => String::new(),
        };

        let salary_min = positive_f64(item.get("salary_min"));
        let salary_max = positive_f64(item.get("salary_max"));
        if !request.admits_salary(salary_max) {
            continue;
        }

        let category = item
            .get("category")
            .map(|c| str_field(c, "label"))
            .unwrap_or("");

        jobs.push(RawJob {
            title,
            company: company.to_string(),
            location,
            description: clean_html(description),
            url: str_field(item, "redirect_url").to_string(),
            source: SOURCE_ID.to_string(),
            remote: if is_remote { RemoteKind::Remote } else { RemoteKind::OnSite },
            salary_min,
            salary_max,
            salary_currency: currency_for_country(country).to_string(),
            job_type: title_case_label(str_field(item, "contract_time")),
            experience_level: String::new(),
            date_posted: str_field(item, "created").to_string(),
            tags: category.to_string(),
            company_logo: None,
        });
    }
    Ok(jobs)
}
