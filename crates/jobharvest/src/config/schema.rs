use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: String,
    /// Job store location; `~` is expanded. Defaults to `~/.jobharvest/data/jobs.db`.
    #[serde(default)]
    pub database_path: Option<String>,
    /// Ceiling on the number of sources fetched in parallel per search.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_results_per_source")]
    pub default_results_per_source: u32,
    #[serde(default = "default_min_results")]
    pub min_results_per_source: u32,
    #[serde(default = "default_max_results")]
    pub max_results_per_source: u32,
    /// How long a finished task stays pollable.
    #[serde(default = "default_task_ttl_secs")]
    pub task_ttl_secs: u64,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_max_concurrency() -> usize {
    4
}

fn default_results_per_source() -> u32 {
    100
}

fn default_min_results() -> u32 {
    25
}

fn default_max_results() -> u32 {
    1000
}

fn default_task_ttl_secs() -> u64 {
    3600
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            database_path: None,
            max_concurrency: default_max_concurrency(),
            default_results_per_source: default_results_per_source(),
            min_results_per_source: default_min_results(),
            max_results_per_source: default_max_results(),
            task_ttl_secs: default_task_ttl_secs(),
            http: HttpConfig::default(),
            sources: SourcesConfig::default(),
        }
    }
}

impl Config {
    /// Resolved job store path.
    pub fn database_path(&self) -> PathBuf {
        match self.database_path.as_deref().filter(|p| !p.is_empty()) {
            Some(p) => PathBuf::from(crate::secrets::expand_home(p)),
            None => crate::db::default_database_path().unwrap_or_else(|| PathBuf::from("jobs.db")),
        }
    }

    /// Per-source cap for a request, falling back to the default and clamped
    /// into `[minResultsPerSource, maxResultsPerSource]`.
    pub fn results_per_source(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_results_per_source)
            .max(self.min_results_per_source)
            .min(self.max_results_per_source)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Pause between consecutive requests to the same source.
    #[serde(default = "default_rate_limit_delay_ms")]
    pub rate_limit_delay_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_rate_limit_delay_ms() -> u64 {
    1000
}

fn default_user_agent() -> String {
    format!("jobharvest/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            rate_limit_delay_ms: default_rate_limit_delay_ms(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourcesConfig {
    #[serde(default)]
    pub adzuna: AdzunaConfig,
    #[serde(default)]
    pub reed: ReedConfig,
}

/// Adzuna credentials. Each secret may be given directly, as a file or as an env var.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdzunaConfig {
    #[serde(default)]
    pub app_id: Option<String>,
    #[serde(default)]
    pub app_id_file: Option<String>,
    #[serde(default = "default_adzuna_app_id_env")]
    pub app_id_env_var: Option<String>,
    #[serde(default)]
    pub app_key: Option<String>,
    #[serde(default)]
    pub app_key_file: Option<String>,
    #[serde(default = "default_adzuna_app_key_env")]
    pub app_key_env_var: Option<String>,
    /// Two-letter country code of the Adzuna site to query.
    #[serde(default = "default_adzuna_country")]
    pub country: String,
}

fn default_adzuna_app_id_env() -> Option<String> {
    Some("ADZUNA_APP_ID".to_string())
}

fn default_adzuna_app_key_env() -> Option<String> {
    Some("ADZUNA_APP_KEY".to_string())
}

fn default_adzuna_country() -> String {
    "gb".to_string()
}

impl Default for AdzunaConfig {
    fn default() -> Self {
        Self {
            app_id: None,
            app_id_file: None,
            app_id_env_var: default_adzuna_app_id_env(),
            app_key: None,
            app_key_file: None,
            app_key_env_var: default_adzuna_app_key_env(),
            country: default_adzuna_country(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReedConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default = "default_reed_api_key_env")]
    pub api_key_env_var: Option<String>,
}

fn default_reed_api_key_env() -> Option<String> {
    Some("REED_API_KEY".to_string())
}

impl Default for ReedConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_file: None,
            api_key_env_var: default_reed_api_key_env(),
        }
    }
}
