use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid search request: {0}")]
    Validation(#[from] ValidationError),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Secret error: {0}")]
    Secret(#[from] crate::secrets::SecretError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

/// Reasons a search request is rejected before any task is created.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No sources selected")]
    NoSources,

    #[error("Unknown source '{id}'")]
    UnknownSource { id: String },

    #[error("None of the selected sources are available (skipped: {})", skipped.join(", "))]
    NoAvailableSources { skipped: Vec<String> },

    #[error("Minimum salary must not be negative")]
    NegativeSalary,
}

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Invalid search request: {0}")]
    Validation(#[from] ValidationError),

    #[error("Task '{id}' not found")]
    TaskNotFound { id: String },

    #[error("Task '{id}' is still running")]
    TaskStillRunning { id: String },

    #[error("Failed to start search: {0}")]
    Spawn(String),

    #[error("Source pool is closed")]
    PoolClosed,
}

/// Typed failure of a single source adapter. Never fatal to a search.
#[derive(Error, Debug, Clone)]
pub enum SourceError {
    #[error("Request failed: {0}")]
    Transport(String),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Rate limited by upstream")]
    RateLimited,

    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            SourceError::Parse(e.to_string())
        } else {
            SourceError::Transport(crate::sanitize::redact_url_secrets(&e.to_string()))
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Unknown source '{id}'")]
    UnknownSource { id: String },

    #[error("Source '{id}' is already registered")]
    DuplicateSource { id: String },
}

pub type Result<T> = std::result::Result<T, HarvestError>;
