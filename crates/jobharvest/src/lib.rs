pub mod config;
pub mod db;
pub mod dedup;
pub mod error;
pub mod job;
pub mod logging;
pub mod orchestrator;
pub mod sanitize;
pub mod search;
pub mod secrets;
pub mod sources;

pub use config::{load_config, load_config_or_default, Config};
pub use db::{Database, DatabaseError, JobQuery, JobStats, SortField};
pub use dedup::{fingerprint_parts, BatchOutcome, DedupGate};
pub use error::{
    ConfigError, HarvestError, RegistryError, Result, SearchError, SourceError, ValidationError,
};
pub use job::{JobRecord, RawJob, RemoteKind};
pub use orchestrator::{SearchManager, SourceState, TaskSnapshot, TaskStatus};
pub use search::{JobType, RemotePreference, SearchCriteria};
pub use secrets::{resolve_secret, resolve_secret_optional, SecretError};
pub use sources::{FetchRequest, SourceAdapter, SourceInfo, SourceRegistry};
