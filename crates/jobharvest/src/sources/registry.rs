//! Catalog of job sources keyed by a stable identifier.
//!
//! The orchestrator only ever talks to sources through this table; adding a
//! source means registering one more adapter here.

use std::sync::Arc;

use log::{info, warn};
use serde::Serialize;

use super::adzuna::AdzunaSource;
use super::arbeitnow::ArbeitnowSource;
use super::jobicy::JobicySource;
use super::reed::ReedSource;
use super::remoteok::RemoteOkSource;
use super::remotive::RemotiveSource;
use super::{HttpClient, SourceAdapter};
use crate::config::Config;
use crate::error::{HarvestError, RegistryError, ValidationError};

#[derive(Clone)]
pub struct RegisteredSource {
    pub id: String,
    pub adapter: Arc<dyn SourceAdapter>,
    pub requires_key: bool,
    pub is_free: bool,
}

impl std::fmt::Debug for RegisteredSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredSource")
            .field("id", &self.id)
            .field("requires_key", &self.requires_key)
            .field("is_free", &self.is_free)
            .finish_non_exhaustive()
    }
}

/// Public description of a registered source.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SourceInfo {
    pub id: String,
    pub requires_key: bool,
    pub is_free: bool,
    pub available: bool,
}

/// Outcome of resolving a requested source list.
#[derive(Debug, Clone)]
pub struct SourceSelection {
    /// Sources that will run, in request order, without duplicates.
    pub runnable: Vec<RegisteredSource>,
    /// Known sources that were requested but are not available.
    pub skipped: Vec<String>,
}

#[derive(Default)]
pub struct SourceRegistry {
    sources: Vec<RegisteredSource>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in adapter, credentials resolved from `config`.
    pub fn with_builtin_sources(config: &Config) -> Result<Self, HarvestError> {
        let http = HttpClient::new(&config.http)?;
        let mut registry = Self::new();

        registry.register(
            super::remoteok::SOURCE_ID,
            Arc::new(RemoteOkSource::new(http.clone())),
            false,
            true,
        )?;
        registry.register(
            super::arbeitnow::SOURCE_ID,
            Arc::new(ArbeitnowSource::new(http.clone())),
            false,
            true,
        )?;
        registry.register(
            super::remotive::SOURCE_ID,
            Arc::new(RemotiveSource::new(http.clone())),
            false,
            true,
        )?;
        registry.register(
            super::jobicy::SOURCE_ID,
            Arc::new(JobicySource::new(http.clone())),
            false,
            true,
        )?;
        registry.register(
            super::adzuna::SOURCE_ID,
            Arc::new(AdzunaSource::from_config(http.clone(), &config.sources.adzuna)?),
            true,
            true,
        )?;
        registry.register(
            super::reed::SOURCE_ID,
            Arc::new(ReedSource::from_config(http, &config.sources.reed)?),
            true,
            true,
        )?;

        info!(
            "Registered {} sources ({} available)",
            registry.len(),
            registry.sources.iter().filter(|s| s.adapter.is_available()).count()
        );
        Ok(registry)
    }

    /// Adds a source. Identifiers are unique, compared case-insensitively.
    pub fn register(
        &mut self,
        id: &str,
        adapter: Arc<dyn SourceAdapter>,
        requires_key: bool,
        is_free: bool,
    ) -> Result<(), RegistryError> {
        if self.find(id).is_some() {
            return Err(RegistryError::DuplicateSource { id: id.to_string() });
        }
        self.sources.push(RegisteredSource {
            id: id.to_string(),
            adapter,
            requires_key,
            is_free,
        });
        Ok(())
    }

    /// All identifiers in registration order.
    pub fn ids(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.id.as_str()).collect()
    }

    pub fn get(&self, id: &str) -> Result<&RegisteredSource, RegistryError> {
        self.find(id)
            .ok_or_else(|| RegistryError::UnknownSource { id: id.to_string() })
    }

    fn find(&self, id: &str) -> Option<&RegisteredSource> {
        let id = id.trim();
        self.sources.iter().find(|s| s.id.eq_ignore_ascii_case(id))
    }

    pub fn describe(&self) -> Vec<SourceInfo> {
        self.sources
            .iter()
            .map(|s| SourceInfo {
                id: s.id.clone(),
                requires_key: s.requires_key,
                is_free: s.is_free,
                available: s.adapter.is_available(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Resolves a request's source list.
    ///
    /// Every identifier must be known. Duplicates collapse onto the first
    /// occurrence. Unavailable sources are set aside in `skipped`; if that
    /// leaves nothing to run the request is rejected.
    pub fn select(&self, requested: &[String]) -> Result<SourceSelection, ValidationError> {
        if requested.is_empty() {
            return Err(ValidationError::NoSources);
        }

        let mut runnable: Vec<RegisteredSource> = Vec::new();
        let mut skipped: Vec<String> = Vec::new();
        for id in requested {
            let source = self
                .find(id)
                .ok_or_else(|| ValidationError::UnknownSource { id: id.clone() })?;

            if runnable.iter().any(|s| s.id == source.id) || skipped.contains(&source.id) {
                continue;
            }
            if source.adapter.is_available() {
                runnable.push(source.clone());
            } else {
                warn!("Source '{}' is not available (missing API key?), skipping", source.id);
                skipped.push(source.id.clone());
            }
        }

        if runnable.is_empty() {
            return Err(ValidationError::NoAvailableSources { skipped });
        }
        Ok(SourceSelection { runnable, skipped })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::job::RawJob;
    use crate::sources::FetchRequest;
    use async_trait::async_trait;

    struct Stub {
        available: bool,
    }

    #[async_trait]
    impl SourceAdapter for Stub {
        fn is_available(&self) -> bool {
            self.available
        }

        async fn fetch(&self, _request: &FetchRequest) -> Result<Vec<RawJob>, SourceError> {
            Ok(Vec::new())
        }
    }

    fn registry() -> SourceRegistry {
        let mut registry = SourceRegistry::new();
        registry
            .register("Alpha", Arc::new(Stub { available: true }), false, true)
            .unwrap();
        registry
            .register("Beta", Arc::new(Stub { available: false }), true, true)
            .unwrap();
        registry
            .register("Gamma", Arc::new(Stub { available: true }), false, false)
            .unwrap();
        registry
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = registry();
        assert_eq!(registry.ids(), vec!["Alpha", "Beta", "Gamma"]);
        assert_eq!(registry.get("alpha").unwrap().id, "Alpha");
        assert!(matches!(
            registry.get("Delta"),
            Err(RegistryError::UnknownSource { .. })
        ));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = registry();
        let err = registry
            .register("ALPHA", Arc::new(Stub { available: true }), false, true)
            .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateSource { id: "ALPHA".to_string() });
    }

    #[test]
    fn test_describe() {
        let info = registry().describe();
        assert_eq!(info.len(), 3);
        assert!(info[0].available);
        assert!(info[1].requires_key);
        assert!(!info[1].available);
        assert!(!info[2].is_free);
    }

    #[test]
    fn test_select() {
        let registry = registry();
        let selection = registry
            .select(&ids(&["gamma", "Alpha", "Beta", "GAMMA"]))
            .unwrap();
        let runnable: Vec<_> = selection.runnable.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(runnable, vec!["Gamma", "Alpha"]);
        assert_eq!(selection.skipped, vec!["Beta"]);
    }

    #[test]
    fn test_select_errors() {
        let registry = registry();
        assert_eq!(registry.select(&[]).unwrap_err(), ValidationError::NoSources);
        assert_eq!(
            registry.select(&ids(&["Alpha", "Nope"])).unwrap_err(),
            ValidationError::UnknownSource { id: "Nope".to_string() }
        );
        assert_eq!(
            registry.select(&ids(&["Beta"])).unwrap_err(),
            ValidationError::NoAvailableSources { skipped: ids(&["Beta"]) }
        );
    }

    #[test]
    fn test_builtin_sources() {
        let mut config = Config::default();
        config.sources.adzuna.app_id_env_var = Some("JH_UNSET_1".to_string());
        config.sources.adzuna.app_key_env_var = Some("JH_UNSET_2".to_string());
        config.sources.reed.api_key = Some("key".to_string());

        let registry = SourceRegistry::with_builtin_sources(&config).unwrap();
        assert_eq!(
            registry.ids(),
            vec!["RemoteOK", "Arbeitnow", "Remotive", "Jobicy", "Adzuna", "Reed"]
        );
        let adzuna = registry.get("Adzuna").unwrap();
        assert!(adzuna.requires_key);
        assert!(!adzuna.adapter.is_available());
        assert!(registry.get("Reed").unwrap().adapter.is_available());
    }
}
