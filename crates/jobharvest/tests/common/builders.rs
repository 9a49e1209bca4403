//! Builders for test configs and postings.

#![allow(dead_code)]

use jobharvest::{Config, RawJob, SearchCriteria};

/// Builder for `Config` instances with test-friendly defaults.
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        let mut config = Config::default();
        config.max_concurrency = 4;
        config.min_results_per_source = 1;
        config.default_results_per_source = 100;
        config.max_results_per_source = 1000;
        Self { config }
    }

    pub fn max_concurrency(mut self, n: usize) -> Self {
        self.config.max_concurrency = n;
        self
    }

    pub fn results_per_source(mut self, min: u32, default: u32, max: u32) -> Self {
        self.config.min_results_per_source = min;
        self.config.default_results_per_source = default;
        self.config.max_results_per_source = max;
        self
    }

    pub fn task_ttl_secs(mut self, secs: u64) -> Self {
        self.config.task_ttl_secs = secs;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A posting with distinct identifying fields.
pub fn posting(source: &str, n: usize) -> RawJob {
    RawJob::new(
        &format!("{} Engineer {}", source, n),
        &format!("{} Corp", source),
        &format!("https://jobs.example/{}/{}", source.to_lowercase(), n),
        source,
    )
}

/// `count` distinct postings for `source`.
pub fn postings(source: &str, count: usize) -> Vec<RawJob> {
    (0..count).map(|n| posting(source, n)).collect()
}

/// Criteria selecting `sources` with no filters.
pub fn criteria(sources: &[&str]) -> SearchCriteria {
    SearchCriteria::new(sources.iter().copied())
}
