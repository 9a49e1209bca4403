//! Search criteria submitted by a caller.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::job::RemoteKind;

/// Which remote classifications a search accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemotePreference {
    #[default]
    Any,
    Remote,
    #[serde(rename = "On-site")]
    OnSite,
    Hybrid,
}

impl RemotePreference {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "any" => Some(RemotePreference::Any),
            "remote" => Some(RemotePreference::Remote),
            "on-site" | "onsite" | "on site" => Some(RemotePreference::OnSite),
            "hybrid" => Some(RemotePreference::Hybrid),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RemotePreference::Any => "Any",
            RemotePreference::Remote => "Remote",
            RemotePreference::OnSite => "On-site",
            RemotePreference::Hybrid => "Hybrid",
        }
    }

    /// Whether a posting with this classification fits the preference.
    /// Unclassified postings are only kept for `Any`.
    pub fn admits(&self, kind: RemoteKind) -> bool {
        match self {
            RemotePreference::Any => true,
            RemotePreference::Remote => kind == RemoteKind::Remote,
            RemotePreference::OnSite => kind == RemoteKind::OnSite,
            RemotePreference::Hybrid => kind == RemoteKind::Hybrid,
        }
    }

    /// Check for sources that only know "remote or not". Hybrid accepts both.
    pub fn admits_remote_flag(&self, is_remote: bool) -> bool {
        match self {
            RemotePreference::Remote => is_remote,
            RemotePreference::OnSite => !is_remote,
            RemotePreference::Any | RemotePreference::Hybrid => true,
        }
    }

    /// True when the caller explicitly asked for on-site work only; remote-only
    /// boards have nothing to offer then.
    pub fn excludes_remote_only(&self) -> bool {
        *self == RemotePreference::OnSite
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobType {
    #[serde(rename = "Full-time")]
    FullTime,
    #[serde(rename = "Part-time")]
    PartTime,
    Contract,
    Internship,
    Freelance,
}

impl JobType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().replace(['_', ' '], "-").as_str() {
            "full-time" | "fulltime" => Some(JobType::FullTime),
            "part-time" | "parttime" => Some(JobType::PartTime),
            "contract" | "contractor" => Some(JobType::Contract),
            "internship" | "intern" => Some(JobType::Internship),
            "freelance" => Some(JobType::Freelance),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::FullTime => "Full-time",
            JobType::PartTime => "Part-time",
            JobType::Contract => "Contract",
            JobType::Internship => "Internship",
            JobType::Freelance => "Freelance",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExperienceLevel {
    Entry,
    Mid,
    Senior,
    Lead,
    Executive,
}

impl ExperienceLevel {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "entry" | "junior" => Some(ExperienceLevel::Entry),
            "mid" | "intermediate" => Some(ExperienceLevel::Mid),
            "senior" => Some(ExperienceLevel::Senior),
            "lead" => Some(ExperienceLevel::Lead),
            "executive" => Some(ExperienceLevel::Executive),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExperienceLevel::Entry => "Entry",
            ExperienceLevel::Mid => "Mid",
            ExperienceLevel::Senior => "Senior",
            ExperienceLevel::Lead => "Lead",
            ExperienceLevel::Executive => "Executive",
        }
    }
}

/// Splits user input on commas into an ordered set of trimmed, non-empty keywords.
///
/// Blank input yields an empty set, meaning "no keyword filter".
pub fn parse_keywords(input: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for kw in input.split(',').map(str::trim).filter(|kw| !kw.is_empty()) {
        if !keywords.iter().any(|k| k == kw) {
            keywords.push(kw.to_string());
        }
    }
    keywords
}

/// A search request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchCriteria {
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub remote: RemotePreference,
    #[serde(default)]
    pub job_type: Option<JobType>,
    #[serde(default)]
    pub experience_level: Option<ExperienceLevel>,
    #[serde(default)]
    pub salary_min: Option<f64>,
    /// Registry identifiers of the sources to query.
    #[serde(default)]
    pub sources: Vec<String>,
    /// Requested per-source cap; clamped to the configured bounds at submission.
    #[serde(default)]
    pub max_results_per_source: Option<u32>,
    #[serde(default)]
    pub posted_in_last_days: Option<u32>,
}

impl SearchCriteria {
    pub fn new<I, S>(sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sources: sources.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Sets keywords from comma-separated user input.
    pub fn with_keywords(mut self, input: &str) -> Self {
        self.keywords = parse_keywords(input);
        self
    }

    /// Re-applies keyword normalisation to programmatically built criteria and
    /// drops blank optional strings.
    pub fn normalize(&mut self) {
        self.keywords = parse_keywords(&self.keywords.join(","));
        self.location = self
            .location
            .take()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty());
        self.sources = self
            .sources
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if self.posted_in_last_days == Some(0) {
            self.posted_in_last_days = None;
        }
    }

    /// Checks what can be checked without the source registry.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.sources.is_empty() {
            return Err(ValidationError::NoSources);
        }
        if let Some(salary) = self.salary_min {
            if salary.is_nan() || salary < 0.0 {
                return Err(ValidationError::NegativeSalary);
            }
        }
        Ok(())
    }

    /// Short human-readable label used in log lines.
    pub fn keyword_label(&self) -> String {
        if self.keywords.is_empty() {
            "(all)".to_string()
        } else {
            self.keywords.join(", ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keywords() {
        assert_eq!(parse_keywords("a, b ,,c"), vec!["a", "b", "c"]);
        assert_eq!(parse_keywords("rust, rust , go"), vec!["rust", "go"]);
        assert!(parse_keywords("  , ,").is_empty());
        assert!(parse_keywords("").is_empty());
    }

    #[test]
    fn test_remote_preference_admits() {
        assert!(RemotePreference::Any.admits(RemoteKind::Unknown));
        assert!(RemotePreference::Remote.admits(RemoteKind::Remote));
        assert!(!RemotePreference::Remote.admits(RemoteKind::OnSite));
        assert!(!RemotePreference::OnSite.admits(RemoteKind::Unknown));
        assert_eq!(RemotePreference::parse("on-site"), Some(RemotePreference::OnSite));
        assert_eq!(RemotePreference::parse("mars"), None);
    }

    #[test]
    fn test_job_type_and_level_parse() {
        assert_eq!(JobType::parse("full_time"), Some(JobType::FullTime));
        assert_eq!(JobType::parse("Part time"), Some(JobType::PartTime));
        assert_eq!(JobType::parse("gig"), None);
        assert_eq!(ExperienceLevel::parse("SENIOR"), Some(ExperienceLevel::Senior));
    }

    #[test]
    fn test_validate() {
        assert_eq!(
            SearchCriteria::default().validate(),
            Err(ValidationError::NoSources)
        );

        let mut criteria = SearchCriteria::new(["RemoteOK"]);
        assert!(criteria.validate().is_ok());

        criteria.salary_min = Some(-1.0);
        assert_eq!(criteria.validate(), Err(ValidationError::NegativeSalary));
        criteria.salary_min = Some(f64::NAN);
        assert_eq!(criteria.validate(), Err(ValidationError::NegativeSalary));
    }

    #[test]
    fn test_normalize() {
        let mut criteria = SearchCriteria {
            keywords: vec!["  rust ".to_string(), "".to_string(), "rust".to_string()],
            location: Some("   ".to_string()),
            sources: vec![" Remotive ".to_string(), "".to_string()],
            posted_in_last_days: Some(0),
            ..Default::default()
        };
        criteria.normalize();
        assert_eq!(criteria.keywords, vec!["rust"]);
        assert_eq!(criteria.location, None);
        assert_eq!(criteria.sources, vec!["Remotive"]);
        assert_eq!(criteria.posted_in_last_days, None);
    }

    #[test]
    fn test_deserialize_criteria() {
        let criteria: SearchCriteria = serde_json::from_str(
            r#"{ "keywords": ["rust"], "remote": "On-site", "jobType": "Full-time",
                 "sources": ["Reed"], "maxResultsPerSource": 50 }"#,
        )
        .unwrap();
        assert_eq!(criteria.remote, RemotePreference::OnSite);
        assert_eq!(criteria.job_type, Some(JobType::FullTime));
        assert_eq!(criteria.max_results_per_source, Some(50));
    }
}
