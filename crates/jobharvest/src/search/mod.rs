pub mod criteria;

pub use criteria::{parse_keywords, ExperienceLevel, JobType, RemotePreference, SearchCriteria};
