//! Helpers shared by the built-in adapters.

use std::collections::HashSet;
use std::future::Future;
use std::sync::LazyLock;

use log::{info, warn};
use regex::Regex;
use serde_json::Value;

use crate::error::SourceError;
use crate::job::RawJob;

static RE_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").unwrap());

/// Case-insensitive keyword match.
///
/// A text matches when it contains any keyword in full, or any leading phrase
/// of at least two words of a keyword ("machine learning" matches a search for
/// "machine learning engineer"). An empty keyword set matches everything.
pub fn matches_keywords(text: &str, keywords: &[String]) -> bool {
    if keywords.iter().all(|k| k.trim().is_empty()) {
        return true;
    }
    let text = text.to_lowercase();

    keywords.iter().any(|kw| {
        let kw = kw.trim().to_lowercase();
        if kw.is_empty() {
            return false;
        }
        if text.contains(&kw) {
            return true;
        }
        let words: Vec<&str> = kw.split_whitespace().collect();
        (2..=words.len()).any(|n| text.contains(&words[..n].join(" ")))
    })
}

/// Salary floor rule: a posting is dropped only when its known maximum is
/// below the floor. Unknown salaries always pass.
pub fn passes_salary_floor(floor: Option<f64>, known_max: Option<f64>) -> bool {
    match (floor, known_max) {
        (Some(floor), Some(max)) if floor > 0.0 => max >= floor,
        _ => true,
    }
}

/// Extracts a salary range from free text such as `"$60,000 - $90,000"` or
/// `"60k-90k"`. Values below 1000 are read as thousands.
pub fn parse_salary_string(text: &str) -> (Option<f64>, Option<f64>) {
    let cleaned = text.replace(',', "");
    let values: Vec<f64> = RE_NUMBER
        .find_iter(&cleaned)
        .filter_map(|m| m.as_str().parse::<f64>().ok())
        .filter(|v| *v > 0.0)
        .map(|v| if v < 1000.0 { v * 1000.0 } else { v })
        .collect();

    match values.as_slice() {
        [] => (None, None),
        [single] => (Some(*single), Some(*single)),
        many => {
            let min = many.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = many.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            (Some(min), Some(max))
        }
    }
}

/// Reads a positive number from a JSON number or numeric string.
pub fn positive_f64(value: Option<&Value>) -> Option<f64> {
    let v = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (v > 0.0).then_some(v)
}

/// Reads a string field, treating anything else as empty.
pub fn str_field<'a>(item: &'a Value, key: &str) -> &'a str {
    item.get(key).and_then(Value::as_str).unwrap_or("")
}

/// Joins a JSON array of strings (or passes through a plain string) as
/// comma-separated tags.
pub fn join_tags(value: Option<&Value>) -> String {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(", "),
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    }
}

/// `full_time` → `Full Time`.
pub fn title_case_label(raw: &str) -> String {
    raw.split(['_', ' '])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Removes postings that share a fingerprint, keeping the first.
pub fn dedup_raw(jobs: Vec<RawJob>) -> Vec<RawJob> {
    let mut seen = HashSet::new();
    jobs.into_iter()
        .filter(|job| seen.insert(job.fingerprint()))
        .collect()
}

/// Search terms to issue one request each for; a single unfiltered request
/// when there are none.
pub fn keyword_terms(keywords: &[String]) -> Vec<Option<String>> {
    if keywords.is_empty() {
        vec![None]
    } else {
        keywords.iter().cloned().map(Some).collect()
    }
}

/// Runs one request per keyword and merges the results.
///
/// A failing keyword is logged and skipped. Only when every request fails is
/// the last error returned, so one flaky request does not throw away what the
/// others found.
pub async fn fetch_per_keyword<F, Fut>(
    source: &str,
    keywords: &[String],
    mut fetch_one: F,
) -> Result<Vec<RawJob>, SourceError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Vec<RawJob>, SourceError>>,
{
    let mut jobs = Vec::new();
    let mut succeeded = 0usize;
    let mut last_error = None;

    for term in keyword_terms(keywords) {
        let label = term.clone().unwrap_or_else(|| "(all)".to_string());
        match fetch_one(term).await {
            Ok(batch) => {
                succeeded += 1;
                jobs.extend(batch);
            }
            Err(e) => {
                warn!("[{}] Request for '{}' failed: {}", source, label, e);
                last_error = Some(e);
            }
        }
    }

    if succeeded == 0 {
        if let Some(e) = last_error {
            return Err(e);
        }
    }

    let jobs = dedup_raw(jobs);
    info!("[{}] Found {} jobs matching criteria", source, jobs.len());
    Ok(jobs)
}
