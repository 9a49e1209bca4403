//! Helpers for scrubbing credentials out of text before it is logged.
//!
//! Source adapters put API keys into query strings and basic-auth userinfo.
//! Transport errors from `reqwest` echo the full URL, so anything that ends up
//! in a log line or a task's error list goes through these functions first.

use std::sync::LazyLock;

use regex::Regex;

static RE_SECRET_PARAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)([?&](?:app_id|app_key|api_key|apikey|key|token)=)[^&\s#)]*").unwrap()
});
static RE_USERINFO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(https?://)[^/@\s]+@").unwrap());

/// Masks credential-bearing query parameters and URL userinfo in `text`.
///
/// - `https://api.example.com/search?app_id=abc&what=rust` → `https://api.example.com/search?app_id=****&what=rust`
/// - `https://KEY:@www.reed.co.uk/api` → `https://****@www.reed.co.uk/api`
/// - text without URLs is returned unchanged
pub fn redact_url_secrets(text: &str) -> String {
    let masked = RE_SECRET_PARAM.replace_all(text, "${1}****");
    RE_USERINFO
        .replace_all(&masked, "${1}****@")
        .into_owned()
}

/// Shortens a fingerprint for log lines.
pub fn short_fingerprint(fingerprint: &str) -> &str {
    let end = fingerprint
        .char_indices()
        .nth(12)
        .map(|(i, _)| i)
        .unwrap_or(fingerprint.len());
    &fingerprint[..end]
}
