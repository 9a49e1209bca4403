//! Rate-limited JSON-over-HTTP client shared by the built-in adapters.

use std::time::Duration;

use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{RequestBuilder, StatusCode};
use serde_json::Value;

use crate::config::HttpConfig;
use crate::error::SourceError;
use crate::sanitize::redact_url_secrets;

#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    rate_limit: Duration,
}

impl HttpClient {
    pub fn new(config: &HttpConfig) -> Result<Self, SourceError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        // Each search worker drives requests on its own short-lived runtime,
        // so idle connections must not outlive the request that opened them.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| SourceError::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            rate_limit: Duration::from_millis(config.rate_limit_delay_ms),
        })
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.client.get(url)
    }

    /// Sends a request after the rate-limit pause and decodes a JSON body.
    ///
    /// HTTP 429 maps to [`SourceError::RateLimited`], other non-2xx statuses
    /// to [`SourceError::Status`]. URLs in errors and logs are redacted.
    pub async fn send_json(&self, source: &str, request: RequestBuilder) -> Result<Value, SourceError> {
        let request = request.build()?;
        let url = redact_url_secrets(request.url().as_str());

        if !self.rate_limit.is_zero() {
            tokio::time::sleep(self.rate_limit).await;
        }

        debug!("[{}] GET {}", source, url);
        let response = self.client.execute(request).await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(SourceError::RateLimited);
        }
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                url,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| SourceError::Parse(e.to_string()))
    }
}
