use super::breaker::{CircuitBreaker, RateLimitStatus};
use super::retry::{execute_with_retry, parse_retry_after, RetryPolicy};
use crate::error::ProviderError;
use chrono::Utc;
use reqwest::{header::RETRY_AFTER, Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";

/// Longest upstream error body echoed into error messages.
const MAX_ERROR_BODY: usize = 200;

/// Settings shared by every provider adapter.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub breaker_threshold: u32,
    pub breaker_cooldown: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            breaker_threshold: 3,
            breaker_cooldown: Duration::from_secs(60),
        }
    }
}

/// GET-only HTTP client for a block explorer API.
///
/// Every call goes through the circuit breaker, gets its failure classified and is
/// retried under the configured policy.
pub struct ExplorerHttp {
    client: Client,
    base_url: String,
    query: Vec<(&'static str, String)>,
    retry: RetryPolicy,
    breaker: CircuitBreaker,
}

impl ExplorerHttp {
    pub fn new(base_url: &str, settings: &ClientSettings) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(settings.timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            query: Vec::new(),
            retry: settings.retry.clone(),
            breaker: CircuitBreaker::new(settings.breaker_threshold, settings.breaker_cooldown),
        })
    }

    /// Adds a query parameter sent with every request (API tokens).
    pub fn with_query(mut self, key: &'static str, value: String) -> Self {
        self.query.push((key, value));
        self
    }

    pub fn rate_limit_status(&self) -> RateLimitStatus {
        self.breaker.status()
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ProviderError> {
        execute_with_retry(&self.retry, path, || self.fetch_json(path)).await
    }

    pub async fn get_text(&self, path: &str) -> Result<String, ProviderError> {
        execute_with_retry(&self.retry, path, || self.fetch_text(path)).await
    }

    async fn fetch_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ProviderError> {
        let body = self.send(path).await?.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| ProviderError::Decode(e.to_string()))
    }

    async fn fetch_text(&self, path: &str) -> Result<String, ProviderError> {
        Ok(self.send(path).await?.text().await?)
    }

    async fn send(&self, path: &str) -> Result<Response, ProviderError> {
        self.breaker.check()?;

        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%url, "Provider request");

        let response = self.client.get(&url).query(&self.query).send().await?;
        let status = response.status();

        if status.is_success() {
            let remaining = header_u64(&response, RATE_LIMIT_REMAINING);
            self.breaker.record_success(remaining);
            return Ok(response);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| parse_retry_after(v, Utc::now()));
            self.breaker.record_rate_limited();
            tracing::warn!(%url, ?retry_after, "Rate limited by provider");
            return Err(ProviderError::RateLimited { retry_after });
        }

        if status.is_server_error() {
            tracing::warn!(%url, status = status.as_u16(), "Provider server error");
            return Err(ProviderError::Service {
                status: status.as_u16(),
            });
        }

        let mut message = response.text().await.unwrap_or_default();
        if message.len() > MAX_ERROR_BODY {
            let cut = (0..=MAX_ERROR_BODY)
                .rev()
                .find(|i| message.is_char_boundary(*i))
                .unwrap_or(0);
            message.truncate(cut);
        }
        if message.is_empty() {
            message = status.to_string();
        }
        Err(ProviderError::Request {
            status: Some(status.as_u16()),
            message,
        })
    }
}

fn header_u64(response: &Response, name: &str) -> Option<u64> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}
