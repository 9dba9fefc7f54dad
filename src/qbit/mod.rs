//! Remote-Client Adapter (spec §4.3): the only part of the service that
//! speaks HTTP to qBittorrent. Wraps every call in rate limiting, a
//! circuit breaker, and bounded retries, and hides session/cookie
//! management from callers.

mod auth;
mod circuit_breaker;
mod models;
mod preferences;
mod rate_limit;
mod torrents;

pub use models::{TorrentInfo, TorrentTracker};
pub use preferences::Preferences;

use std::time::Duration;

use reqwest::{Client as ReqwestClient, RequestBuilder, StatusCode, Url};
use tokio::sync::RwLock;

use crate::config::QbitConfig;
use crate::error::{AppError, Result};
use circuit_breaker::CircuitBreaker;
use rate_limit::RateLimiter;

const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
const DEFAULT_RESET_AFTER: Duration = Duration::from_secs(30);
const DEFAULT_MIN_GAP_MS: u64 = 100;
const DEFAULT_MAX_RETRIES: u32 = 3;

pub(super) enum Body {
    None,
    Form(String),
    Multipart(Vec<(String, String)>),
}

/// Describes one call to [`Client::call`]; built fresh on every retry so a
/// post-relogin attempt carries the new session cookie.
pub(super) struct Request<'a> {
    endpoint: &'a str,
    body: Body,
}

impl<'a> Request<'a> {
    pub(super) fn get(endpoint: &'a str) -> Self {
        Self {
            endpoint,
            body: Body::None,
        }
    }

    pub(super) fn form(endpoint: &'a str, body: String) -> Self {
        Self {
            endpoint,
            body: Body::Form(body),
        }
    }

    pub(super) fn multipart(endpoint: &'a str, fields: Vec<(String, String)>) -> Self {
        Self {
            endpoint,
            body: Body::Multipart(fields),
        }
    }
}

/// Talks to a single qBittorrent instance on behalf of the engine.
pub struct Client {
    http_client: ReqwestClient,
    base_url: Url,
    username: String,
    password: String,
    sid: RwLock<Option<String>>,
    rate_limiter: RateLimiter,
    breaker: CircuitBreaker,
    max_retries: u32,
}

impl Client {
    pub fn new(config: &QbitConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url())?;
        Ok(Self {
            http_client: ReqwestClient::builder().cookie_store(false).build()?,
            base_url,
            username: config.username.clone(),
            password: config.password.clone(),
            sid: RwLock::new(None),
            rate_limiter: RateLimiter::new(DEFAULT_MIN_GAP_MS),
            breaker: CircuitBreaker::new(DEFAULT_FAILURE_THRESHOLD, DEFAULT_RESET_AFTER),
            max_retries: DEFAULT_MAX_RETRIES,
        })
    }

    /// Establishes the initial session. Must succeed before the cycle task
    /// starts its first iteration.
    pub async fn connect(&self) -> Result<()> {
        self.login().await
    }

    pub(super) fn build_url(&self, endpoint: &str) -> Result<Url> {
        Ok(self.base_url.join(endpoint)?)
    }

    fn builder_for(&self, req: &Request, headers: reqwest::header::HeaderMap) -> Result<RequestBuilder> {
        let url = self.build_url(req.endpoint)?;
        Ok(match &req.body {
            Body::None => self.http_client.get(url).headers(headers),
            Body::Form(body) => self
                .http_client
                .post(url)
                .headers(headers)
                .header(
                    reqwest::header::CONTENT_TYPE,
                    "application/x-www-form-urlencoded",
                )
                .body(body.clone()),
            Body::Multipart(fields) => {
                let mut form = reqwest::multipart::Form::new();
                for (name, value) in fields {
                    form = form.text(name.clone(), value.clone());
                }
                self.http_client.post(url).headers(headers).multipart(form)
            }
        })
    }

    /// Runs one logical call against the API, applying the circuit breaker,
    /// rate limiter, a single transparent re-login on 403, and bounded
    /// exponential backoff retries on 5xx/transport errors (spec §4.3,
    /// §7).
    pub(super) async fn call(&self, req: Request<'_>) -> Result<reqwest::Response> {
        let endpoint = req.endpoint;

        if let Some(retry_after) = self.breaker.check() {
            return Err(AppError::TransportUnavailable {
                endpoint: endpoint.to_string(),
                retry_after_secs: retry_after.as_secs().max(1),
            });
        }

        let mut relogged_in = false;
        let mut last_err: Option<AppError> = None;

        for attempt in 0..=self.max_retries {
            self.rate_limiter.acquire().await;

            let headers = self.auth_headers().await;
            let builder = self.builder_for(&req, headers)?;
            let outcome = builder.send().await;

            match outcome {
                Ok(res) if res.status() == StatusCode::FORBIDDEN && !relogged_in => {
                    relogged_in = true;
                    self.login().await?;
                    continue;
                }
                Ok(res) if res.status().is_success() => {
                    self.breaker.record_success();
                    return Ok(res);
                }
                Ok(res) => {
                    let status = res.status();
                    self.breaker.record_failure();
                    last_err = Some(AppError::Protocol {
                        endpoint: endpoint.to_string(),
                        detail: format!("http {status}"),
                    });
                }
                Err(e) => {
                    self.breaker.record_failure();
                    last_err = Some(e.into());
                }
            }

            if attempt < self.max_retries {
                tokio::time::sleep(backoff_delay(attempt)).await;
            }
        }

        Err(last_err.unwrap_or_else(|| {
            AppError::Protocol {
                endpoint: endpoint.to_string(),
                detail: "retry budget exhausted".to_string(),
            }
        }))
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(200u64.saturating_mul(1 << attempt.min(4)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_caps_reasonably() {
        assert!(backoff_delay(0) < backoff_delay(1));
        assert!(backoff_delay(1) < backoff_delay(2));
        assert!(backoff_delay(10) <= Duration::from_millis(200 * 16));
    }
}
