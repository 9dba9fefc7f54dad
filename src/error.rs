//! Error taxonomy for the whole service (spec §7).

use thiserror::Error;

/// Top-level error type returned by core operations.
#[derive(Debug, Error)]
pub enum AppError {
    /// Non-recoverable configuration problem, surfaced at startup.
    #[error("config error: {0}")]
    Config(String),

    /// Network/timeout/5xx talking to the qBittorrent API. Retried or
    /// circuit-opened by the adapter before reaching callers.
    #[error("transport error calling {endpoint}: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The circuit breaker is open; the call failed fast without hitting
    /// the network.
    #[error("circuit breaker open for {endpoint}, retry after {retry_after_secs}s")]
    TransportUnavailable {
        endpoint: String,
        retry_after_secs: u64,
    },

    /// Authentication failed even after a single re-login attempt.
    #[error("authentication failed against qbittorrent")]
    Auth,

    /// The qBittorrent API returned a response shape we didn't expect.
    #[error("unexpected response from {endpoint}: {detail}")]
    Protocol { endpoint: String, detail: String },

    /// An invariant the engine relies on was violated; the cycle aborts
    /// to IDLE without committing partial state.
    #[error("state invariant violated: {0}")]
    State(String),
}

impl From<reqwest::Error> for AppError {
    fn from(value: reqwest::Error) -> Self {
        let endpoint = value
            .url()
            .map(|u| u.path().to_string())
            .unwrap_or_else(|| "<unknown>".to_string());
        AppError::Transport {
            endpoint,
            source: Box::new(value),
        }
    }
}

impl From<url::ParseError> for AppError {
    fn from(value: url::ParseError) -> Self {
        AppError::Config(format!("invalid url: {value}"))
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(value: serde_yaml::Error) -> Self {
        AppError::Config(format!("invalid yaml: {value}"))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        AppError::State(format!("json (de)serialization error: {value}"))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(value: sqlx::Error) -> Self {
        AppError::State(format!("rollback store error: {value}"))
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AppError>;
