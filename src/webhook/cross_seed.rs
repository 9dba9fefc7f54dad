//! Best-effort forwarding of completion events to a cross-seed
//! collaborator (SPEC_FULL §4.6): fire-and-forget, retried, and never
//! allowed to block or fail webhook intake.

use std::time::Duration;

use tracing::warn;

use crate::config::CrossSeedConfig;

use super::WebhookEvent;

const MAX_ATTEMPTS: u32 = 3;

/// Spawns an independent task that POSTs `event` to `cross_seed.url`.
/// Failures are logged and retried with exponential backoff; after
/// `MAX_ATTEMPTS` the event is dropped.
pub fn spawn_forward(http: reqwest::Client, config: CrossSeedConfig, event: WebhookEvent) {
    if !config.enabled {
        return;
    }
    let Some(url) = config.url.clone() else {
        return;
    };

    tokio::spawn(async move {
        for attempt in 0..MAX_ATTEMPTS {
            let mut request = http.post(&url).json(&serde_json::json!({
                "torrent_hash": event.torrent_hash,
                "name": event.name,
            }));
            if let Some(api_key) = &config.api_key {
                request = request.header("X-Api-Key", api_key);
            }

            match request.send().await {
                Ok(res) if res.status().is_success() => return,
                Ok(res) => warn!(status = %res.status(), "cross-seed forward rejected"),
                Err(e) => warn!(error = %e, "cross-seed forward failed"),
            }

            if attempt + 1 < MAX_ATTEMPTS {
                tokio::time::sleep(Duration::from_millis(200 * 2u64.pow(attempt))).await;
            }
        }
    });
}
