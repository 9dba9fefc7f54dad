//! Shared application context (spec §9: "expose singletons through a
//! context passed explicitly to handlers, not through ambient globals").

use std::sync::Arc;

use crate::cache::TorrentCache;
use crate::config::Config;
use crate::dry_run::DryRunStore;
use crate::engine::Engine;
use crate::matcher::TrackerMatcher;
use crate::qbit::Client as QbitClient;
use crate::rollback::RollbackStore;
use crate::webhook::WebhookQueue;

#[derive(Clone)]
pub struct AppContext {
    pub cache: Arc<TorrentCache>,
    pub matcher: Arc<TrackerMatcher>,
    pub client: Arc<QbitClient>,
    pub rollback: Arc<RollbackStore>,
    pub dry_run: Option<Arc<DryRunStore>>,
    pub webhooks: Arc<WebhookQueue>,
    pub engine: Arc<Engine>,
    /// Dedicated client for cross-seed forwarding, kept separate from the
    /// qBittorrent adapter's own rate-limited client.
    pub cross_seed_http: reqwest::Client,
    /// Path the config was loaded from, kept around so `/config/reload` and
    /// SIGHUP can re-read the same file.
    pub config_path: String,
}

impl AppContext {
    pub async fn bootstrap(config: Arc<Config>, config_path: String) -> crate::error::Result<Self> {
        let cache = Arc::new(TorrentCache::new(std::time::Duration::from_secs(
            config.global.cache_ttl_seconds,
        )));
        let matcher = Arc::new(TrackerMatcher::new(&config.trackers, 10_000));
        let client = Arc::new(QbitClient::new(&config.qbittorrent)?);
        client.connect().await?;
        // Cheap "is the session still good" probe right after login (SPEC_FULL §4.3).
        client.get_preferences().await?;
        let rollback = Arc::new(RollbackStore::connect(&config.rollback.database_path).await?);

        let dry_run = if config.global.dry_run {
            let path = config
                .global
                .dry_run_store_path
                .clone()
                .expect("validated at config load");
            Some(Arc::new(DryRunStore::open(path).await?))
        } else {
            None
        };

        let webhooks = Arc::new(WebhookQueue::new(10_000));

        let engine = Arc::new(Engine::new(
            cache.clone(),
            matcher.clone(),
            client.clone(),
            rollback.clone(),
            dry_run.clone(),
            webhooks.clone(),
            config,
        ));

        Ok(Self {
            cache,
            matcher,
            client,
            rollback,
            dry_run,
            webhooks,
            engine,
            cross_seed_http: reqwest::Client::new(),
            config_path,
        })
    }
}
