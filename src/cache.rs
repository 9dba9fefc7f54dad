//! Torrent Cache (spec §4.2): the cycle task's view of which torrents
//! exist, what tracker they belong to, and whether they're still active.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::qbit::TorrentInfo;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub info: TorrentInfo,
    pub tracker_id: String,
    pub last_seen: Instant,
}

/// Keyed by torrent hash. Entries not refreshed within `ttl` of the most
/// recent cycle are evicted — they likely left the client entirely.
pub struct TorrentCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl TorrentCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn upsert(&self, info: TorrentInfo, tracker_id: String) {
        let mut entries = self.entries.write().await;
        entries.insert(
            info.hash.clone(),
            CacheEntry {
                info,
                tracker_id,
                last_seen: Instant::now(),
            },
        );
    }

    pub async fn get(&self, hash: &str) -> Option<CacheEntry> {
        self.entries.read().await.get(hash).cloned()
    }

    pub async fn snapshot(&self) -> Vec<CacheEntry> {
        self.entries.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Drops entries whose `last_seen` is older than `ttl`. Called once
    /// per cycle after the fresh `torrents/info` fetch has repopulated
    /// anything still present.
    pub async fn evict_stale(&self) -> usize {
        let mut entries = self.entries.write().await;
        let ttl = self.ttl;
        let before = entries.len();
        entries.retain(|_, entry| entry.last_seen.elapsed() < ttl);
        before - entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(hash: &str) -> TorrentInfo {
        TorrentInfo {
            hash: hash.to_string(),
            name: "test".to_string(),
            tracker: "http://tracker.example.com".to_string(),
            upspeed: 0,
            up_limit: -1,
            category: String::new(),
            state: "uploading".to_string(),
        }
    }

    #[tokio::test]
    async fn upsert_then_get_round_trips() {
        let cache = TorrentCache::new(Duration::from_secs(60));
        cache.upsert(info("abc"), "tracker1".to_string()).await;
        let entry = cache.get("abc").await.unwrap();
        assert_eq!(entry.tracker_id, "tracker1");
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn evict_stale_removes_expired_entries() {
        let cache = TorrentCache::new(Duration::from_millis(1));
        cache.upsert(info("abc"), "tracker1".to_string()).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        let evicted = cache.evict_stale().await;
        assert_eq!(evicted, 1);
        assert_eq!(cache.len().await, 0);
    }
}
