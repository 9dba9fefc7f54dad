//! Allocation Engine (spec §4.5): the cycle state machine that ties the
//! cache, matcher, adapter, and rollback store together.

pub mod strategy;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::cache::TorrentCache;
use crate::config::{AllocationStrategy, Config};
use crate::dry_run::DryRunStore;
use crate::matcher::TrackerMatcher;
use crate::qbit::Client as QbitClient;
use crate::rollback::RollbackStore;
use crate::webhook::WebhookQueue;
use strategy::{compute_equal, compute_soft, compute_weighted, Proposal, ScoredTorrent, SoftParams, TrackerBucket};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Fetching,
    Classifying,
    Selecting,
    Computing,
    Diffing,
    Writing,
    Recording,
    Postprocess,
}

#[derive(Debug, Clone, Default)]
pub struct ManagedEntry {
    pub current_limit: i64,
}

#[derive(Debug, Clone, Default)]
pub struct CycleSummary {
    pub torrents_seen: usize,
    pub torrents_managed: usize,
    pub writes_applied: usize,
    pub errors: usize,
}

/// Owns all per-cycle and cross-cycle engine state. One instance per
/// running service (spec §9 "application context").
pub struct Engine {
    cache: Arc<TorrentCache>,
    matcher: Arc<TrackerMatcher>,
    client: Arc<QbitClient>,
    rollback: Arc<RollbackStore>,
    dry_run: Option<Arc<DryRunStore>>,
    webhooks: Arc<WebhookQueue>,
    config: RwLock<Arc<Config>>,
    managed: RwLock<HashMap<String, ManagedEntry>>,
    smoothing: RwLock<HashMap<String, f64>>,
    state: RwLock<CycleState>,
    cycle_lock: Mutex<()>,
    cycles_run: AtomicU64,
    cycle_failures: AtomicU64,
    ready: std::sync::atomic::AtomicBool,
}

impl Engine {
    pub fn new(
        cache: Arc<TorrentCache>,
        matcher: Arc<TrackerMatcher>,
        client: Arc<QbitClient>,
        rollback: Arc<RollbackStore>,
        dry_run: Option<Arc<DryRunStore>>,
        webhooks: Arc<WebhookQueue>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            cache,
            matcher,
            client,
            rollback,
            dry_run,
            webhooks,
            config: RwLock::new(config),
            managed: RwLock::new(HashMap::new()),
            smoothing: RwLock::new(HashMap::new()),
            state: RwLock::new(CycleState::Idle),
            cycle_lock: Mutex::new(()),
            cycles_run: AtomicU64::new(0),
            cycle_failures: AtomicU64::new(0),
            ready: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub async fn current_state(&self) -> CycleState {
        *self.state.read().await
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    pub async fn replace_config(&self, config: Arc<Config>) {
        *self.config.write().await = config;
    }

    pub async fn config_snapshot(&self) -> Arc<Config> {
        self.config.read().await.clone()
    }

    pub fn cycles_run(&self) -> u64 {
        self.cycles_run.load(Ordering::Relaxed)
    }

    /// Clears the soft-strategy EMA state, forcing the next cycle to treat
    /// every tracker's effective cap as freshly observed (spec §4.7
    /// `/smoothing/reset`).
    pub async fn reset_smoothing(&self) {
        self.smoothing.write().await.clear();
    }

    /// Runs the selection+compute pipeline against the current cache
    /// snapshot without touching the network or writing anything (spec
    /// §4.7 `/preview/next-cycle`: "runs the full computation pipeline
    /// against a cloned cache, applies nothing").
    pub async fn preview_next_cycle(&self) -> Proposal {
        let config = self.config_snapshot().await;
        let snapshot = self.cache.snapshot().await;
        let rollout = config.global.rollout_percentage;
        let max_managed = config.global.max_managed_torrents;

        let managed_guard = self.managed.read().await;
        let mut selected: Vec<_> = snapshot
            .iter()
            .filter(|entry| {
                managed_guard.contains_key(&entry.info.hash) || rollout_eligible(&entry.info.hash, rollout)
            })
            .cloned()
            .collect();
        drop(managed_guard);
        selected.truncate(max_managed);

        let mut buckets_by_tracker: HashMap<String, TrackerBucket> = HashMap::new();
        for tracker in &config.trackers {
            buckets_by_tracker.insert(
                tracker.id.clone(),
                TrackerBucket {
                    tracker_id: tracker.id.clone(),
                    base_cap: tracker.max_upload_speed,
                    priority: tracker.priority,
                    torrents: Vec::new(),
                },
            );
        }
        for entry in &selected {
            if let Some(bucket) = buckets_by_tracker.get_mut(&entry.tracker_id) {
                bucket.torrents.push(ScoredTorrent {
                    hash: entry.info.hash.clone(),
                    up_speed: entry.info.upspeed,
                    num_leechs: entry.info.num_leechs,
                });
            }
        }
        let buckets: Vec<TrackerBucket> = buckets_by_tracker.into_values().collect();

        let mut smoothing_clone = self.smoothing.read().await.clone();
        match config.global.allocation_strategy {
            AllocationStrategy::Equal => compute_equal(&buckets),
            AllocationStrategy::Weighted => compute_weighted(&buckets),
            AllocationStrategy::Soft => {
                let params = SoftParams {
                    borrow_threshold_ratio: config.global.borrow_threshold_ratio,
                    max_borrow_fraction: config.global.max_borrow_fraction,
                    smoothing_alpha: config.global.smoothing_alpha,
                    min_effective_delta: config.global.min_effective_delta,
                };
                compute_soft(&buckets, &mut smoothing_clone, &params)
            }
        }
    }

    pub fn cycle_failures(&self) -> u64 {
        self.cycle_failures.load(Ordering::Relaxed)
    }

    /// Runs exactly one cycle end to end. Never overlaps with another
    /// cycle (spec §4.5: "cycles never overlap").
    pub async fn run_cycle(&self) -> CycleSummary {
        let _guard = self.cycle_lock.lock().await;
        let config = self.config_snapshot().await;

        let drained_events = self.webhooks.drain();
        if !drained_events.is_empty() {
            debug!(count = drained_events.len(), "drained webhook events");
        }
        let prioritized_hashes: std::collections::HashSet<String> = drained_events
            .iter()
            .filter(|e| e.event_type != crate::webhook::EventType::Delete)
            .map(|e| e.torrent_hash.clone())
            .collect();

        match self.run_cycle_inner(&config, &prioritized_hashes).await {
            Ok(summary) => {
                self.cycles_run.fetch_add(1, Ordering::Relaxed);
                self.ready.store(true, Ordering::Relaxed);
                *self.state.write().await = CycleState::Idle;
                summary
            }
            Err(e) => {
                warn!(error = %e, "cycle aborted");
                self.cycle_failures.fetch_add(1, Ordering::Relaxed);
                *self.state.write().await = CycleState::Idle;
                CycleSummary {
                    errors: 1,
                    ..Default::default()
                }
            }
        }
    }

    async fn run_cycle_inner(
        &self,
        config: &Config,
        prioritized_hashes: &std::collections::HashSet<String>,
    ) -> crate::error::Result<CycleSummary> {
        *self.state.write().await = CycleState::Fetching;
        let active_threshold = (config.global.active_torrent_threshold_kb * 1024) as i64;
        let torrents = self.client.get_active_torrents().await?;
        let active: Vec<_> = torrents
            .into_iter()
            .filter(|t| t.upspeed >= active_threshold)
            .collect();

        // Invariant (v): the representative tracker is always the first
        // working (status = working) announce URL, falling back to the
        // first non-errored one. The `tracker` field on `torrents/info` is
        // not guaranteed to reflect that, so `torrents/trackers` is
        // consulted for every active torrent, every cycle.
        for torrent in &active {
            let representative_url = self.representative_url(&torrent.hash).await.unwrap_or_default();
            let tracker_id = self.matcher.match_tracker(&representative_url).to_string();
            self.cache.upsert(torrent.clone(), tracker_id).await;
        }
        self.cache.evict_stale().await;

        *self.state.write().await = CycleState::Classifying;
        let snapshot = self.cache.snapshot().await;

        *self.state.write().await = CycleState::Selecting;
        let rollout = config.global.rollout_percentage;
        let max_managed = config.global.max_managed_torrents;
        let managed_guard = self.managed.read().await;
        let (prioritized, rest): (Vec<_>, Vec<_>) = snapshot
            .iter()
            .filter(|entry| {
                prioritized_hashes.contains(&entry.info.hash)
                    || managed_guard.contains_key(&entry.info.hash)
                    || rollout_eligible(&entry.info.hash, rollout)
            })
            .cloned()
            .partition(|entry| prioritized_hashes.contains(&entry.info.hash));
        let mut selected: Vec<_> = prioritized
            .into_iter()
            .chain(rest)
            .collect();
        drop(managed_guard);
        selected.truncate(max_managed);

        *self.state.write().await = CycleState::Computing;
        let mut buckets_by_tracker: HashMap<String, TrackerBucket> = HashMap::new();
        for tracker in &config.trackers {
            buckets_by_tracker.insert(
                tracker.id.clone(),
                TrackerBucket {
                    tracker_id: tracker.id.clone(),
                    base_cap: tracker.max_upload_speed,
                    priority: tracker.priority,
                    torrents: Vec::new(),
                },
            );
        }
        for entry in &selected {
            if let Some(bucket) = buckets_by_tracker.get_mut(&entry.tracker_id) {
                bucket.torrents.push(ScoredTorrent {
                    hash: entry.info.hash.clone(),
                    up_speed: entry.info.upspeed,
                    num_leechs: entry.info.num_leechs,
                });
            }
        }
        let buckets: Vec<TrackerBucket> = buckets_by_tracker.into_values().collect();

        let proposal: Proposal = match config.global.allocation_strategy {
            AllocationStrategy::Equal => compute_equal(&buckets),
            AllocationStrategy::Weighted => compute_weighted(&buckets),
            AllocationStrategy::Soft => {
                let params = SoftParams {
                    borrow_threshold_ratio: config.global.borrow_threshold_ratio,
                    max_borrow_fraction: config.global.max_borrow_fraction,
                    smoothing_alpha: config.global.smoothing_alpha,
                    min_effective_delta: config.global.min_effective_delta,
                };
                let mut smoothing = self.smoothing.write().await;
                compute_soft(&buckets, &mut smoothing, &params)
            }
        };

        *self.state.write().await = CycleState::Diffing;
        let mut writes: HashMap<i64, Vec<String>> = HashMap::new();
        let differential_threshold = config.global.differential_threshold;
        for entry in &selected {
            let Some(&proposed) = proposal.get(&entry.info.hash) else {
                continue;
            };
            let current = entry.info.up_limit;
            if should_write(current, proposed, differential_threshold) {
                writes.entry(proposed).or_default().push(entry.info.hash.clone());
            }
        }

        *self.state.write().await = CycleState::Writing;
        let mut writes_applied = 0usize;
        let mut api_calls_used = 0u32;
        let max_calls = config.global.max_api_calls_per_cycle;
        for (limit, hashes) in writes {
            if api_calls_used >= max_calls {
                break;
            }
            if config.global.dry_run {
                if let Some(store) = &self.dry_run {
                    for hash in &hashes {
                        store.set(hash, limit).await?;
                    }
                }
            } else if self.client.set_upload_limits(&hashes, limit).await.is_ok() {
                api_calls_used += 1;
            } else {
                continue;
            }

            *self.state.write().await = CycleState::Recording;
            for hash in &hashes {
                let previous = self
                    .cache
                    .get(hash)
                    .await
                    .map(|e| e.info.up_limit)
                    .unwrap_or(-1);
                if !config.global.dry_run {
                    let tracker_id = self
                        .cache
                        .get(hash)
                        .await
                        .map(|e| e.tracker_id)
                        .unwrap_or_default();
                    self.rollback
                        .record_change(hash, &tracker_id, previous, limit)
                        .await?;
                }
                self.managed
                    .write()
                    .await
                    .insert(hash.clone(), ManagedEntry { current_limit: limit });
                writes_applied += 1;
            }
        }

        *self.state.write().await = CycleState::Postprocess;
        if config.global.auto_unlimit_on_inactive {
            let active_hashes: std::collections::HashSet<&str> =
                active.iter().map(|t| t.hash.as_str()).collect();
            let stale: Vec<String> = {
                let managed = self.managed.read().await;
                managed
                    .keys()
                    .filter(|h| !active_hashes.contains(h.as_str()))
                    .cloned()
                    .collect()
            };
            if !stale.is_empty() {
                let _ = self.client.set_upload_limits(&stale, -1).await;
                let mut managed = self.managed.write().await;
                for hash in &stale {
                    managed.remove(hash);
                }
            }
        }

        info!(
            seen = active.len(),
            managed = selected.len(),
            writes = writes_applied,
            "cycle complete"
        );

        Ok(CycleSummary {
            torrents_seen: active.len(),
            torrents_managed: selected.len(),
            writes_applied,
            errors: 0,
        })
    }

    async fn representative_url(&self, hash: &str) -> Option<String> {
        let trackers = self.client.get_trackers_for(hash).await.ok()?;
        trackers
            .iter()
            .find(|t| t.status == 2)
            .or_else(|| trackers.iter().find(|t| t.status >= 0))
            .map(|t| t.url.clone())
    }
}

/// `crc32(h) mod 100 < rollout_percentage` (spec §4.5).
pub fn rollout_eligible(hash: &str, rollout_percentage: u8) -> bool {
    let digest = crc32fast::hash(hash.as_bytes());
    (digest % 100) < rollout_percentage as u32
}

/// Diff gate: write iff going to/from unlimited, or the change exceeds
/// the larger of the relative threshold and a 1 KiB absolute floor.
fn should_write(current: i64, proposed: i64, differential_threshold: f64) -> bool {
    if proposed < 0 && current >= 0 {
        return true;
    }
    if proposed >= 0 && current < 0 {
        return true;
    }
    if proposed < 0 && current < 0 {
        return false;
    }
    let abs_diff = (proposed - current).abs();
    if abs_diff as f64 >= 1024.0 {
        return true;
    }
    if current == 0 {
        return proposed != 0;
    }
    (abs_diff as f64 / current as f64) >= differential_threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rollout_is_deterministic_for_same_hash() {
        let a = rollout_eligible("abc123", 50);
        let b = rollout_eligible("abc123", 50);
        assert_eq!(a, b);
    }

    #[test]
    fn rollout_zero_excludes_everything() {
        assert!(!rollout_eligible("anything", 0));
    }

    #[test]
    fn rollout_hundred_includes_everything() {
        assert!(rollout_eligible("anything", 100));
    }

    #[test]
    fn diff_gate_requires_threshold_or_unlimited_transition() {
        assert!(should_write(-1, 500_000, 0.2));
        assert!(should_write(500_000, -1, 0.2));
        assert!(!should_write(-1, -1, 0.2));
        assert!(!should_write(1_000_000, 1_050_000, 0.2));
        assert!(should_write(1_000_000, 1_300_000, 0.2));
    }
}
