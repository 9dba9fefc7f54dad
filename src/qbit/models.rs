//! Wire-format DTOs for the slice of the qBittorrent Web API this service
//! actually touches (spec §3 `TorrentInfo`, §4.3).

use serde::Deserialize;

/// One row of `torrents/info`. Only the fields the engine and matcher
/// consume are modeled; the upstream payload carries many more.
#[derive(Debug, Clone, Deserialize)]
pub struct TorrentInfo {
    pub hash: String,
    pub name: String,
    /// Tracker URL qBittorrent reports for this torrent. Not trusted for
    /// classification: the engine always resolves the representative
    /// working tracker via `torrents/trackers` instead (invariant v).
    #[serde(default)]
    pub tracker: String,
    /// Current upload speed, bytes/sec.
    pub upspeed: i64,
    /// Current per-torrent upload limit, bytes/sec. `-1` means unlimited.
    pub up_limit: i64,
    #[serde(default)]
    pub num_seeds: i64,
    /// Leech count feeding the scoring formula's leech term (spec §4.5).
    #[serde(default)]
    pub num_leechs: i64,
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub added_on: i64,
    #[serde(default)]
    pub category: String,
    pub state: String,
}

/// One row of `torrents/trackers` for a given hash.
#[derive(Debug, Clone, Deserialize)]
pub struct TorrentTracker {
    pub url: String,
    pub status: i64,
    pub tier: i64,
    pub num_peers: i64,
    pub num_seeds: i64,
    pub num_leeches: i64,
    pub num_downloaded: i64,
    #[serde(default)]
    pub msg: String,
}
