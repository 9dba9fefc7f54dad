//! Torrent-facing calls used by the engine: list, per-hash trackers, and
//! setting upload limits (spec §4.3, §4.5).

use crate::error::Result;

use super::models::{TorrentInfo, TorrentTracker};
use super::Request;

impl super::Client {
    /// `torrents/info?filter=active`. The server-side `active` filter is a
    /// coarse first pass; the engine still applies
    /// `active_torrent_threshold_kb` against `upspeed` on the result.
    pub async fn get_active_torrents(&self) -> Result<Vec<TorrentInfo>> {
        let res = self
            .call(Request::get("api/v2/torrents/info?filter=active"))
            .await?;
        Ok(res.json::<Vec<TorrentInfo>>().await?)
    }

    /// `torrents/trackers?hash=H`.
    pub async fn get_trackers_for(&self, hash: &str) -> Result<Vec<TorrentTracker>> {
        let endpoint = format!("api/v2/torrents/trackers?hash={hash}");
        let res = self.call(Request::get(&endpoint)).await?;
        Ok(res.json::<Vec<TorrentTracker>>().await?)
    }

    /// `torrents/setUploadLimit`, one POST for every hash sharing the same
    /// new limit (spec §4.5 diffing batches same-value writes together).
    pub async fn set_upload_limits(&self, hashes: &[String], limit_bytes_per_sec: i64) -> Result<()> {
        if hashes.is_empty() {
            return Ok(());
        }
        let fields = vec![
            ("hashes".to_string(), hashes.join("|")),
            ("limit".to_string(), limit_bytes_per_sec.to_string()),
        ];
        self.call(Request::multipart(
            "api/v2/torrents/setUploadLimit",
            fields,
        ))
        .await?;
        Ok(())
    }
}
