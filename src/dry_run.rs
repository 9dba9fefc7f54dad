//! Dry-run Store (SPEC_FULL §4.8): when `global.dry_run` is set, the
//! engine computes and logs limits as usual but writes them here instead
//! of calling the qBittorrent API.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::sync::RwLock;

use crate::error::{AppError, Result};

pub struct DryRunStore {
    path: PathBuf,
    state: RwLock<HashMap<String, i64>>,
}

impl DryRunStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let raw = tokio::fs::read_to_string(&path).await.map_err(|e| {
                AppError::Config(format!("reading dry-run store {}: {e}", path.display()))
            })?;
            serde_json::from_str(&raw).unwrap_or_default()
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    pub async fn set(&self, hash: &str, limit_bytes_per_sec: i64) -> Result<()> {
        {
            let mut state = self.state.write().await;
            state.insert(hash.to_string(), limit_bytes_per_sec);
        }
        self.flush().await
    }

    pub async fn get(&self, hash: &str) -> Option<i64> {
        self.state.read().await.get(hash).copied()
    }

    pub async fn snapshot(&self) -> HashMap<String, i64> {
        self.state.read().await.clone()
    }

    /// Atomic replace: write to a sibling temp file, then rename over the
    /// real path, so a crash mid-write never leaves a truncated file.
    async fn flush(&self) -> Result<()> {
        let state = self.state.read().await;
        let serialized = serde_json::to_string_pretty(&*state)?;
        drop(state);

        let tmp_path = self.path.with_extension("tmp");
        tokio::fs::write(&tmp_path, serialized).await.map_err(|e| {
            AppError::Config(format!("writing dry-run store: {e}"))
        })?;
        tokio::fs::rename(&tmp_path, &self.path).await.map_err(|e| {
            AppError::Config(format!("replacing dry-run store: {e}"))
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dry_run.json");
        let store = DryRunStore::open(&path).await.unwrap();
        store.set("hash1", 12_345).await.unwrap();
        assert_eq!(store.get("hash1").await, Some(12_345));
        assert!(path.exists());
    }

    #[tokio::test]
    async fn reopening_reloads_prior_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dry_run.json");
        {
            let store = DryRunStore::open(&path).await.unwrap();
            store.set("hash1", 999).await.unwrap();
        }
        let reopened = DryRunStore::open(&path).await.unwrap();
        assert_eq!(reopened.get("hash1").await, Some(999));
    }
}
