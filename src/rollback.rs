//! Rollback Store (spec §4.4): an append-only log of every upload-limit
//! write this service has made, so an operator (or the `/rollback`
//! endpoint) can undo them.

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct RollbackRecord {
    pub id: i64,
    pub torrent_hash: String,
    pub tracker_id: String,
    pub previous_limit: i64,
    pub new_limit: i64,
    pub applied_at: DateTime<Utc>,
    pub restored: bool,
}

pub struct RollbackStore {
    pool: SqlitePool,
}

impl RollbackStore {
    pub async fn connect(database_path: &str) -> Result<Self> {
        let url = if database_path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite://{database_path}?mode=rwc")
        };
        let pool = SqlitePoolOptions::new().max_connections(4).connect(&url).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS rollback_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                torrent_hash TEXT NOT NULL,
                tracker_id TEXT NOT NULL,
                previous_limit INTEGER NOT NULL,
                new_limit INTEGER NOT NULL,
                applied_at TEXT NOT NULL,
                restored INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    /// Appends one record of a limit change actually (or, in dry-run mode,
    /// would-have-been) applied.
    pub async fn record_change(
        &self,
        torrent_hash: &str,
        tracker_id: &str,
        previous_limit: i64,
        new_limit: i64,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO rollback_records (torrent_hash, tracker_id, previous_limit, new_limit, applied_at, restored) \
             VALUES (?, ?, ?, ?, ?, 0)",
        )
        .bind(torrent_hash)
        .bind(tracker_id)
        .bind(previous_limit)
        .bind(new_limit)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Records not yet marked restored, most recent first.
    pub async fn list_unrestored(&self) -> Result<Vec<RollbackRecord>> {
        let rows = sqlx::query_as::<_, RawRecord>(
            "SELECT id, torrent_hash, tracker_id, previous_limit, new_limit, applied_at, restored \
             FROM rollback_records WHERE restored = 0 ORDER BY id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().filter_map(|r| r.into_record()).collect())
    }

    pub async fn list_all_touched(&self, torrent_hash: &str) -> Result<Vec<RollbackRecord>> {
        let rows = sqlx::query_as::<_, RawRecord>(
            "SELECT id, torrent_hash, tracker_id, previous_limit, new_limit, applied_at, restored \
             FROM rollback_records WHERE torrent_hash = ? ORDER BY id DESC",
        )
        .bind(torrent_hash)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().filter_map(|r| r.into_record()).collect())
    }

    /// Idempotent: marking an already-restored record restored again is a
    /// no-op, not an error (spec §4.4 "idempotent restore").
    pub async fn mark_restored(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE rollback_records SET restored = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Drops restored records older than `keep_days`, keeping the table
    /// bounded under long-running services.
    pub async fn prune(&self, keep_days: i64) -> Result<u64> {
        let cutoff = (Utc::now() - chrono::Duration::days(keep_days)).to_rfc3339();
        let result = sqlx::query(
            "DELETE FROM rollback_records WHERE restored = 1 AND applied_at < ?",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[derive(sqlx::FromRow)]
struct RawRecord {
    id: i64,
    torrent_hash: String,
    tracker_id: String,
    previous_limit: i64,
    new_limit: i64,
    applied_at: String,
    restored: i64,
}

impl RawRecord {
    fn into_record(self) -> Option<RollbackRecord> {
        let applied_at = DateTime::parse_from_rfc3339(&self.applied_at)
            .ok()?
            .with_timezone(&Utc);
        Some(RollbackRecord {
            id: self.id,
            torrent_hash: self.torrent_hash,
            tracker_id: self.tracker_id,
            previous_limit: self.previous_limit,
            new_limit: self.new_limit,
            applied_at,
            restored: self.restored != 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn record_and_list_round_trip() {
        let store = RollbackStore::connect(":memory:").await.unwrap();
        store
            .record_change("hash1", "tracker1", -1, 50_000)
            .await
            .unwrap();

        let unrestored = store.list_unrestored().await.unwrap();
        assert_eq!(unrestored.len(), 1);
        assert_eq!(unrestored[0].new_limit, 50_000);
        assert!(!unrestored[0].restored);
    }

    #[tokio::test]
    async fn mark_restored_is_idempotent() {
        let store = RollbackStore::connect(":memory:").await.unwrap();
        store
            .record_change("hash1", "tracker1", -1, 50_000)
            .await
            .unwrap();
        let id = store.list_unrestored().await.unwrap()[0].id;

        store.mark_restored(id).await.unwrap();
        store.mark_restored(id).await.unwrap();

        assert!(store.list_unrestored().await.unwrap().is_empty());
    }
}
