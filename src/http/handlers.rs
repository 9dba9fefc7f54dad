//! Handlers for the HTTP surface (spec §4.7).

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::app::AppContext;
use crate::webhook::WebhookEvent;

pub async fn health(State(ctx): State<Arc<AppContext>>) -> (StatusCode, Json<serde_json::Value>) {
    if !ctx.engine.is_ready() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "starting" })),
        );
    }
    if ctx.client.get_preferences().await.is_err() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "session unavailable" })),
        );
    }
    let status = if ctx.engine.cycle_failures() > 0 && ctx.engine.cycles_run() == 0 {
        "degraded"
    } else {
        "healthy"
    };
    (StatusCode::OK, Json(json!({ "status": status })))
}

pub async fn stats(State(ctx): State<Arc<AppContext>>) -> Json<serde_json::Value> {
    Json(json!({
        "torrents_cached": ctx.cache.len().await,
        "cycles_run": ctx.engine.cycles_run(),
        "cycle_failures": ctx.engine.cycle_failures(),
        "webhooks_queued": ctx.webhooks.len(),
        "webhooks_dropped": ctx.webhooks.dropped_count(),
    }))
}

pub async fn stats_trackers(State(ctx): State<Arc<AppContext>>) -> Json<serde_json::Value> {
    let snapshot = ctx.cache.snapshot().await;
    let mut per_tracker: std::collections::HashMap<String, (usize, i64)> =
        std::collections::HashMap::new();
    for entry in snapshot {
        let bucket = per_tracker.entry(entry.tracker_id).or_insert((0, 0));
        bucket.0 += 1;
        bucket.1 += entry.info.upspeed;
    }
    Json(json!(per_tracker
        .into_iter()
        .map(|(id, (count, usage))| json!({"tracker_id": id, "torrents": count, "current_usage": usage}))
        .collect::<Vec<_>>()))
}

pub async fn stats_managed(State(ctx): State<Arc<AppContext>>) -> Json<serde_json::Value> {
    let snapshot = ctx.cache.snapshot().await;
    Json(json!(snapshot
        .into_iter()
        .map(|e| json!({
            "hash": e.info.hash,
            "tracker_id": e.tracker_id,
            "upload_limit": e.info.up_limit,
            "up_speed": e.info.upspeed,
        }))
        .collect::<Vec<_>>()))
}

pub async fn config(State(ctx): State<Arc<AppContext>>) -> Json<serde_json::Value> {
    let config = ctx.engine.config_snapshot().await;
    Json(json!({
        "global": {
            "update_interval": config.global.update_interval,
            "allocation_strategy": format!("{:?}", config.global.allocation_strategy),
            "rollout_percentage": config.global.rollout_percentage,
            "dry_run": config.global.dry_run,
        },
        "qbittorrent": {
            "host": config.qbittorrent.host,
            "port": config.qbittorrent.port,
            "username": config.qbittorrent.username,
            "password": "***",
        },
        "trackers": config.trackers.iter().map(|t| json!({
            "id": t.id, "name": t.name, "pattern": t.pattern,
            "max_upload_speed": t.max_upload_speed, "priority": t.priority,
        })).collect::<Vec<_>>(),
    }))
}

#[derive(Deserialize)]
pub struct MatchTestQuery {
    url: String,
}

pub async fn match_test(
    State(ctx): State<Arc<AppContext>>,
    Query(query): Query<MatchTestQuery>,
) -> Json<serde_json::Value> {
    let id = ctx.matcher.match_tracker(&query.url);
    Json(json!({ "url": query.url, "tracker_id": id }))
}

pub async fn preview_next_cycle(State(ctx): State<Arc<AppContext>>) -> Json<serde_json::Value> {
    let proposal = ctx.engine.preview_next_cycle().await;
    Json(json!(proposal))
}

pub async fn cycle_force(State(ctx): State<Arc<AppContext>>) -> Json<serde_json::Value> {
    let summary = ctx.engine.run_cycle().await;
    Json(json!({
        "torrents_seen": summary.torrents_seen,
        "torrents_managed": summary.torrents_managed,
        "writes_applied": summary.writes_applied,
        "errors": summary.errors,
    }))
}

#[derive(Deserialize)]
pub struct RolloutBody {
    percentage: u8,
}

pub async fn rollout(
    State(ctx): State<Arc<AppContext>>,
    Json(body): Json<RolloutBody>,
) -> (StatusCode, Json<serde_json::Value>) {
    if body.percentage > 100 {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "percentage must be between 0 and 100" })),
        );
    }
    let current = ctx.engine.config_snapshot().await;
    let mut updated = (*current).clone();
    updated.global.rollout_percentage = body.percentage;
    ctx.engine.replace_config(Arc::new(updated)).await;
    (StatusCode::OK, Json(json!({ "rollout_percentage": body.percentage })))
}

pub async fn rollback(State(ctx): State<Arc<AppContext>>) -> Json<serde_json::Value> {
    let records = ctx.rollback.list_unrestored().await.unwrap_or_default();
    let mut restored = 0usize;
    let mut by_hash_earliest: std::collections::HashMap<String, i64> = std::collections::HashMap::new();
    for record in &records {
        by_hash_earliest
            .entry(record.torrent_hash.clone())
            .and_modify(|v| *v = record.previous_limit)
            .or_insert(record.previous_limit);
    }
    let mut restored_hashes = std::collections::HashSet::new();
    for (hash, old_limit) in &by_hash_earliest {
        if ctx
            .client
            .set_upload_limits(std::slice::from_ref(hash), *old_limit)
            .await
            .is_ok()
        {
            restored += 1;
            restored_hashes.insert(hash.clone());
        }
    }
    for record in &records {
        if restored_hashes.contains(&record.torrent_hash) {
            let _ = ctx.rollback.mark_restored(record.id).await;
        }
    }
    Json(json!({ "restored": restored, "attempted": by_hash_earliest.len() }))
}

pub async fn limits_reset(State(ctx): State<Arc<AppContext>>) -> Json<serde_json::Value> {
    let snapshot = ctx.cache.snapshot().await;
    let hashes: Vec<String> = snapshot.into_iter().map(|e| e.info.hash).collect();
    let applied = ctx.client.set_upload_limits(&hashes, -1).await.is_ok();
    Json(json!({ "applied": applied, "torrents": hashes.len() }))
}

pub async fn smoothing_reset(State(ctx): State<Arc<AppContext>>) -> Json<serde_json::Value> {
    ctx.engine.reset_smoothing().await;
    Json(json!({ "ok": true }))
}

pub async fn config_reload(
    State(ctx): State<Arc<AppContext>>,
) -> (StatusCode, Json<serde_json::Value>) {
    let path = ctx.config_path.clone();
    match crate::config::load(&path) {
        Ok(reloaded) => {
            ctx.engine.replace_config(Arc::new(reloaded)).await;
            (StatusCode::OK, Json(json!({ "reloaded": true })))
        }
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "reloaded": false, "error": e.to_string() })),
        ),
    }
}

#[derive(Serialize, Deserialize)]
pub struct WebhookBody {
    pub event: String,
    pub hash: String,
    pub name: Option<String>,
    pub tracker: Option<String>,
}

pub async fn webhook(
    State(ctx): State<Arc<AppContext>>,
    Json(body): Json<WebhookBody>,
) -> StatusCode {
    let event_type = match body.event.as_str() {
        "add" => crate::webhook::EventType::Add,
        "delete" => crate::webhook::EventType::Delete,
        _ => crate::webhook::EventType::Complete,
    };
    let event = WebhookEvent {
        event_type,
        torrent_hash: body.hash,
        name: body.name.unwrap_or_default(),
        tracker_url: body.tracker,
        received_at: chrono::Utc::now(),
    };

    if body.event == "complete" {
        let config = ctx.engine.config_snapshot().await;
        crate::webhook::cross_seed::spawn_forward(
            ctx.cross_seed_http.clone(),
            config.cross_seed.clone(),
            event.clone(),
        );
    }

    ctx.webhooks.enqueue(event);
    StatusCode::ACCEPTED
}
