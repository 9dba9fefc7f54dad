//! HTTP Surface (spec §4.7): observability and operator endpoints built
//! on `axum`, sharing one [`AppContext`](crate::app::AppContext).

mod handlers;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::app::AppContext;

pub fn router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/stats", get(handlers::stats))
        .route("/stats/trackers", get(handlers::stats_trackers))
        .route("/stats/managed", get(handlers::stats_managed))
        .route("/config", get(handlers::config))
        .route("/config/reload", post(handlers::config_reload))
        .route("/preview/next-cycle", get(handlers::preview_next_cycle))
        .route("/match/test", get(handlers::match_test))
        .route("/cycle/force", post(handlers::cycle_force))
        .route("/rollout", post(handlers::rollout))
        .route("/rollback", post(handlers::rollback))
        .route("/limits/reset", post(handlers::limits_reset))
        .route("/smoothing/reset", post(handlers::smoothing_reset))
        .route("/webhook", post(handlers::webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}
