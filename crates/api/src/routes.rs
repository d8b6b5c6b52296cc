use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::{handlers::*, AppState};

pub fn create_router() -> Router<AppState> {
    Router::new()
        // Station custom-server push
        .route("/", get(ingest_report))
        // Health and metrics
        .route("/healthz", get(health_check))
        .route("/metrics", get(metrics))
}

pub fn build_router(state: AppState) -> Router {
    create_router()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
