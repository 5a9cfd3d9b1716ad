//! Liveness and readiness probes

use crate::state::AppState;
use axum::{routing::get, Router};

/// Build probe routes (unauthenticated)
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
}

async fn healthz() -> &'static str {
    "ok"
}

async fn readyz() -> &'static str {
    "ready"
}
