//! Axum router wiring.
//!
//! - `/`              : static greeting
//! - `<hub_path>`     : WebSocket upgrade (default `/chathub`)
//! - `/healthz`, `/metrics`
//!
//! Every response passes through permissive CORS and MIME-filtered compression.

use axum::{routing::get, Router};

use crate::{app_state::AppState, middleware, ops, transport};

pub fn build_router(state: AppState) -> Router {
    let cfg = state.cfg();
    let hub_path = cfg.server.hub_path.clone();
    let compression = middleware::compression_layer(&cfg.compression);

    Router::new()
        .route("/", get(ops::greeting))
        .route(&hub_path, get(transport::ws::ws_upgrade))
        .route("/healthz", get(ops::healthz))
        .route("/metrics", get(ops::metrics))
        .layer(compression)
        .layer(middleware::cors_layer())
        .with_state(state)
}
