//! Wire API for the URL domain/dataset index (§6): query routes, a
//! separate Prometheus endpoint, and the axum router assembly shared
//! by the `serve` subcommand and its tests.

pub mod metrics;
pub mod routes;
pub mod state;
pub mod wire;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(routes::healthz))
        .route("/v1/domain/:domain", get(routes::datasets_of))
        .route("/v1/domain/:domain/datasets/:dataset_id/urls", get(routes::urls_of))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
