use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(crate::api::handlers::health_check))
        .route("/secret", post(crate::api::handlers::store_secret))
        .route("/secret/{hash}", get(crate::api::handlers::get_secret))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Served on its own listener so scrapes never share the API port.
pub fn create_metrics_router() -> Router {
    Router::new().route("/metrics", get(crate::api::handlers::render_metrics))
}
