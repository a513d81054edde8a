use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::middleware::{cors_layer, metrics_middleware};
use super::{handlers, submissions};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config().server.cors_origins);

    // API routes
    let api_routes = Router::new()
        // Submissions
        .route(
            "/submissions",
            get(submissions::list_submissions).post(submissions::create_submission),
        )
        // Same collection with a trailing slash, as browser clients send it
        .route(
            "/submissions/",
            get(submissions::list_submissions).post(submissions::create_submission),
        )
        .route("/submissions/{id}", get(submissions::get_submission))
        // Transport status and config
        .route("/status", get(handlers::get_status))
        .route("/config", get(handlers::get_config));

    Router::new()
        .nest("/api", api_routes)
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::get_metrics))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
