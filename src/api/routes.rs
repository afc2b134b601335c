use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{make_span_with_request_id, request_id_middleware};

use super::handlers;
use super::AppState;

/// Creates the application router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", api_routes())
        .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
        // outside the trace layer so the span sees the request id
        .layer(middleware::from_fn(request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// API routes under /api/v1
fn api_routes() -> Router<AppState> {
    Router::new()
        // Grid
        .route("/videos", post(handlers::get_video_ids))
        .route("/grid", post(handlers::render_grid))
        .route("/videos/:id/title", get(handlers::get_title))
        .route("/videos/:id/down", get(handlers::is_down))
        // Navigation
        .route("/navigation", get(handlers::get_position))
        .route("/navigation/choose/:index", post(handlers::choose_column))
        .route("/navigation/back", post(handlers::go_back))
        // Background work
        .route("/prefetch", post(handlers::prefetch))
        .route("/redraw", get(handlers::take_redraw))
        .route("/refresh", post(handlers::refresh))
}
