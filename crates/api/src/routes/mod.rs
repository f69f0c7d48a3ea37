//! HTTP routes

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::context::AppContext;

pub mod calendar;
pub mod health;

/// Build the application router.
pub fn router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/calendar/connect", post(calendar::connect))
        .route("/api/calendar/callback", get(calendar::callback))
        .route("/api/calendar/sync", post(calendar::sync))
        .route("/api/calendar/status", get(calendar::status))
        .route("/api/calendar/connections/{provider}", delete(calendar::disconnect))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}
