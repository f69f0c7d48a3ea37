//! Calendar connection and sync routes

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header::LOCATION, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use meetsync_core::{CallbackOutcome, CallbackQuery, CallbackResult};
use meetsync_domain::{CalendarStatus, ProviderKind, SyncSummary};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::context::AppContext;
use crate::error::ApiError;
use crate::extract::AuthUser;

/// Request body for starting an OAuth connection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectRequest {
    pub provider: ProviderKind,
    pub return_path: Option<String>,
}

/// Response for a started OAuth connection.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectResponse {
    pub url: String,
}

/// Request body for a sync run.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    pub event_id: Option<String>,
}

/// Response for a connection removal.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectResponse {
    pub provider: ProviderKind,
    pub disconnected: bool,
}

/// Start an OAuth connection: returns the provider authorize URL.
pub async fn connect(
    State(ctx): State<Arc<AppContext>>,
    AuthUser(user_id): AuthUser,
    Json(request): Json<ConnectRequest>,
) -> Result<Json<ConnectResponse>, ApiError> {
    let flow = ctx.flow.start(
        &user_id,
        request.provider,
        request.return_path.as_deref().unwrap_or("/"),
    )?;
    Ok(Json(ConnectResponse { url: flow.url }))
}

/// OAuth callback: always redirects back into the application UI with a
/// success or failure indicator, never a bare error page.
pub async fn callback(
    State(ctx): State<Arc<AppContext>>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let outcome = ctx.flow.callback(&query).await;
    let location = redirect_location(&ctx.config.server.app_base_url, &outcome);

    (StatusCode::FOUND, [(LOCATION, location)]).into_response()
}

/// Trigger a sync run, optionally scoped to one event.
pub async fn sync(
    State(ctx): State<Arc<AppContext>>,
    AuthUser(user_id): AuthUser,
    Json(request): Json<SyncRequest>,
) -> Result<Json<SyncSummary>, ApiError> {
    let summary = ctx.sync.sync_user(&user_id, request.event_id.as_deref()).await?;
    Ok(Json(summary))
}

/// Report per-provider connection status.
pub async fn status(
    State(ctx): State<Arc<AppContext>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<CalendarStatus>, ApiError> {
    let connections = ctx.connections.find_for_user(&user_id).await?;
    Ok(Json(CalendarStatus::from_connections(&connections)))
}

/// Remove a provider connection. Local events and other providers' mirrors
/// are left untouched.
pub async fn disconnect(
    State(ctx): State<Arc<AppContext>>,
    AuthUser(user_id): AuthUser,
    Path(provider): Path<ProviderKind>,
) -> Result<Json<DisconnectResponse>, ApiError> {
    let disconnected = ctx.connections.delete(&user_id, provider).await?;
    if disconnected {
        info!(user_id = %user_id, provider = %provider, "calendar connection removed");
    }
    Ok(Json(DisconnectResponse { provider, disconnected }))
}

/// Compose the post-callback redirect target under the app base URL.
fn redirect_location(app_base_url: &str, outcome: &CallbackOutcome) -> String {
    let base = format!("{}{}", app_base_url.trim_end_matches('/'), outcome.return_path);
    let separator = if outcome.return_path.contains('?') { '&' } else { '?' };

    match &outcome.result {
        CallbackResult::Success => format!(
            "{base}{separator}calendar_connect=success&provider={}",
            outcome.provider_label
        ),
        CallbackResult::Failure { reason, .. } => format!(
            "{base}{separator}calendar_connect=error&provider={}&reason={}",
            outcome.provider_label,
            urlencoding::encode(reason)
        ),
    }
}
