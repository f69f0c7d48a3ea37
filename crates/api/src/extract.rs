//! Request extractors

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use meetsync_domain::MeetSyncError;

use crate::context::AppContext;
use crate::error::ApiError;

/// Authenticated user id, resolved from the bearer token.
///
/// Authentication itself is an external collaborator; this extractor only
/// consumes the resolver seam.
pub struct AuthUser(pub String);

impl FromRequestParts<Arc<AppContext>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppContext>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| {
                ApiError(MeetSyncError::Auth("missing authorization header".to_string()))
            })?;

        match state.resolver.resolve(token).await? {
            Some(user_id) => Ok(Self(user_id)),
            None => Err(ApiError(MeetSyncError::Auth("unrecognized bearer token".to_string()))),
        }
    }
}
