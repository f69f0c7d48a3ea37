//! OAuth flow controller
//!
//! Orchestrates the two halves of the redirect-based OAuth flow: `start`
//! signs a state payload and hands back the provider's authorize URL;
//! `callback` verifies the returning state, exchanges the code, and upserts
//! the connection record.
//!
//! Every callback produces a redirect target. Failures become a sanitized
//! reason attached to the redirect, never an error page.

use std::sync::Arc;

use chrono::{Duration, Utc};
use meetsync_common::auth::state::{StateCodec, StateCodecError, StatePayload};
use meetsync_common::validation::sanitize_return_path;
use meetsync_domain::constants::{
    DEFAULT_CALENDAR_ID, FALLBACK_RETURN_PATH, REDIRECT_REASON_MAX_LEN, STATE_MAX_AGE_MINUTES,
    STATE_VERSION,
};
use meetsync_domain::{Connection, MeetSyncError, ProviderKind, Result, TokenGrant};
use serde::Deserialize;
use tracing::{info, instrument, warn};

use super::ports::{ConnectionRepository, ProviderMap};

/// Result of starting an OAuth flow.
#[derive(Debug, Clone)]
pub struct StartedFlow {
    /// Provider authorize URL with the signed state embedded.
    pub url: String,
}

/// Query parameters delivered to the OAuth callback endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Failure terminal of one OAuth attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackFailure {
    /// State token unparseable, tampered with, or older than the window.
    StateInvalid,
    /// The provider reported an OAuth error in the callback query.
    ProviderError,
    /// The callback carried no authorization code.
    CodeMissing,
    /// The code-for-token exchange was rejected.
    TokenExchangeFailed,
    /// The connection record could not be persisted.
    Internal,
}

/// Terminal state of one OAuth attempt.
#[derive(Debug, Clone)]
pub enum CallbackResult {
    Success,
    Failure { kind: CallbackFailure, reason: String },
}

/// Where to send the user after the callback, and with what outcome.
#[derive(Debug, Clone)]
pub struct CallbackOutcome {
    /// Sanitized in-app path the user returns to.
    pub return_path: String,
    /// Provider label for the redirect query (`"unknown"` when the state
    /// never parsed).
    pub provider_label: String,
    pub result: CallbackResult,
}

impl CallbackOutcome {
    fn failed(
        return_path: &str,
        provider_label: &str,
        kind: CallbackFailure,
        reason: &str,
    ) -> Self {
        Self {
            return_path: return_path.to_string(),
            provider_label: provider_label.to_string(),
            result: CallbackResult::Failure { kind, reason: truncate_reason(reason) },
        }
    }
}

/// Orchestrates OAuth start and callback against the provider adapters and
/// the connection store.
pub struct OAuthFlowController {
    codec: StateCodec,
    connections: Arc<dyn ConnectionRepository>,
    providers: ProviderMap,
}

impl OAuthFlowController {
    /// Create a new flow controller.
    pub fn new(
        codec: StateCodec,
        connections: Arc<dyn ConnectionRepository>,
        providers: ProviderMap,
    ) -> Self {
        Self { codec, connections, providers }
    }

    /// Begin an OAuth connection attempt.
    ///
    /// Signs `{provider, user_id, return_path, issued_at_ms, version}` and
    /// returns the authorize URL with that state embedded.
    #[instrument(skip(self), fields(user_id, provider = %provider))]
    pub fn start(
        &self,
        user_id: &str,
        provider: ProviderKind,
        return_path: &str,
    ) -> Result<StartedFlow> {
        let adapter = self.providers.get(&provider).ok_or_else(|| {
            MeetSyncError::InvalidInput(format!("provider not configured: {provider}"))
        })?;

        let payload = StatePayload {
            provider: provider.as_str().to_string(),
            user_id: user_id.to_string(),
            return_path: sanitize_return_path(return_path, FALLBACK_RETURN_PATH).to_string(),
            issued_at_ms: Utc::now().timestamp_millis(),
            version: STATE_VERSION,
        };

        let state = self
            .codec
            .create(&payload)
            .map_err(|err| MeetSyncError::Internal(format!("failed to sign state: {err}")))?;

        info!(user_id, provider = %provider, "oauth flow started");

        Ok(StartedFlow { url: adapter.authorize_url(&state) })
    }

    /// Complete an OAuth connection attempt.
    ///
    /// Always yields a redirect outcome; only `Success` persists a
    /// connection. The previously stored refresh token is preserved when the
    /// provider does not return a new one.
    #[instrument(skip(self, query))]
    pub async fn callback(&self, query: &CallbackQuery) -> CallbackOutcome {
        // Verify the state before trusting anything else in the query.
        let Some(raw_state) = query.state.as_deref() else {
            return CallbackOutcome::failed(
                FALLBACK_RETURN_PATH,
                "unknown",
                CallbackFailure::StateInvalid,
                "missing_state",
            );
        };

        let payload = match self.codec.parse(raw_state) {
            Ok(payload) => payload,
            Err(err) => {
                let err = map_state_error(err);
                warn!(error = %err, "oauth state rejected");
                return CallbackOutcome::failed(
                    FALLBACK_RETURN_PATH,
                    "unknown",
                    CallbackFailure::StateInvalid,
                    "invalid_state",
                );
            }
        };

        let return_path =
            sanitize_return_path(&payload.return_path, FALLBACK_RETURN_PATH).to_string();

        let Ok(provider) = payload.provider.parse::<ProviderKind>() else {
            return CallbackOutcome::failed(
                &return_path,
                "unknown",
                CallbackFailure::StateInvalid,
                "invalid_state",
            );
        };
        let label = provider.as_str();

        if payload.version != STATE_VERSION {
            return CallbackOutcome::failed(
                &return_path,
                label,
                CallbackFailure::StateInvalid,
                "invalid_state",
            );
        }

        // The codec proves authenticity only; freshness is enforced here.
        let age = Utc::now().timestamp_millis() - payload.issued_at_ms;
        if age > Duration::minutes(STATE_MAX_AGE_MINUTES).num_milliseconds() {
            warn!(provider = %provider, age_ms = age, "oauth state expired");
            return CallbackOutcome::failed(
                &return_path,
                label,
                CallbackFailure::StateInvalid,
                "state_expired",
            );
        }

        if let Some(error) = query.error.as_deref() {
            let reason = query.error_description.as_deref().unwrap_or(error);
            let err = MeetSyncError::ProviderOAuth(reason.to_string());
            warn!(provider = %provider, error = %err, "provider reported oauth error");
            return CallbackOutcome::failed(
                &return_path,
                label,
                CallbackFailure::ProviderError,
                reason,
            );
        }

        let Some(code) = query.code.as_deref() else {
            return CallbackOutcome::failed(
                &return_path,
                label,
                CallbackFailure::CodeMissing,
                "missing_code",
            );
        };

        let Some(adapter) = self.providers.get(&provider) else {
            return CallbackOutcome::failed(
                &return_path,
                label,
                CallbackFailure::Internal,
                "provider_not_configured",
            );
        };

        let grant = match adapter.exchange_code(code).await {
            Ok(grant) => grant,
            Err(err) => {
                warn!(provider = %provider, error = %err, "token exchange failed");
                return CallbackOutcome::failed(
                    &return_path,
                    label,
                    CallbackFailure::TokenExchangeFailed,
                    &err.to_string(),
                );
            }
        };

        // Best-effort identity label: a failed fetch never fails the flow,
        // but the error is observed before being collapsed away.
        let provider_account_email = match adapter.fetch_account_email(&grant.access_token).await {
            Ok(email) => Some(email),
            Err(err) => {
                warn!(provider = %provider, error = %err, "account email fetch failed");
                None
            }
        };

        if let Err(err) =
            self.persist_connection(&payload.user_id, provider, grant, provider_account_email).await
        {
            warn!(provider = %provider, error = %err, "failed to persist connection");
            return CallbackOutcome::failed(
                &return_path,
                label,
                CallbackFailure::Internal,
                "storage_error",
            );
        }

        info!(user_id = %payload.user_id, provider = %provider, "oauth connection established");

        CallbackOutcome {
            return_path,
            provider_label: label.to_string(),
            result: CallbackResult::Success,
        }
    }

    async fn persist_connection(
        &self,
        user_id: &str,
        provider: ProviderKind,
        grant: TokenGrant,
        provider_account_email: Option<String>,
    ) -> Result<()> {
        let existing = self.connections.find(user_id, provider).await?;

        let refresh_token = grant
            .refresh_token
            .or_else(|| existing.as_ref().and_then(|c| c.refresh_token.clone()));
        let provider_calendar_id = existing
            .as_ref()
            .map_or_else(|| DEFAULT_CALENDAR_ID.to_string(), |c| c.provider_calendar_id.clone());

        let connection = Connection {
            user_id: user_id.to_string(),
            provider,
            provider_account_email,
            provider_calendar_id,
            access_token: grant.access_token,
            refresh_token,
            expires_at: grant
                .expires_in_seconds
                .map(|secs| Utc::now() + Duration::seconds(secs)),
            updated_at: Utc::now(),
        };

        self.connections.upsert(connection).await
    }
}

fn map_state_error(err: StateCodecError) -> MeetSyncError {
    MeetSyncError::InvalidState(err.to_string())
}

fn truncate_reason(reason: &str) -> String {
    if reason.len() <= REDIRECT_REASON_MAX_LEN {
        reason.to_string()
    } else {
        reason.chars().take(REDIRECT_REASON_MAX_LEN).collect()
    }
}
