//! Google Calendar provider implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use meetsync_core::CalendarProvider;
use meetsync_domain::{
    LocalEvent, MeetSyncError, ProviderCredentials, ProviderKind, RemoteEventRow, Result,
    TokenGrant,
};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::http_client;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";
const GOOGLE_SCOPES: &str = "https://www.googleapis.com/auth/calendar.events openid email";

/// Google Calendar provider
pub struct GoogleCalendarProvider {
    client: Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    token_url: String,
    api_base: String,
    userinfo_url: String,
}

impl GoogleCalendarProvider {
    /// Create a new Google adapter from OAuth client credentials.
    pub fn new(credentials: &ProviderCredentials, redirect_uri: &str) -> Self {
        Self {
            client: http_client(),
            client_id: credentials.client_id.clone(),
            client_secret: credentials.client_secret.clone(),
            redirect_uri: redirect_uri.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            api_base: GOOGLE_CALENDAR_API_BASE.to_string(),
            userinfo_url: GOOGLE_USERINFO_URL.to_string(),
        }
    }

    /// Point the adapter at custom endpoints (tests aim this at a mock
    /// server).
    pub fn with_endpoints(
        mut self,
        token_url: impl Into<String>,
        api_base: impl Into<String>,
        userinfo_url: impl Into<String>,
    ) -> Self {
        self.token_url = token_url.into();
        self.api_base = api_base.into();
        self.userinfo_url = userinfo_url.into();
        self
    }

    fn event_body(event: &LocalEvent) -> serde_json::Value {
        json!({
            "summary": event.title,
            "description": event.description,
            "location": event.location,
            "start": { "dateTime": event.starts_at.to_rfc3339() },
            "end": { "dateTime": event.ends_at.to_rfc3339() },
        })
    }
}

#[async_trait]
impl CalendarProvider for GoogleCalendarProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }

    fn authorize_url(&self, state: &str) -> String {
        format!(
            "{GOOGLE_AUTH_URL}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent&state={}",
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(GOOGLE_SCOPES),
            urlencoding::encode(state),
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant> {
        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .send()
            .await
            .map_err(|e| MeetSyncError::TokenExchange {
                provider: ProviderKind::Google,
                message: format!("token request failed: {e}"),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(MeetSyncError::TokenExchange {
                provider: ProviderKind::Google,
                message: format!("({status}) {error_text}"),
            });
        }

        let token: GoogleTokenResponse = response.json().await.map_err(|e| {
            MeetSyncError::TokenExchange {
                provider: ProviderKind::Google,
                message: format!("failed to parse token response: {e}"),
            }
        })?;

        Ok(TokenGrant {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_in_seconds: token.expires_in,
            scope: token.scope,
        })
    }

    async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenGrant> {
        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| MeetSyncError::TokenRefresh {
                provider: ProviderKind::Google,
                message: format!("token refresh request failed: {e}"),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(MeetSyncError::TokenRefresh {
                provider: ProviderKind::Google,
                message: format!("({status}) {error_text}"),
            });
        }

        let token: GoogleTokenResponse = response.json().await.map_err(|e| {
            MeetSyncError::TokenRefresh {
                provider: ProviderKind::Google,
                message: format!("failed to parse token response: {e}"),
            }
        })?;

        Ok(TokenGrant {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_in_seconds: token.expires_in,
            scope: token.scope,
        })
    }

    async fn fetch_account_email(&self, access_token: &str) -> Result<String> {
        let response = self
            .client
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| MeetSyncError::Network(format!("userinfo request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(MeetSyncError::Network(format!(
                "userinfo request failed ({})",
                response.status()
            )));
        }

        let info: GoogleUserInfo = response
            .json()
            .await
            .map_err(|e| MeetSyncError::Network(format!("failed to parse userinfo: {e}")))?;

        info.email
            .ok_or_else(|| MeetSyncError::Network("userinfo response carried no email".into()))
    }

    async fn upsert_remote_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event: &LocalEvent,
        existing_remote_id: Option<&str>,
    ) -> Result<String> {
        let calendar = urlencoding::encode(calendar_id);
        let request = match existing_remote_id {
            Some(remote_id) => self.client.put(format!(
                "{}/calendars/{calendar}/events/{}",
                self.api_base,
                urlencoding::encode(remote_id)
            )),
            None => self.client.post(format!("{}/calendars/{calendar}/events", self.api_base)),
        };

        let remote_sync_error = |message: String| MeetSyncError::RemoteSync {
            provider: ProviderKind::Google,
            title: event.title.clone(),
            message,
        };

        let response = request
            .bearer_auth(access_token)
            .json(&Self::event_body(event))
            .send()
            .await
            .map_err(|e| remote_sync_error(format!("event request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(remote_sync_error(format!("({status}) {error_text}")));
        }

        let created: GoogleEventId = response
            .json()
            .await
            .map_err(|e| remote_sync_error(format!("failed to parse event response: {e}")))?;

        Ok(created.id)
    }

    async fn list_remote_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<RemoteEventRow>> {
        let url =
            format!("{}/calendars/{}/events", self.api_base, urlencoding::encode(calendar_id));

        let response = self
            .client
            .get(&url)
            .bearer_auth(access_token)
            .query(&[
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
                ("timeMin", window_start.to_rfc3339()),
                ("timeMax", window_end.to_rfc3339()),
                ("maxResults", "2500".to_string()),
            ])
            .send()
            .await
            .map_err(|e| MeetSyncError::Network(format!("Google API request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(MeetSyncError::Network(format!(
                "Google API error ({status}): {error_text}"
            )));
        }

        let events: GoogleEventsResponse = response.json().await.map_err(|e| {
            MeetSyncError::InvalidInput(format!("failed to parse Google response: {e}"))
        })?;

        Ok(events.items.into_iter().filter_map(normalize_event).collect())
    }
}

/// Map one Google event resource to the normalized row shape.
///
/// Partially-formed resources (missing id, start, or end, or an
/// all-day/unparseable time) are dropped rather than failing the listing.
fn normalize_event(item: GoogleEventResource) -> Option<RemoteEventRow> {
    let id = item.id?;
    let starts_at = parse_event_time(item.start.as_ref());
    let ends_at = parse_event_time(item.end.as_ref());

    let (Some(starts_at), Some(ends_at)) = (starts_at, ends_at) else {
        debug!(event_id = %id, "dropping remote event without usable start/end");
        return None;
    };

    Some(RemoteEventRow {
        provider_event_id: id,
        title: item.summary.unwrap_or_else(|| "Untitled Event".to_string()),
        description: item.description,
        location: item.location,
        starts_at,
        ends_at,
    })
}

fn parse_event_time(value: Option<&GoogleEventDateTime>) -> Option<DateTime<Utc>> {
    let date_time = value?.date_time.as_deref()?;
    DateTime::parse_from_rfc3339(date_time).ok().map(|dt| dt.with_timezone(&Utc))
}

#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleEventId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct GoogleEventsResponse {
    #[serde(default)]
    items: Vec<GoogleEventResource>,
}

#[derive(Debug, Deserialize)]
struct GoogleEventResource {
    id: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    location: Option<String>,
    start: Option<GoogleEventDateTime>,
    end: Option<GoogleEventDateTime>,
}

#[derive(Debug, Deserialize)]
struct GoogleEventDateTime {
    #[serde(rename = "dateTime")]
    date_time: Option<String>,
}
