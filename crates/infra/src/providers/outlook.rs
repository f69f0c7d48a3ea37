//! Outlook calendar provider implementation (Microsoft Graph)

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
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

const OUTLOOK_AUTH_URL: &str = "https://login.microsoftonline.com/common/oauth2/v2.0/authorize";
const OUTLOOK_TOKEN_URL: &str = "https://login.microsoftonline.com/common/oauth2/v2.0/token";
const MICROSOFT_GRAPH_API_BASE: &str = "https://graph.microsoft.com/v1.0";
const OUTLOOK_SCOPES: &str = "offline_access openid email Calendars.ReadWrite User.Read";
const OUTLOOK_TIMEZONE_HEADER: &str = r#"outlook.timezone="UTC""#;
const GRAPH_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Outlook calendar provider
pub struct OutlookCalendarProvider {
    client: Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    token_url: String,
    api_base: String,
}

impl OutlookCalendarProvider {
    /// Create a new Outlook adapter from OAuth client credentials.
    pub fn new(credentials: &ProviderCredentials, redirect_uri: &str) -> Self {
        Self {
            client: http_client(),
            client_id: credentials.client_id.clone(),
            client_secret: credentials.client_secret.clone(),
            redirect_uri: redirect_uri.to_string(),
            token_url: OUTLOOK_TOKEN_URL.to_string(),
            api_base: MICROSOFT_GRAPH_API_BASE.to_string(),
        }
    }

    /// Point the adapter at custom endpoints (tests aim this at a mock
    /// server).
    pub fn with_endpoints(
        mut self,
        token_url: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        self.token_url = token_url.into();
        self.api_base = api_base.into();
        self
    }

    /// Graph wants a naive datetime plus an explicit time zone field.
    fn event_body(event: &LocalEvent) -> serde_json::Value {
        json!({
            "subject": event.title,
            "body": {
                "contentType": "Text",
                "content": event.description.clone().unwrap_or_default(),
            },
            "location": {
                "displayName": event.location.clone().unwrap_or_default(),
            },
            "start": {
                "dateTime": event.starts_at.format(GRAPH_DATETIME_FORMAT).to_string(),
                "timeZone": "UTC",
            },
            "end": {
                "dateTime": event.ends_at.format(GRAPH_DATETIME_FORMAT).to_string(),
                "timeZone": "UTC",
            },
        })
    }

    /// Event collection URL; the synthetic `primary` id maps to the
    /// account's default calendar.
    fn events_url(&self, calendar_id: &str) -> String {
        if calendar_id.eq_ignore_ascii_case("primary") {
            format!("{}/me/events", self.api_base)
        } else {
            format!("{}/me/calendars/{}/events", self.api_base, urlencoding::encode(calendar_id))
        }
    }

    fn calendar_view_url(&self, calendar_id: &str) -> String {
        if calendar_id.eq_ignore_ascii_case("primary") {
            format!("{}/me/calendarView", self.api_base)
        } else {
            format!(
                "{}/me/calendars/{}/calendarView",
                self.api_base,
                urlencoding::encode(calendar_id)
            )
        }
    }

    async fn token_request(&self, params: &[(&str, &str)], refresh: bool) -> Result<TokenGrant> {
        let wrap = |message: String| {
            if refresh {
                MeetSyncError::TokenRefresh { provider: ProviderKind::Outlook, message }
            } else {
                MeetSyncError::TokenExchange { provider: ProviderKind::Outlook, message }
            }
        };

        let response = self
            .client
            .post(&self.token_url)
            .form(params)
            .send()
            .await
            .map_err(|e| wrap(format!("token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(wrap(format!("({status}) {error_text}")));
        }

        let token: OutlookTokenResponse = response
            .json()
            .await
            .map_err(|e| wrap(format!("failed to parse token response: {e}")))?;

        Ok(TokenGrant {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_in_seconds: token.expires_in,
            scope: token.scope,
        })
    }
}

#[async_trait]
impl CalendarProvider for OutlookCalendarProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Outlook
    }

    fn authorize_url(&self, state: &str) -> String {
        format!(
            "{OUTLOOK_AUTH_URL}?client_id={}&redirect_uri={}&response_type=code&response_mode=query&scope={}&state={}",
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(OUTLOOK_SCOPES),
            urlencoding::encode(state),
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenGrant> {
        self.token_request(
            &[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("scope", OUTLOOK_SCOPES),
            ],
            false,
        )
        .await
    }

    async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenGrant> {
        self.token_request(
            &[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
                ("scope", OUTLOOK_SCOPES),
            ],
            true,
        )
        .await
    }

    async fn fetch_account_email(&self, access_token: &str) -> Result<String> {
        let response = self
            .client
            .get(format!("{}/me", self.api_base))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| MeetSyncError::Network(format!("profile request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(MeetSyncError::Network(format!(
                "profile request failed ({})",
                response.status()
            )));
        }

        let profile: OutlookProfile = response
            .json()
            .await
            .map_err(|e| MeetSyncError::Network(format!("failed to parse profile: {e}")))?;

        profile
            .mail
            .or(profile.user_principal_name)
            .ok_or_else(|| MeetSyncError::Network("profile carried no email".into()))
    }

    async fn upsert_remote_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event: &LocalEvent,
        existing_remote_id: Option<&str>,
    ) -> Result<String> {
        let request = match existing_remote_id {
            Some(remote_id) => self.client.patch(format!(
                "{}/me/events/{}",
                self.api_base,
                urlencoding::encode(remote_id)
            )),
            None => self.client.post(self.events_url(calendar_id)),
        };

        let remote_sync_error = |message: String| MeetSyncError::RemoteSync {
            provider: ProviderKind::Outlook,
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

        let created: OutlookEventId = response
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
        let response = self
            .client
            .get(self.calendar_view_url(calendar_id))
            .bearer_auth(access_token)
            .header("Prefer", OUTLOOK_TIMEZONE_HEADER)
            .query(&[
                ("startDateTime", window_start.to_rfc3339()),
                ("endDateTime", window_end.to_rfc3339()),
                ("$top", "500".to_string()),
            ])
            .send()
            .await
            .map_err(|e| MeetSyncError::Network(format!("Microsoft API request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(MeetSyncError::Network(format!(
                "Microsoft API error ({status}): {error_text}"
            )));
        }

        let events: OutlookEventsResponse = response.json().await.map_err(|e| {
            MeetSyncError::InvalidInput(format!("failed to parse Microsoft response: {e}"))
        })?;

        Ok(events.value.into_iter().filter_map(normalize_event).collect())
    }
}

/// Map one Graph event to the normalized row shape.
///
/// Partially-formed events (missing id, start, or end, or an unparseable
/// time) are dropped rather than failing the listing.
fn normalize_event(item: OutlookEventResource) -> Option<RemoteEventRow> {
    let id = item.id?;
    let starts_at = item.start.as_ref().and_then(parse_graph_time);
    let ends_at = item.end.as_ref().and_then(parse_graph_time);

    let (Some(starts_at), Some(ends_at)) = (starts_at, ends_at) else {
        debug!(event_id = %id, "dropping remote event without usable start/end");
        return None;
    };

    Some(RemoteEventRow {
        provider_event_id: id,
        title: item.subject.unwrap_or_else(|| "Untitled Event".to_string()),
        description: item.body_preview,
        location: item.location.and_then(|l| l.display_name).filter(|name| !name.is_empty()),
        starts_at,
        ends_at,
    })
}

/// Graph returns `2026-08-10T18:00:00.0000000` plus a separate time zone
/// field; the listing requests UTC via the `Prefer` header.
fn parse_graph_time(value: &OutlookEventDateTime) -> Option<DateTime<Utc>> {
    let raw = value.date_time.as_deref()?.trim();

    if raw.ends_with('Z') {
        return DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[derive(Debug, Deserialize)]
struct OutlookTokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OutlookProfile {
    mail: Option<String>,
    #[serde(rename = "userPrincipalName")]
    user_principal_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OutlookEventId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct OutlookEventsResponse {
    #[serde(default)]
    value: Vec<OutlookEventResource>,
}

#[derive(Debug, Deserialize)]
struct OutlookEventResource {
    id: Option<String>,
    subject: Option<String>,
    #[serde(rename = "bodyPreview")]
    body_preview: Option<String>,
    location: Option<OutlookLocation>,
    start: Option<OutlookEventDateTime>,
    end: Option<OutlookEventDateTime>,
}

#[derive(Debug, Deserialize)]
struct OutlookLocation {
    #[serde(rename = "displayName")]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OutlookEventDateTime {
    #[serde(rename = "dateTime")]
    date_time: Option<String>,
}
