//! Calendar domain types
//!
//! Fixed-field records for provider connections, local events, and sync
//! results. Every field here has a known type and invariant; none of these
//! shapes are open maps.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::MeetSyncError;

/// Supported calendar providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Google,
    Outlook,
}

impl ProviderKind {
    /// All supported providers, in stable order.
    pub const ALL: [Self; 2] = [Self::Google, Self::Outlook];

    /// Stable lowercase identifier used in storage and query parameters.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Outlook => "outlook",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = MeetSyncError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "google" => Ok(Self::Google),
            "outlook" => Ok(Self::Outlook),
            other => Err(MeetSyncError::InvalidInput(format!("unknown provider: {other}"))),
        }
    }
}

/// Where a local event row originated.
///
/// `Local` rows are user-authored; `Provider` rows were imported from the
/// named provider and carry the remote id in `source_event_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSource {
    Local,
    Provider(ProviderKind),
}

impl EventSource {
    /// Stable lowercase identifier used in storage.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Provider(kind) => kind.as_str(),
        }
    }
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventSource {
    type Err = MeetSyncError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "local" => Ok(Self::Local),
            other => ProviderKind::from_str(other).map(Self::Provider),
        }
    }
}

impl Serialize for EventSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventSource {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Self::from_str(&value).map_err(|err| D::Error::custom(err.to_string()))
    }
}

/// Per-event synchronization status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Pending,
    Synced,
    Error,
}

impl SyncState {
    /// Stable lowercase identifier used in storage.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Synced => "synced",
            Self::Error => "error",
        }
    }
}

impl FromStr for SyncState {
    type Err = MeetSyncError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "synced" => Ok(Self::Synced),
            "error" => Ok(Self::Error),
            other => Err(MeetSyncError::InvalidInput(format!("unknown sync state: {other}"))),
        }
    }
}

/// Persisted OAuth credential record, one per (user, provider).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub user_id: String,
    pub provider: ProviderKind,
    pub provider_account_email: Option<String>,
    pub provider_calendar_id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Connection {
    /// Whether the access token is expired or expires within `margin_secs`.
    ///
    /// A missing expiry means the provider never reported one and the token
    /// is treated as non-expiring.
    pub fn expires_within(&self, margin_secs: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at <= Utc::now() + Duration::seconds(margin_secs),
            None => false,
        }
    }
}

/// Persisted user event record.
///
/// `provider_event_ids` tracks outward mirrors of a local event, keyed by
/// provider; `source_event_id` tracks the remote origin of an imported event.
/// The two never describe the same row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalEvent {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub source: EventSource,
    pub source_event_id: Option<String>,
    pub provider_event_ids: BTreeMap<ProviderKind, String>,
    pub sync_state: SyncState,
    pub sync_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LocalEvent {
    /// Remote id of this event's mirror at `provider`, when it has one.
    pub fn remote_id_for(&self, provider: ProviderKind) -> Option<&str> {
        self.provider_event_ids.get(&provider).map(String::as_str)
    }
}

/// Parameters for upserting an imported remote event, keyed on the unique
/// (`user_id`, `source`, `source_event_id`) triple.
#[derive(Debug, Clone)]
pub struct ImportedEventParams {
    /// Row id used only when the upsert inserts; an existing row keeps its id.
    pub id: String,
    pub user_id: String,
    pub provider: ProviderKind,
    pub provider_event_id: String,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

/// Whether an import upsert created a new row or updated an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    Created,
    Updated,
}

/// Token material returned by a provider's token endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in_seconds: Option<i64>,
    pub scope: Option<String>,
}

/// Normalized remote event row, identical in shape for every provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEventRow {
    pub provider_event_id: String,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

/// Structured result of one sync run.
///
/// Errors are provider- or event-scoped human-readable strings; a summary is
/// returned even when every provider failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    pub pushed: usize,
    pub imported: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
    pub synced_at: DateTime<Utc>,
}

impl SyncSummary {
    /// Summary for a run that had nothing to do (no connections).
    pub fn empty() -> Self {
        Self { pushed: 0, imported: 0, skipped: 0, errors: Vec::new(), synced_at: Utc::now() }
    }
}

/// Connection status for a single provider, as reported by the status query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatus {
    pub connected: bool,
    pub provider_account_email: Option<String>,
    pub provider_calendar_id: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ProviderStatus {
    /// Status for a provider with no stored connection.
    pub fn disconnected() -> Self {
        Self {
            connected: false,
            provider_account_email: None,
            provider_calendar_id: None,
            expires_at: None,
            updated_at: None,
        }
    }
}

impl From<&Connection> for ProviderStatus {
    fn from(connection: &Connection) -> Self {
        Self {
            connected: true,
            provider_account_email: connection.provider_account_email.clone(),
            provider_calendar_id: Some(connection.provider_calendar_id.clone()),
            expires_at: connection.expires_at,
            updated_at: Some(connection.updated_at),
        }
    }
}

/// Aggregate connection status across all supported providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarStatus {
    pub providers: BTreeMap<ProviderKind, ProviderStatus>,
    pub connected_count: usize,
    pub has_any_connection: bool,
}

impl CalendarStatus {
    /// Build the aggregate view from a user's stored connections.
    pub fn from_connections(connections: &[Connection]) -> Self {
        let mut providers = BTreeMap::new();
        for kind in ProviderKind::ALL {
            let status = connections
                .iter()
                .find(|c| c.provider == kind)
                .map_or_else(ProviderStatus::disconnected, ProviderStatus::from);
            providers.insert(kind, status);
        }
        let connected_count = connections.len();
        Self { providers, connected_count, has_any_connection: connected_count > 0 }
    }
}
