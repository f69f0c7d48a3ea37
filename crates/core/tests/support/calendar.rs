use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use meetsync_core::{CalendarProvider, ConnectionRepository, LocalEventRepository, ProviderMap};
use meetsync_domain::{
    Connection, EventSource, ImportOutcome, ImportedEventParams, LocalEvent, MeetSyncError,
    ProviderKind, RemoteEventRow, Result as DomainResult, SyncState, TokenGrant,
};

/// In-memory mock for `ConnectionRepository`.
#[derive(Default)]
pub struct MockConnectionRepository {
    rows: Mutex<BTreeMap<(String, ProviderKind), Connection>>,
}

impl MockConnectionRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seed(&self, connection: Connection) {
        self.rows
            .lock()
            .unwrap()
            .insert((connection.user_id.clone(), connection.provider), connection);
    }

    pub fn get(&self, user_id: &str, provider: ProviderKind) -> Option<Connection> {
        self.rows.lock().unwrap().get(&(user_id.to_string(), provider)).cloned()
    }
}

#[async_trait]
impl ConnectionRepository for MockConnectionRepository {
    async fn upsert(&self, connection: Connection) -> DomainResult<()> {
        self.rows
            .lock()
            .unwrap()
            .insert((connection.user_id.clone(), connection.provider), connection);
        Ok(())
    }

    async fn find_for_user(&self, user_id: &str) -> DomainResult<Vec<Connection>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn find(
        &self,
        user_id: &str,
        provider: ProviderKind,
    ) -> DomainResult<Option<Connection>> {
        Ok(self.rows.lock().unwrap().get(&(user_id.to_string(), provider)).cloned())
    }

    async fn delete(&self, user_id: &str, provider: ProviderKind) -> DomainResult<bool> {
        Ok(self.rows.lock().unwrap().remove(&(user_id.to_string(), provider)).is_some())
    }
}

/// In-memory mock for `LocalEventRepository`.
///
/// Mirrors the real store's semantics: push results merge provider ids and
/// flip sync state, import upserts are keyed on (user, source,
/// source_event_id), and error messages are truncated on write.
#[derive(Default)]
pub struct MockLocalEventRepository {
    rows: Mutex<Vec<LocalEvent>>,
}

impl MockLocalEventRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seed(&self, event: LocalEvent) {
        self.rows.lock().unwrap().push(event);
    }

    pub fn snapshot(&self) -> Vec<LocalEvent> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl LocalEventRepository for MockLocalEventRepository {
    async fn insert(&self, event: LocalEvent) -> DomainResult<()> {
        self.rows.lock().unwrap().push(event);
        Ok(())
    }

    async fn find_by_id(&self, user_id: &str, event_id: &str) -> DomainResult<Option<LocalEvent>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.user_id == user_id && e.id == event_id)
            .cloned())
    }

    async fn list_local_for_user(&self, user_id: &str) -> DomainResult<Vec<LocalEvent>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.user_id == user_id && e.source == EventSource::Local)
            .cloned()
            .collect())
    }

    async fn record_push_success(
        &self,
        event_id: &str,
        provider: ProviderKind,
        remote_event_id: &str,
    ) -> DomainResult<()> {
        let mut rows = self.rows.lock().unwrap();
        let event = rows
            .iter_mut()
            .find(|e| e.id == event_id)
            .ok_or_else(|| MeetSyncError::NotFound(format!("event not found: {event_id}")))?;
        event.provider_event_ids.insert(provider, remote_event_id.to_string());
        event.sync_state = SyncState::Synced;
        event.sync_error = None;
        event.updated_at = Utc::now();
        Ok(())
    }

    async fn link_remote_event(
        &self,
        event_id: &str,
        provider: ProviderKind,
        remote_event_id: &str,
    ) -> DomainResult<()> {
        let mut rows = self.rows.lock().unwrap();
        let event = rows
            .iter_mut()
            .find(|e| e.id == event_id)
            .ok_or_else(|| MeetSyncError::NotFound(format!("event not found: {event_id}")))?;
        event.provider_event_ids.insert(provider, remote_event_id.to_string());
        event.updated_at = Utc::now();
        Ok(())
    }

    async fn record_push_failure(&self, event_id: &str, message: &str) -> DomainResult<()> {
        let mut rows = self.rows.lock().unwrap();
        let event = rows
            .iter_mut()
            .find(|e| e.id == event_id)
            .ok_or_else(|| MeetSyncError::NotFound(format!("event not found: {event_id}")))?;
        event.sync_state = SyncState::Error;
        event.sync_error = Some(message.chars().take(500).collect());
        event.updated_at = Utc::now();
        Ok(())
    }

    async fn upsert_import(&self, params: ImportedEventParams) -> DomainResult<ImportOutcome> {
        let mut rows = self.rows.lock().unwrap();
        let source = EventSource::Provider(params.provider);

        if let Some(existing) = rows.iter_mut().find(|e| {
            e.user_id == params.user_id
                && e.source == source
                && e.source_event_id.as_deref() == Some(params.provider_event_id.as_str())
        }) {
            existing.title = params.title;
            existing.description = params.description;
            existing.location = params.location;
            existing.starts_at = params.starts_at;
            existing.ends_at = params.ends_at;
            existing.updated_at = Utc::now();
            return Ok(ImportOutcome::Updated);
        }

        rows.push(LocalEvent {
            id: params.id,
            user_id: params.user_id,
            title: params.title,
            description: params.description,
            location: params.location,
            starts_at: params.starts_at,
            ends_at: params.ends_at,
            source,
            source_event_id: Some(params.provider_event_id),
            provider_event_ids: BTreeMap::new(),
            sync_state: SyncState::Synced,
            sync_error: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        });
        Ok(ImportOutcome::Created)
    }
}

/// Scriptable provider adapter.
///
/// Remote ids are derived deterministically from event titles so repeated
/// pushes are stable, the way a real provider's upsert behaves.
pub struct ScriptedProvider {
    kind: ProviderKind,
    pub fail_exchange: bool,
    pub fail_refresh: bool,
    pub fail_email: bool,
    pub fail_list: bool,
    pub fail_upsert_titles: HashSet<String>,
    /// Refresh token included in issued grants; `None` models a provider
    /// that does not reissue one.
    pub grant_refresh_token: Option<String>,
    pub account_email: String,
    pub remote_events: Vec<RemoteEventRow>,
    pub upsert_calls: Mutex<Vec<(String, Option<String>)>>,
    pub list_calls: Mutex<usize>,
    pub refresh_calls: Mutex<usize>,
    pub exchange_calls: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            fail_exchange: false,
            fail_refresh: false,
            fail_email: false,
            fail_list: false,
            fail_upsert_titles: HashSet::new(),
            grant_refresh_token: Some("granted-refresh-token".to_string()),
            account_email: format!("account@{kind}.example"),
            remote_events: Vec::new(),
            upsert_calls: Mutex::new(Vec::new()),
            list_calls: Mutex::new(0),
            refresh_calls: Mutex::new(0),
            exchange_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_remote_events(mut self, events: Vec<RemoteEventRow>) -> Self {
        self.remote_events = events;
        self
    }

    /// The deterministic remote id this mock mints for a given title.
    pub fn remote_id(kind: ProviderKind, title: &str) -> String {
        format!("{}-remote-{}", kind, title.to_lowercase().replace(' ', "-"))
    }

    pub fn remote_id_for_title(&self, title: &str) -> String {
        Self::remote_id(self.kind, title)
    }

    fn grant(&self, access_token: &str) -> TokenGrant {
        TokenGrant {
            access_token: access_token.to_string(),
            refresh_token: self.grant_refresh_token.clone(),
            expires_in_seconds: Some(3600),
            scope: None,
        }
    }
}

#[async_trait]
impl CalendarProvider for ScriptedProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn authorize_url(&self, state: &str) -> String {
        format!("https://auth.{}.example/authorize?state={state}", self.kind)
    }

    async fn exchange_code(&self, code: &str) -> DomainResult<TokenGrant> {
        self.exchange_calls.lock().unwrap().push(code.to_string());
        if self.fail_exchange {
            return Err(MeetSyncError::TokenExchange {
                provider: self.kind,
                message: "invalid_grant: simulated".to_string(),
            });
        }
        Ok(self.grant("exchanged-access-token"))
    }

    async fn refresh_access_token(&self, _refresh_token: &str) -> DomainResult<TokenGrant> {
        *self.refresh_calls.lock().unwrap() += 1;
        if self.fail_refresh {
            return Err(MeetSyncError::TokenRefresh {
                provider: self.kind,
                message: "invalid_grant: refresh token revoked".to_string(),
            });
        }
        Ok(self.grant("refreshed-access-token"))
    }

    async fn fetch_account_email(&self, _access_token: &str) -> DomainResult<String> {
        if self.fail_email {
            return Err(MeetSyncError::Network("userinfo endpoint unavailable".to_string()));
        }
        Ok(self.account_email.clone())
    }

    async fn upsert_remote_event(
        &self,
        _access_token: &str,
        _calendar_id: &str,
        event: &LocalEvent,
        existing_remote_id: Option<&str>,
    ) -> DomainResult<String> {
        self.upsert_calls
            .lock()
            .unwrap()
            .push((event.title.clone(), existing_remote_id.map(str::to_string)));

        if self.fail_upsert_titles.contains(&event.title) {
            return Err(MeetSyncError::RemoteSync {
                provider: self.kind,
                title: event.title.clone(),
                message: "simulated provider rejection".to_string(),
            });
        }

        Ok(existing_remote_id
            .map_or_else(|| self.remote_id_for_title(&event.title), str::to_string))
    }

    async fn list_remote_events(
        &self,
        _access_token: &str,
        _calendar_id: &str,
        _window_start: DateTime<Utc>,
        _window_end: DateTime<Utc>,
    ) -> DomainResult<Vec<RemoteEventRow>> {
        *self.list_calls.lock().unwrap() += 1;
        if self.fail_list {
            return Err(MeetSyncError::Network(format!(
                "{}: event listing unavailable",
                self.kind
            )));
        }
        Ok(self.remote_events.clone())
    }
}

/// Build a provider map from scripted providers, keeping handles for
/// assertions.
pub fn provider_map(providers: &[Arc<ScriptedProvider>]) -> ProviderMap {
    providers
        .iter()
        .map(|p| (p.kind(), Arc::clone(p) as Arc<dyn CalendarProvider>))
        .collect()
}

/// A valid connection with an hour of token life left.
pub fn connection(user_id: &str, provider: ProviderKind) -> Connection {
    Connection {
        user_id: user_id.to_string(),
        provider,
        provider_account_email: Some(format!("account@{provider}.example")),
        provider_calendar_id: "primary".to_string(),
        access_token: "valid-access-token".to_string(),
        refresh_token: Some("stored-refresh-token".to_string()),
        expires_at: Some(Utc::now() + Duration::hours(1)),
        updated_at: Utc::now(),
    }
}

/// A pending, never-pushed local event.
pub fn local_event(user_id: &str, id: &str, title: &str) -> LocalEvent {
    let starts_at = Utc::now() + Duration::days(1);
    LocalEvent {
        id: id.to_string(),
        user_id: user_id.to_string(),
        title: title.to_string(),
        description: Some("meet at the usual spot".to_string()),
        location: Some("Cafe Central".to_string()),
        starts_at,
        ends_at: starts_at + Duration::hours(1),
        source: EventSource::Local,
        source_event_id: None,
        provider_event_ids: BTreeMap::new(),
        sync_state: SyncState::Pending,
        sync_error: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// A normalized remote event row.
pub fn remote_row(id: &str, title: &str) -> RemoteEventRow {
    let starts_at = Utc::now() + Duration::days(2);
    RemoteEventRow {
        provider_event_id: id.to_string(),
        title: title.to_string(),
        description: None,
        location: None,
        starts_at,
        ends_at: starts_at + Duration::hours(1),
    }
}
