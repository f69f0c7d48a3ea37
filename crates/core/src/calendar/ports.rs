//! Calendar port interfaces
//!
//! Traits implemented by the infrastructure layer: persistence for
//! connections and events, the uniform provider contract, and the
//! authenticated-user resolver seam.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use meetsync_domain::{
    Connection, ImportOutcome, ImportedEventParams, LocalEvent, ProviderKind, RemoteEventRow,
    Result, TokenGrant,
};

/// Provider adapters keyed by kind.
///
/// Selection is a lookup, never a branch; the sync engine and flow controller
/// stay provider-agnostic.
pub type ProviderMap = BTreeMap<ProviderKind, Arc<dyn CalendarProvider>>;

/// Persistence for per-user, per-provider OAuth credential records.
///
/// The backing store enforces uniqueness on (`user_id`, `provider`); all
/// writes are idempotent upserts keyed on that constraint.
#[async_trait]
pub trait ConnectionRepository: Send + Sync {
    /// Insert or update the connection for its (user, provider) pair.
    async fn upsert(&self, connection: Connection) -> Result<()>;

    /// All connections stored for a user, in stable provider order.
    async fn find_for_user(&self, user_id: &str) -> Result<Vec<Connection>>;

    /// The connection for one (user, provider) pair, when present.
    async fn find(&self, user_id: &str, provider: ProviderKind) -> Result<Option<Connection>>;

    /// Remove a connection. Returns whether a row existed.
    async fn delete(&self, user_id: &str, provider: ProviderKind) -> Result<bool>;
}

/// Persistence for local event records.
///
/// The backing store enforces uniqueness on (`user_id`, `source`,
/// `source_event_id`) so repeated imports update rather than duplicate.
#[async_trait]
pub trait LocalEventRepository: Send + Sync {
    /// Insert a user-authored event.
    async fn insert(&self, event: LocalEvent) -> Result<()>;

    /// Look up one of the user's events by id.
    async fn find_by_id(&self, user_id: &str, event_id: &str) -> Result<Option<LocalEvent>>;

    /// All user-authored (`source = local`) events for a user.
    async fn list_local_for_user(&self, user_id: &str) -> Result<Vec<LocalEvent>>;

    /// Record a successful push: merge the remote id into
    /// `provider_event_ids`, mark the event synced, and clear any error.
    async fn record_push_success(
        &self,
        event_id: &str,
        provider: ProviderKind,
        remote_event_id: &str,
    ) -> Result<()>;

    /// Merge a remote id into `provider_event_ids` without touching the sync
    /// state. Used when another provider already failed the event in the
    /// same run, so the recorded error must survive.
    async fn link_remote_event(
        &self,
        event_id: &str,
        provider: ProviderKind,
        remote_event_id: &str,
    ) -> Result<()>;

    /// Record a failed push: mark the event errored with the given message
    /// (truncated on write).
    async fn record_push_failure(&self, event_id: &str, message: &str) -> Result<()>;

    /// Upsert an imported remote event keyed on (`user_id`, `source`,
    /// `source_event_id`), reporting whether a row was created or updated.
    async fn upsert_import(&self, params: ImportedEventParams) -> Result<ImportOutcome>;
}

/// Uniform contract over one concrete calendar provider.
///
/// Implementations normalize request/response shapes so callers never see
/// provider-specific payloads.
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Which provider this adapter talks to.
    fn kind(&self) -> ProviderKind;

    /// The provider's authorization URL with client id, redirect URI, scopes,
    /// and the opaque state string embedded.
    fn authorize_url(&self, state: &str) -> String;

    /// Exchange an authorization code for tokens.
    ///
    /// Fails with `TokenExchange`, carrying the provider's raw error
    /// description, on any non-success response.
    async fn exchange_code(&self, code: &str) -> Result<TokenGrant>;

    /// Obtain a fresh access token from a refresh token.
    ///
    /// Providers may not reissue a refresh token; callers fall back to the
    /// one they already hold.
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenGrant>;

    /// Fetch the authenticated account's identifying email.
    ///
    /// Callers use this as a best-effort label and collapse the error case to
    /// `None` at their boundary.
    async fn fetch_account_email(&self, access_token: &str) -> Result<String>;

    /// Create or update one remote event.
    ///
    /// Creates when `existing_remote_id` is absent, else updates in place.
    /// Returns the remote event id.
    async fn upsert_remote_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event: &LocalEvent,
        existing_remote_id: Option<&str>,
    ) -> Result<String>;

    /// List single-instance remote events inside the window.
    ///
    /// Rows missing an id, start, or end are dropped rather than erroring.
    async fn list_remote_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<RemoteEventRow>>;
}

/// Maps a bearer credential to a user id.
///
/// Authentication is owned by an external collaborator; this is only the seam
/// the HTTP layer consumes.
#[async_trait]
pub trait UserResolver: Send + Sync {
    /// Resolve a bearer token to a user id, `None` when unrecognized.
    async fn resolve(&self, bearer_token: &str) -> Result<Option<String>>;
}
