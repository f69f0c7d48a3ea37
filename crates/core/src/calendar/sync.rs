//! Calendar sync engine
//!
//! For one user: ensures usable tokens, pushes local events outward
//! (create-or-update keyed by the stored remote id), optionally pulls remote
//! events inward (deduplicated by remote id), and records per-event state.
//!
//! Failures are absorbed into the structured summary. One provider's failure
//! never blocks another's; one event's failure never aborts the batch.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{Duration, Utc};
use meetsync_domain::constants::{
    PULL_WINDOW_FUTURE_DAYS, PULL_WINDOW_PAST_DAYS, TOKEN_REFRESH_MARGIN_SECS,
};
use meetsync_domain::{
    Connection, EventSource, ImportOutcome, ImportedEventParams, LocalEvent, MeetSyncError,
    ProviderKind, Result, SyncState, SyncSummary,
};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::ports::{CalendarProvider, ConnectionRepository, LocalEventRepository, ProviderMap};

/// Running totals for one sync run.
#[derive(Default)]
struct RunTally {
    pushed: usize,
    imported: usize,
    skipped: usize,
    errors: Vec<String>,
    /// Events that failed at some provider in this run. A later success at
    /// another provider must not clear their recorded error.
    failed_events: HashSet<String>,
}

/// Orchestrates one on-demand sync run per user.
pub struct SyncEngine {
    connections: Arc<dyn ConnectionRepository>,
    events: Arc<dyn LocalEventRepository>,
    providers: ProviderMap,
}

impl SyncEngine {
    /// Create a new sync engine.
    pub fn new(
        connections: Arc<dyn ConnectionRepository>,
        events: Arc<dyn LocalEventRepository>,
        providers: ProviderMap,
    ) -> Self {
        Self { connections, events, providers }
    }

    /// Synchronize one user's events with every connected provider.
    ///
    /// With `event_id` present the run is scoped to pushing that one local
    /// event and the inbound pull is skipped entirely. A user with no
    /// connections gets a zero-result summary, not an error; a scoped run
    /// naming an unknown event fails with `NotFound`.
    #[instrument(skip(self), fields(user_id, event_id))]
    pub async fn sync_user(&self, user_id: &str, event_id: Option<&str>) -> Result<SyncSummary> {
        info!(user_id, scoped = event_id.is_some(), "starting calendar sync");

        let connections = self.connections.find_for_user(user_id).await?;
        if connections.is_empty() {
            debug!(user_id, "no calendar connections; nothing to sync");
            return Ok(SyncSummary::empty());
        }

        let mut candidates = self.load_candidates(user_id, event_id).await?;

        // Remote ids already linked from local events, per provider. Anything
        // in here is a mirror of a local event, not an import candidate.
        let mut linked_ids: BTreeMap<ProviderKind, HashSet<String>> = BTreeMap::new();
        for event in &candidates {
            for (provider, remote_id) in &event.provider_event_ids {
                linked_ids.entry(*provider).or_default().insert(remote_id.clone());
            }
        }

        let mut tally = RunTally::default();

        // Sequential on purpose: refresh-then-use stays atomic per provider
        // and error attribution stays simple.
        for connection in connections {
            self.sync_connection(
                connection,
                &mut candidates,
                &mut linked_ids,
                event_id.is_some(),
                &mut tally,
            )
            .await;
        }

        let summary = SyncSummary {
            pushed: tally.pushed,
            imported: tally.imported,
            skipped: tally.skipped,
            errors: tally.errors,
            synced_at: Utc::now(),
        };

        info!(
            user_id,
            pushed = summary.pushed,
            imported = summary.imported,
            skipped = summary.skipped,
            error_count = summary.errors.len(),
            "calendar sync completed"
        );

        Ok(summary)
    }

    /// Load the local events this run will push.
    async fn load_candidates(
        &self,
        user_id: &str,
        event_id: Option<&str>,
    ) -> Result<Vec<LocalEvent>> {
        match event_id {
            Some(id) => {
                let event = self
                    .events
                    .find_by_id(user_id, id)
                    .await?
                    .filter(|event| event.source == EventSource::Local)
                    .ok_or_else(|| MeetSyncError::NotFound(format!("event not found: {id}")))?;
                Ok(vec![event])
            }
            None => self.events.list_local_for_user(user_id).await,
        }
    }

    /// Run the push and (unless scoped) pull phases for one connection.
    ///
    /// Failures land in the tally; this never propagates an error, so a bad
    /// provider cannot abort the remaining ones.
    async fn sync_connection(
        &self,
        connection: Connection,
        candidates: &mut [LocalEvent],
        linked_ids: &mut BTreeMap<ProviderKind, HashSet<String>>,
        scoped: bool,
        tally: &mut RunTally,
    ) {
        let kind = connection.provider;

        let Some(provider) = self.providers.get(&kind).map(Arc::clone) else {
            tally.errors.push(format!("{kind}: no provider adapter configured"));
            return;
        };

        let connection = match self.ensure_access_token(connection, provider.as_ref()).await {
            Ok(connection) => connection,
            Err(err) => {
                warn!(provider = %kind, error = %err, "connection unusable; skipping provider");
                tally.errors.push(err.to_string());
                return;
            }
        };

        self.push_events(&connection, provider.as_ref(), candidates, linked_ids, tally).await;

        if scoped {
            debug!(provider = %kind, "scoped sync; skipping pull phase");
            return;
        }

        self.pull_events(&connection, provider.as_ref(), linked_ids, tally).await;
    }

    /// Ensure the connection's access token is usable for the whole phase.
    ///
    /// Refreshes when expiry is within the margin. An expired token with no
    /// refresh token fails loudly for this provider only.
    async fn ensure_access_token(
        &self,
        mut connection: Connection,
        provider: &dyn CalendarProvider,
    ) -> Result<Connection> {
        if !connection.expires_within(TOKEN_REFRESH_MARGIN_SECS) {
            return Ok(connection);
        }

        let kind = connection.provider;
        let Some(refresh_token) = connection.refresh_token.clone() else {
            return Err(MeetSyncError::TokenRefresh {
                provider: kind,
                message: "access token expired and no refresh token is stored".to_string(),
            });
        };

        debug!(provider = %kind, "access token expiring; refreshing");
        let grant = provider.refresh_access_token(&refresh_token).await?;

        connection.access_token = grant.access_token;
        // Keep the prior refresh token unless the provider reissued one.
        if let Some(reissued) = grant.refresh_token {
            connection.refresh_token = Some(reissued);
        }
        connection.expires_at =
            grant.expires_in_seconds.map(|secs| Utc::now() + Duration::seconds(secs));
        connection.updated_at = Utc::now();

        // The refreshed token is usable even if persisting it fails; the next
        // run would simply refresh again.
        if let Err(err) = self.connections.upsert(connection.clone()).await {
            warn!(provider = %kind, error = %err, "failed to persist refreshed token");
        }

        Ok(connection)
    }

    /// Push phase: create-or-update every candidate at this provider.
    async fn push_events(
        &self,
        connection: &Connection,
        provider: &dyn CalendarProvider,
        candidates: &mut [LocalEvent],
        linked_ids: &mut BTreeMap<ProviderKind, HashSet<String>>,
        tally: &mut RunTally,
    ) {
        let kind = connection.provider;

        for event in candidates.iter_mut() {
            let existing_remote_id = event.remote_id_for(kind).map(str::to_string);

            let outcome = provider
                .upsert_remote_event(
                    &connection.access_token,
                    &connection.provider_calendar_id,
                    event,
                    existing_remote_id.as_deref(),
                )
                .await;

            match outcome {
                Ok(remote_id) => {
                    let record = if tally.failed_events.contains(&event.id) {
                        // Keep the earlier failure visible; only link the id.
                        self.events.link_remote_event(&event.id, kind, &remote_id).await
                    } else {
                        event.sync_state = SyncState::Synced;
                        event.sync_error = None;
                        self.events.record_push_success(&event.id, kind, &remote_id).await
                    };
                    if let Err(err) = record {
                        warn!(event_id = %event.id, error = %err, "failed to record push result");
                    }
                    event.provider_event_ids.insert(kind, remote_id.clone());
                    linked_ids.entry(kind).or_default().insert(remote_id);
                    tally.pushed += 1;
                }
                Err(err) => {
                    let message = err.to_string();
                    warn!(event_id = %event.id, provider = %kind, error = %message, "event push failed");
                    if let Err(record_err) =
                        self.events.record_push_failure(&event.id, &message).await
                    {
                        warn!(event_id = %event.id, error = %record_err, "failed to record push error");
                    }
                    event.sync_state = SyncState::Error;
                    tally.failed_events.insert(event.id.clone());
                    tally.errors.push(message);
                }
            }
        }
    }

    /// Pull phase: import unlinked remote events from the window.
    async fn pull_events(
        &self,
        connection: &Connection,
        provider: &dyn CalendarProvider,
        linked_ids: &BTreeMap<ProviderKind, HashSet<String>>,
        tally: &mut RunTally,
    ) {
        let kind = connection.provider;
        let window_start = Utc::now() - Duration::days(PULL_WINDOW_PAST_DAYS);
        let window_end = Utc::now() + Duration::days(PULL_WINDOW_FUTURE_DAYS);

        let rows = match provider
            .list_remote_events(
                &connection.access_token,
                &connection.provider_calendar_id,
                window_start,
                window_end,
            )
            .await
        {
            Ok(rows) => rows,
            Err(err) => {
                warn!(provider = %kind, error = %err, "remote event listing failed");
                tally.errors.push(err.to_string());
                return;
            }
        };

        debug!(provider = %kind, count = rows.len(), "listed remote events");

        for row in rows {
            if linked_ids.get(&kind).is_some_and(|ids| ids.contains(&row.provider_event_id)) {
                // A known mirror of a local event, not a new import.
                tally.skipped += 1;
                continue;
            }

            let params = ImportedEventParams {
                id: Uuid::now_v7().to_string(),
                user_id: connection.user_id.clone(),
                provider: kind,
                provider_event_id: row.provider_event_id,
                title: row.title,
                description: row.description,
                location: row.location,
                starts_at: row.starts_at,
                ends_at: row.ends_at,
            };

            match self.events.upsert_import(params).await {
                Ok(ImportOutcome::Created) => tally.imported += 1,
                // Already imported on an earlier run; refreshed in place.
                Ok(ImportOutcome::Updated) => tally.skipped += 1,
                Err(err) => {
                    warn!(provider = %kind, error = %err, "failed to store imported event");
                    tally.errors.push(format!("{kind}: failed to store imported event: {err}"));
                }
            }
        }
    }
}
