//! SQLite-backed implementation of the LocalEventRepository port.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use meetsync_core::LocalEventRepository;
use meetsync_domain::constants::SYNC_ERROR_MAX_LEN;
use meetsync_domain::{
    EventSource, ImportOutcome, ImportedEventParams, LocalEvent, MeetSyncError, ProviderKind,
    Result, SyncState,
};
use rusqlite::{Row, ToSql};
use tracing::{debug, instrument};

use super::manager::Database;
use crate::errors::InfraError;

/// SQLite implementation of `LocalEventRepository`.
///
/// The partial unique index on (`user_id`, `source`, `source_event_id`)
/// carries the import-dedup invariant; `upsert_import` is keyed on it.
pub struct SqliteLocalEventRepository {
    database: Database,
}

impl SqliteLocalEventRepository {
    /// Create a new local event repository.
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

const SELECT_COLUMNS: &str = "id, user_id, title, description, location, starts_at, ends_at,
        source, source_event_id, provider_event_ids, sync_state, sync_error,
        created_at, updated_at";

fn conversion_error(index: usize, err: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(err))
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<LocalEvent> {
    let source_str: String = row.get(7)?;
    let source =
        source_str.parse::<EventSource>().map_err(|err| conversion_error(7, err))?;

    let provider_ids_json: String = row.get(9)?;
    let provider_event_ids: BTreeMap<ProviderKind, String> =
        serde_json::from_str(&provider_ids_json).map_err(|err| conversion_error(9, err))?;

    let sync_state_str: String = row.get(10)?;
    let sync_state =
        sync_state_str.parse::<SyncState>().map_err(|err| conversion_error(10, err))?;

    let starts_at: i64 = row.get(5)?;
    let ends_at: i64 = row.get(6)?;
    let created_at: i64 = row.get(12)?;
    let updated_at: i64 = row.get(13)?;

    Ok(LocalEvent {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        location: row.get(4)?,
        starts_at: DateTime::from_timestamp(starts_at, 0).unwrap_or_else(Utc::now),
        ends_at: DateTime::from_timestamp(ends_at, 0).unwrap_or_else(Utc::now),
        source,
        source_event_id: row.get(8)?,
        provider_event_ids,
        sync_state,
        sync_error: row.get(11)?,
        created_at: DateTime::from_timestamp(created_at, 0).unwrap_or_else(Utc::now),
        updated_at: DateTime::from_timestamp(updated_at, 0).unwrap_or_else(Utc::now),
    })
}

fn truncate_error(message: &str) -> String {
    message.chars().take(SYNC_ERROR_MAX_LEN).collect()
}

#[async_trait]
impl LocalEventRepository for SqliteLocalEventRepository {
    #[instrument(skip(self, event), fields(event_id = %event.id, user_id = %event.user_id))]
    async fn insert(&self, event: LocalEvent) -> Result<()> {
        let conn = self.database.conn()?;

        let provider_ids =
            serde_json::to_string(&event.provider_event_ids).map_err(InfraError::from)?;

        conn.execute(
            "INSERT INTO local_events (
                id, user_id, title, description, location, starts_at, ends_at,
                source, source_event_id, provider_event_ids, sync_state, sync_error,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            [
                &event.id as &dyn ToSql,
                &event.user_id,
                &event.title,
                &event.description,
                &event.location,
                &event.starts_at.timestamp(),
                &event.ends_at.timestamp(),
                &event.source.as_str(),
                &event.source_event_id,
                &provider_ids,
                &event.sync_state.as_str(),
                &event.sync_error.as_deref().map(truncate_error),
                &event.created_at.timestamp(),
                &event.updated_at.timestamp(),
            ]
            .as_ref(),
        )
        .map_err(InfraError::from)?;

        debug!("inserted local event");

        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, user_id: &str, event_id: &str) -> Result<Option<LocalEvent>> {
        let conn = self.database.conn()?;

        let result = conn.query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM local_events WHERE user_id = ?1 AND id = ?2"),
            [&user_id, &event_id],
            map_row,
        );

        match result {
            Ok(event) => Ok(Some(event)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(err) => Err(InfraError::from(err).into()),
        }
    }

    #[instrument(skip(self))]
    async fn list_local_for_user(&self, user_id: &str) -> Result<Vec<LocalEvent>> {
        let conn = self.database.conn()?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM local_events
                 WHERE user_id = ?1 AND source = 'local'
                 ORDER BY starts_at ASC"
            ))
            .map_err(InfraError::from)?;

        let rows = stmt
            .query_map([&user_id], map_row)
            .map_err(InfraError::from)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(InfraError::from)?;

        debug!(count = rows.len(), "listed local events");

        Ok(rows)
    }

    #[instrument(skip(self))]
    async fn record_push_success(
        &self,
        event_id: &str,
        provider: ProviderKind,
        remote_event_id: &str,
    ) -> Result<()> {
        let conn = self.database.conn()?;

        // Read-modify-write on the provider id map. Concurrent syncs for the
        // same user race here; last write wins.
        let provider_ids_json: String = conn
            .query_row(
                "SELECT provider_event_ids FROM local_events WHERE id = ?1",
                [&event_id],
                |row| row.get(0),
            )
            .map_err(|err| match err {
                rusqlite::Error::QueryReturnedNoRows => {
                    MeetSyncError::NotFound(format!("event not found: {event_id}"))
                }
                other => InfraError::from(other).into(),
            })?;

        let mut provider_event_ids: BTreeMap<ProviderKind, String> =
            serde_json::from_str(&provider_ids_json).map_err(InfraError::from)?;
        provider_event_ids.insert(provider, remote_event_id.to_string());
        let updated_json =
            serde_json::to_string(&provider_event_ids).map_err(InfraError::from)?;

        conn.execute(
            "UPDATE local_events
             SET provider_event_ids = ?1, sync_state = 'synced', sync_error = NULL,
                 updated_at = ?2
             WHERE id = ?3",
            [&updated_json as &dyn ToSql, &Utc::now().timestamp(), &event_id].as_ref(),
        )
        .map_err(InfraError::from)?;

        debug!(remote_event_id, "recorded push success");

        Ok(())
    }

    #[instrument(skip(self))]
    async fn link_remote_event(
        &self,
        event_id: &str,
        provider: ProviderKind,
        remote_event_id: &str,
    ) -> Result<()> {
        let conn = self.database.conn()?;

        let provider_ids_json: String = conn
            .query_row(
                "SELECT provider_event_ids FROM local_events WHERE id = ?1",
                [&event_id],
                |row| row.get(0),
            )
            .map_err(|err| match err {
                rusqlite::Error::QueryReturnedNoRows => {
                    MeetSyncError::NotFound(format!("event not found: {event_id}"))
                }
                other => InfraError::from(other).into(),
            })?;

        let mut provider_event_ids: BTreeMap<ProviderKind, String> =
            serde_json::from_str(&provider_ids_json).map_err(InfraError::from)?;
        provider_event_ids.insert(provider, remote_event_id.to_string());
        let updated_json =
            serde_json::to_string(&provider_event_ids).map_err(InfraError::from)?;

        conn.execute(
            "UPDATE local_events SET provider_event_ids = ?1, updated_at = ?2 WHERE id = ?3",
            [&updated_json as &dyn ToSql, &Utc::now().timestamp(), &event_id].as_ref(),
        )
        .map_err(InfraError::from)?;

        debug!(remote_event_id, "linked remote event without state change");

        Ok(())
    }

    #[instrument(skip(self, message))]
    async fn record_push_failure(&self, event_id: &str, message: &str) -> Result<()> {
        let conn = self.database.conn()?;

        let changed = conn
            .execute(
                "UPDATE local_events
                 SET sync_state = 'error', sync_error = ?1, updated_at = ?2
                 WHERE id = ?3",
                [&truncate_error(message) as &dyn ToSql, &Utc::now().timestamp(), &event_id]
                    .as_ref(),
            )
            .map_err(InfraError::from)?;

        if changed == 0 {
            return Err(MeetSyncError::NotFound(format!("event not found: {event_id}")));
        }

        debug!("recorded push failure");

        Ok(())
    }

    #[instrument(skip(self, params), fields(user_id = %params.user_id, provider = %params.provider))]
    async fn upsert_import(&self, params: ImportedEventParams) -> Result<ImportOutcome> {
        let conn = self.database.conn()?;
        let source = EventSource::Provider(params.provider);
        let now = Utc::now().timestamp();

        let existing: Option<String> = match conn.query_row(
            "SELECT id FROM local_events
             WHERE user_id = ?1 AND source = ?2 AND source_event_id = ?3",
            [
                &params.user_id as &dyn ToSql,
                &source.as_str(),
                &params.provider_event_id,
            ]
            .as_ref(),
            |row| row.get(0),
        ) {
            Ok(id) => Some(id),
            Err(rusqlite::Error::QueryReturnedNoRows) => None,
            Err(err) => return Err(InfraError::from(err).into()),
        };

        match existing {
            Some(id) => {
                conn.execute(
                    "UPDATE local_events
                     SET title = ?1, description = ?2, location = ?3,
                         starts_at = ?4, ends_at = ?5, updated_at = ?6
                     WHERE id = ?7",
                    [
                        &params.title as &dyn ToSql,
                        &params.description,
                        &params.location,
                        &params.starts_at.timestamp(),
                        &params.ends_at.timestamp(),
                        &now,
                        &id,
                    ]
                    .as_ref(),
                )
                .map_err(InfraError::from)?;

                debug!(event_id = %id, "updated imported event");
                Ok(ImportOutcome::Updated)
            }
            None => {
                conn.execute(
                    "INSERT INTO local_events (
                        id, user_id, title, description, location, starts_at, ends_at,
                        source, source_event_id, provider_event_ids, sync_state,
                        sync_error, created_at, updated_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, '{}', 'synced', NULL, ?10, ?10)",
                    [
                        &params.id as &dyn ToSql,
                        &params.user_id,
                        &params.title,
                        &params.description,
                        &params.location,
                        &params.starts_at.timestamp(),
                        &params.ends_at.timestamp(),
                        &source.as_str(),
                        &params.provider_event_id,
                        &now,
                    ]
                    .as_ref(),
                )
                .map_err(InfraError::from)?;

                debug!(event_id = %params.id, "created imported event");
                Ok(ImportOutcome::Created)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use tempfile::TempDir;
    use uuid::Uuid;

    use super::*;
    use meetsync_domain::DatabaseConfig;

    fn setup() -> (SqliteLocalEventRepository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = DatabaseConfig {
            path: temp_dir.path().join("test.db").to_string_lossy().to_string(),
            pool_size: 2,
        };
        let database = Database::open(&config).unwrap();
        (SqliteLocalEventRepository::new(database), temp_dir)
    }

    fn local_event(user_id: &str, title: &str) -> LocalEvent {
        let starts_at = Utc::now() + Duration::days(1);
        LocalEvent {
            id: Uuid::now_v7().to_string(),
            user_id: user_id.to_string(),
            title: title.to_string(),
            description: Some("description".to_string()),
            location: None,
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

    fn import_params(user_id: &str, remote_id: &str, title: &str) -> ImportedEventParams {
        let starts_at = Utc::now() + Duration::days(2);
        ImportedEventParams {
            id: Uuid::now_v7().to_string(),
            user_id: user_id.to_string(),
            provider: ProviderKind::Google,
            provider_event_id: remote_id.to_string(),
            title: title.to_string(),
            description: None,
            location: None,
            starts_at,
            ends_at: starts_at + Duration::hours(1),
        }
    }

    #[tokio::test]
    async fn insert_then_find_round_trips() {
        let (repo, _temp) = setup();

        let event = local_event("user-1", "Coffee Meetup");
        let id = event.id.clone();
        repo.insert(event).await.unwrap();

        let found = repo.find_by_id("user-1", &id).await.unwrap().unwrap();
        assert_eq!(found.title, "Coffee Meetup");
        assert_eq!(found.source, EventSource::Local);
        assert_eq!(found.sync_state, SyncState::Pending);
        assert!(found.provider_event_ids.is_empty());

        // Scoped to the owning user.
        assert!(repo.find_by_id("user-2", &id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_local_excludes_imported_rows() {
        let (repo, _temp) = setup();

        repo.insert(local_event("user-1", "Mine")).await.unwrap();
        repo.upsert_import(import_params("user-1", "g-1", "Imported")).await.unwrap();

        let local = repo.list_local_for_user("user-1").await.unwrap();
        assert_eq!(local.len(), 1);
        assert_eq!(local[0].title, "Mine");
    }

    #[tokio::test]
    async fn push_success_merges_provider_ids_and_clears_error() {
        let (repo, _temp) = setup();

        let mut event = local_event("user-1", "Coffee Meetup");
        event.sync_state = SyncState::Error;
        event.sync_error = Some("previous failure".to_string());
        let id = event.id.clone();
        repo.insert(event).await.unwrap();

        repo.record_push_success(&id, ProviderKind::Google, "g-remote-1").await.unwrap();
        repo.record_push_success(&id, ProviderKind::Outlook, "o-remote-1").await.unwrap();

        let found = repo.find_by_id("user-1", &id).await.unwrap().unwrap();
        assert_eq!(found.sync_state, SyncState::Synced);
        assert!(found.sync_error.is_none());
        assert_eq!(
            found.provider_event_ids.get(&ProviderKind::Google).map(String::as_str),
            Some("g-remote-1")
        );
        assert_eq!(
            found.provider_event_ids.get(&ProviderKind::Outlook).map(String::as_str),
            Some("o-remote-1")
        );
    }

    #[tokio::test]
    async fn link_merges_id_without_touching_state() {
        let (repo, _temp) = setup();

        let event = local_event("user-1", "Coffee Meetup");
        let id = event.id.clone();
        repo.insert(event).await.unwrap();

        repo.record_push_failure(&id, "google rejected it").await.unwrap();
        repo.link_remote_event(&id, ProviderKind::Outlook, "o-remote-1").await.unwrap();

        let found = repo.find_by_id("user-1", &id).await.unwrap().unwrap();
        assert_eq!(found.sync_state, SyncState::Error, "error state survives the link");
        assert_eq!(found.sync_error.as_deref(), Some("google rejected it"));
        assert_eq!(
            found.provider_event_ids.get(&ProviderKind::Outlook).map(String::as_str),
            Some("o-remote-1")
        );
    }

    #[tokio::test]
    async fn push_failure_truncates_long_messages() {
        let (repo, _temp) = setup();

        let event = local_event("user-1", "Coffee Meetup");
        let id = event.id.clone();
        repo.insert(event).await.unwrap();

        let long_message = "x".repeat(SYNC_ERROR_MAX_LEN + 200);
        repo.record_push_failure(&id, &long_message).await.unwrap();

        let found = repo.find_by_id("user-1", &id).await.unwrap().unwrap();
        assert_eq!(found.sync_state, SyncState::Error);
        assert_eq!(found.sync_error.map(|m| m.len()), Some(SYNC_ERROR_MAX_LEN));
    }

    #[tokio::test]
    async fn push_result_writes_require_an_existing_row() {
        let (repo, _temp) = setup();

        let success =
            repo.record_push_success("missing", ProviderKind::Google, "g-remote-1").await;
        assert!(matches!(success, Err(MeetSyncError::NotFound(_))));

        let failure = repo.record_push_failure("missing", "boom").await;
        assert!(matches!(failure, Err(MeetSyncError::NotFound(_))));
    }

    #[tokio::test]
    async fn import_upsert_creates_then_updates() {
        let (repo, _temp) = setup();

        let outcome =
            repo.upsert_import(import_params("user-1", "g-1", "Original")).await.unwrap();
        assert_eq!(outcome, ImportOutcome::Created);

        let outcome =
            repo.upsert_import(import_params("user-1", "g-1", "Renamed")).await.unwrap();
        assert_eq!(outcome, ImportOutcome::Updated);

        // Imported rows never show up as local candidates.
        assert!(repo.list_local_for_user("user-1").await.unwrap().is_empty());

        // One row, updated in place, keyed on (user, source, source_event_id).
        let conn = repo.database.conn().unwrap();
        let (count, title): (i64, String) = conn
            .query_row(
                "SELECT count(*), max(title) FROM local_events
                 WHERE user_id = 'user-1' AND source = 'google' AND source_event_id = 'g-1'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(title, "Renamed");
    }

    #[tokio::test]
    async fn same_remote_id_from_different_providers_coexists() {
        let (repo, _temp) = setup();

        repo.upsert_import(import_params("user-1", "shared-id", "From Google")).await.unwrap();

        let mut outlook = import_params("user-1", "shared-id", "From Outlook");
        outlook.provider = ProviderKind::Outlook;
        let outcome = repo.upsert_import(outlook).await.unwrap();

        assert_eq!(outcome, ImportOutcome::Created, "dedup key includes the source");
    }
}
