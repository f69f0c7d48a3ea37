//! SQLite-backed implementation of the ConnectionRepository port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use meetsync_core::ConnectionRepository;
use meetsync_domain::{Connection, MeetSyncError, ProviderKind, Result};
use rusqlite::{Row, ToSql};
use tracing::{debug, instrument};

use super::manager::Database;
use crate::errors::InfraError;

/// SQLite implementation of `ConnectionRepository`.
///
/// The schema's `PRIMARY KEY (user_id, provider)` carries the uniqueness
/// invariant; writes are idempotent upserts keyed on it.
pub struct SqliteConnectionRepository {
    database: Database,
}

impl SqliteConnectionRepository {
    /// Create a new connection repository.
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<Connection> {
    let provider_str: String = row.get(1)?;
    let provider = provider_str.parse::<ProviderKind>().map_err(|err: MeetSyncError| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(err))
    })?;
    let expires_at: Option<i64> = row.get(6)?;
    let updated_at: i64 = row.get(7)?;

    Ok(Connection {
        user_id: row.get(0)?,
        provider,
        provider_account_email: row.get(2)?,
        provider_calendar_id: row.get(3)?,
        access_token: row.get(4)?,
        refresh_token: row.get(5)?,
        expires_at: expires_at.and_then(|secs| DateTime::from_timestamp(secs, 0)),
        updated_at: DateTime::from_timestamp(updated_at, 0).unwrap_or_else(Utc::now),
    })
}

const SELECT_COLUMNS: &str = "user_id, provider, provider_account_email, provider_calendar_id,
        access_token, refresh_token, expires_at, updated_at";

#[async_trait]
impl ConnectionRepository for SqliteConnectionRepository {
    #[instrument(skip(self, connection), fields(user_id = %connection.user_id, provider = %connection.provider))]
    async fn upsert(&self, connection: Connection) -> Result<()> {
        let conn = self.database.conn()?;

        conn.execute(
            "INSERT INTO calendar_connections (
                user_id, provider, provider_account_email, provider_calendar_id,
                access_token, refresh_token, expires_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(user_id, provider) DO UPDATE SET
                provider_account_email = excluded.provider_account_email,
                provider_calendar_id = excluded.provider_calendar_id,
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                expires_at = excluded.expires_at,
                updated_at = excluded.updated_at",
            [
                &connection.user_id as &dyn ToSql,
                &connection.provider.as_str(),
                &connection.provider_account_email,
                &connection.provider_calendar_id,
                &connection.access_token,
                &connection.refresh_token,
                &connection.expires_at.map(|ts| ts.timestamp()),
                &connection.updated_at.timestamp(),
            ]
            .as_ref(),
        )
        .map_err(InfraError::from)?;

        debug!("upserted calendar connection");

        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_for_user(&self, user_id: &str) -> Result<Vec<Connection>> {
        let conn = self.database.conn()?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM calendar_connections
                 WHERE user_id = ?1 ORDER BY provider ASC"
            ))
            .map_err(InfraError::from)?;

        let rows = stmt
            .query_map([&user_id], map_row)
            .map_err(InfraError::from)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(InfraError::from)?;

        Ok(rows)
    }

    #[instrument(skip(self))]
    async fn find(&self, user_id: &str, provider: ProviderKind) -> Result<Option<Connection>> {
        let conn = self.database.conn()?;

        let result = conn.query_row(
            &format!(
                "SELECT {SELECT_COLUMNS} FROM calendar_connections
                 WHERE user_id = ?1 AND provider = ?2"
            ),
            [&user_id, &provider.as_str()],
            map_row,
        );

        match result {
            Ok(connection) => Ok(Some(connection)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(err) => Err(InfraError::from(err).into()),
        }
    }

    #[instrument(skip(self))]
    async fn delete(&self, user_id: &str, provider: ProviderKind) -> Result<bool> {
        let conn = self.database.conn()?;

        let deleted = conn
            .execute(
                "DELETE FROM calendar_connections WHERE user_id = ?1 AND provider = ?2",
                [&user_id, &provider.as_str()],
            )
            .map_err(InfraError::from)?;

        debug!(deleted, "deleted calendar connection");

        Ok(deleted > 0)
    }
}
