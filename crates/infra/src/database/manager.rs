//! Pooled SQLite database handle with schema bootstrap.

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use meetsync_domain::{DatabaseConfig, Result};
use tracing::info;

use crate::errors::InfraError;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS calendar_connections (
    user_id TEXT NOT NULL,
    provider TEXT NOT NULL,
    provider_account_email TEXT,
    provider_calendar_id TEXT NOT NULL DEFAULT 'primary',
    access_token TEXT NOT NULL,
    refresh_token TEXT,
    expires_at INTEGER,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (user_id, provider)
);

CREATE TABLE IF NOT EXISTS local_events (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT,
    location TEXT,
    starts_at INTEGER NOT NULL,
    ends_at INTEGER NOT NULL,
    source TEXT NOT NULL DEFAULT 'local',
    source_event_id TEXT,
    provider_event_ids TEXT NOT NULL DEFAULT '{}',
    sync_state TEXT NOT NULL DEFAULT 'pending',
    sync_error TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_local_events_import_key
    ON local_events(user_id, source, source_event_id)
    WHERE source_event_id IS NOT NULL;

CREATE INDEX IF NOT EXISTS idx_local_events_user_source
    ON local_events(user_id, source);
";

/// Pooled SQLite handle shared by the repositories.
#[derive(Clone)]
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
}

impl Database {
    /// Open (or create) the database at the configured path and apply the
    /// schema.
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        let manager = SqliteConnectionManager::file(&config.path).with_init(|conn| {
            conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")
        });

        let pool = Pool::builder()
            .max_size(config.pool_size)
            .build(manager)
            .map_err(InfraError::from)?;

        let database = Self { pool };
        database.conn()?.execute_batch(SCHEMA).map_err(InfraError::from)?;

        info!(path = %config.path, pool_size = config.pool_size, "database ready");

        Ok(database)
    }

    /// Borrow a pooled connection.
    pub fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|err| InfraError::from(err).into())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn open_applies_schema_idempotently() {
        let temp_dir = TempDir::new().unwrap();
        let config = DatabaseConfig {
            path: temp_dir.path().join("test.db").to_string_lossy().to_string(),
            pool_size: 2,
        };

        let first = Database::open(&config).unwrap();
        drop(first);
        // Re-opening against the same file must not fail on existing tables.
        let database = Database::open(&config).unwrap();

        let conn = database.conn().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('calendar_connections', 'local_events')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 2);
    }
}
