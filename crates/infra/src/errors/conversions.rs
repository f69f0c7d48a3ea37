//! Conversions from external infrastructure errors into domain errors.

use meetsync_domain::MeetSyncError;
use r2d2::Error as PoolError;
use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub MeetSyncError);

impl From<InfraError> for MeetSyncError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<MeetSyncError> for InfraError {
    fn from(value: MeetSyncError) -> Self {
        InfraError(value)
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        let mapped = match value {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match err.code {
                    ErrorCode::DatabaseBusy => MeetSyncError::Database("database is busy".into()),
                    ErrorCode::DatabaseLocked => {
                        MeetSyncError::Database("database is locked".into())
                    }
                    ErrorCode::ConstraintViolation => MeetSyncError::Database(format!(
                        "constraint violation (code {}): {message}",
                        err.extended_code
                    )),
                    _ => MeetSyncError::Database(format!(
                        "sqlite failure {:?} (code {}): {message}",
                        err.code, err.extended_code
                    )),
                }
            }
            RE::QueryReturnedNoRows => {
                MeetSyncError::NotFound("no rows returned by query".into())
            }
            RE::FromSqlConversionFailure(_, _, cause) => {
                MeetSyncError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                MeetSyncError::Database(format!("invalid column type: {ty}"))
            }
            other => MeetSyncError::Database(other.to_string()),
        };

        InfraError(mapped)
    }
}

impl From<PoolError> for InfraError {
    fn from(value: PoolError) -> Self {
        InfraError(MeetSyncError::Database(format!("connection pool error: {value}")))
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        let mapped = if value.is_timeout() {
            MeetSyncError::Network(format!("request timed out: {value}"))
        } else if value.is_connect() {
            MeetSyncError::Network(format!("connection failed: {value}"))
        } else if value.is_decode() {
            MeetSyncError::InvalidInput(format!("failed to decode response body: {value}"))
        } else {
            MeetSyncError::Network(value.to_string())
        };

        InfraError(mapped)
    }
}

impl From<serde_json::Error> for InfraError {
    fn from(value: serde_json::Error) -> Self {
        InfraError(MeetSyncError::Database(format!("invalid JSON column value: {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_rows_maps_to_not_found() {
        let err: InfraError = SqlError::QueryReturnedNoRows.into();
        assert!(matches!(err.0, MeetSyncError::NotFound(_)));
    }

    #[test]
    fn round_trips_domain_errors() {
        let err: InfraError = MeetSyncError::Config("bad".into()).into();
        let back: MeetSyncError = err.into();
        assert!(matches!(back, MeetSyncError::Config(_)));
    }
}
