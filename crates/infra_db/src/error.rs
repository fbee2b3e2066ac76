//! Database error types
//!
//! SQLx failures are classified by PostgreSQL SQLSTATE before they leave the
//! crate, and every [`DatabaseError`] maps onto a [`PortError`] so services
//! never see driver types.

use core_kernel::PortError;
use thiserror::Error;

/// Errors that can occur during database operations
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to establish a database connection
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Entity not found in database
    #[error("{entity} with id '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    /// Unique constraint violation, typically a natural-key clash
    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    /// The stored lock version moved underneath the writer
    #[error("{entity} {id} was modified concurrently")]
    VersionConflict { entity: &'static str, id: String },

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Serialization failure or deadlock detected by PostgreSQL
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Migration error
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// A stored document could not be mapped to or from its domain type
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Pool exhaustion - no available connections
    #[error("Connection pool exhausted")]
    PoolExhausted,
}

impl DatabaseError {
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        DatabaseError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn version_conflict(entity: &'static str, id: impl std::fmt::Display) -> Self {
        DatabaseError::VersionConflict {
            entity,
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DatabaseError::NotFound { .. })
    }

    /// Errors a caller may resolve by reloading and retrying
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            DatabaseError::DuplicateEntry(_)
                | DatabaseError::VersionConflict { .. }
                | DatabaseError::TransactionFailed(_)
        )
    }

    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            DatabaseError::ConnectionFailed(_) | DatabaseError::PoolExhausted
        )
    }
}

/// Maps SQLx errors by PostgreSQL error code
///
/// <https://www.postgresql.org/docs/current/errcodes-appendix.html>
impl From<sqlx::Error> for DatabaseError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::RowNotFound => DatabaseError::QueryFailed("expected row not returned".to_string()),
            sqlx::Error::PoolTimedOut => DatabaseError::PoolExhausted,
            sqlx::Error::Io(e) => DatabaseError::ConnectionFailed(e.to_string()),
            sqlx::Error::Tls(e) => DatabaseError::ConnectionFailed(e.to_string()),
            sqlx::Error::PoolClosed => DatabaseError::ConnectionFailed("pool closed".to_string()),
            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                match db_err.code().as_deref() {
                    Some("23505") => DatabaseError::DuplicateEntry(message),
                    Some("23503") => DatabaseError::ForeignKeyViolation(message),
                    Some("23514") => DatabaseError::ConstraintViolation(message),
                    Some("40001") | Some("40P01") => DatabaseError::TransactionFailed(message),
                    _ => DatabaseError::QueryFailed(message),
                }
            }
            _ => DatabaseError::QueryFailed(error.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DatabaseError {
    fn from(error: sqlx::migrate::MigrateError) -> Self {
        DatabaseError::MigrationFailed(error.to_string())
    }
}

impl From<serde_json::Error> for DatabaseError {
    fn from(error: serde_json::Error) -> Self {
        DatabaseError::SerializationError(error.to_string())
    }
}

impl From<DatabaseError> for PortError {
    fn from(error: DatabaseError) -> Self {
        match error {
            DatabaseError::NotFound { entity, id } => PortError::not_found(entity, id),
            DatabaseError::DuplicateEntry(_)
            | DatabaseError::VersionConflict { .. }
            | DatabaseError::TransactionFailed(_) => PortError::conflict(error.to_string()),
            DatabaseError::ConnectionFailed(_) | DatabaseError::PoolExhausted => {
                PortError::connection(error.to_string())
            }
            DatabaseError::SerializationError(_) => PortError::transformation(error.to_string()),
            _ => PortError::internal(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_conflict_maps_to_port_conflict() {
        let port: PortError = DatabaseError::version_conflict("Booking", "BKG-2503-0001").into();
        assert!(port.is_conflict());
        assert!(port.to_string().contains("BKG-2503-0001"));
    }

    #[test]
    fn test_duplicate_entry_is_conflict() {
        let error = DatabaseError::DuplicateEntry("invoices_tenant_id_invoice_number_key".to_string());
        assert!(error.is_conflict());
        let port: PortError = error.into();
        assert!(port.is_conflict());
    }

    #[test]
    fn test_not_found_maps_to_port_not_found() {
        let error = DatabaseError::not_found("Tenant", "t-1");
        assert!(error.is_not_found());
        let port: PortError = error.into();
        assert!(port.is_not_found());
    }

    #[test]
    fn test_pool_timeout_is_connection_error() {
        let error: DatabaseError = sqlx::Error::PoolTimedOut.into();
        assert!(error.is_connection_error());
        let port: PortError = error.into();
        assert!(port.is_transient());
    }

    #[test]
    fn test_serialization_maps_to_transformation() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let port: PortError = DatabaseError::from(json_err).into();
        assert!(matches!(port, PortError::Transformation { .. }));
    }
}
