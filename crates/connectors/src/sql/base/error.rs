use std::time::Duration;
use thiserror::Error;

/// All errors coming from the database/query layer.
#[derive(Debug, Error)]
pub enum DbError {
    /// Low‐level I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any error reported by the Postgres driver, including server-side rejections.
    #[error("Postgres error: {0}")]
    PgError(#[from] tokio_postgres::Error),

    /// The statement did not finish within the configured call timeout.
    #[error("Statement timed out after {0:?}")]
    Timeout(Duration),

    /// An error occurred while building a SQL statement.
    #[error("Query build error: {0}")]
    QueryBuildError(String),

    /// The connection was lost and could not be reopened.
    #[error("Reconnect failed: {0}")]
    Reconnect(#[from] ConnectorError),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl DbError {
    /// Whether the connection can no longer carry statements and has to be
    /// reopened. Server-side rejections and timeouts leave it usable.
    pub fn breaks_connection(&self) -> bool {
        match self {
            DbError::PgError(err) => err.is_closed() || err.as_db_error().is_none(),
            DbError::Io(_) | DbError::Reconnect(_) => true,
            DbError::Timeout(_) | DbError::QueryBuildError(_) | DbError::Unknown(_) => false,
        }
    }
}

/// Errors happening during adapter or connection setup.
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("Invalid connection URL: {0}")]
    InvalidUrl(String),

    #[error("Postgres connection failed: {0}")]
    Connection(#[from] tokio_postgres::Error),

    #[error("TLS configuration error: {0}")]
    TlsConfig(#[from] native_tls::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lost_sockets_force_a_reconnect() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        assert!(DbError::Io(io).breaks_connection());
        assert!(DbError::Reconnect(ConnectorError::InvalidUrl("nope".into())).breaks_connection());
    }

    #[test]
    fn usable_connections_are_kept() {
        assert!(!DbError::Timeout(Duration::from_secs(1)).breaks_connection());
        assert!(!DbError::QueryBuildError("no columns".into()).breaks_connection());
        assert!(!DbError::Unknown("boom".into()).breaks_connection());
    }
}
