use connectors::sql::base::error::DbError;
use std::time::Duration;
use thiserror::Error;

/// SQLSTATE reported for requests rejected before reaching the server.
pub const SQLSTATE_SYNTAX_ERROR: &str = "42601";

#[derive(Error, Debug)]
pub enum SinkError {
    /// The remote store refused the write and said why.
    #[error("Remote store rejected the write [{code}]: {message}")]
    Rejected { code: String, message: String },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Connection to the remote store is closed")]
    Closed,

    #[error("Remote call timed out after {0:?}")]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The write could not even be expressed as a statement.
    #[error("Invalid write request: {0}")]
    InvalidRequest(String),

    #[error("Sink error: {0}")]
    Other(String),
}

impl SinkError {
    pub fn rejected(code: &str, message: impl Into<String>) -> Self {
        SinkError::Rejected {
            code: code.to_string(),
            message: message.into(),
        }
    }

    /// The classifiable error code, if the failure carries one.
    ///
    /// Requests that cannot be built are reported with the syntax-error class so
    /// they classify like a server-side syntax rejection.
    pub fn code(&self) -> Option<&str> {
        match self {
            SinkError::Rejected { code, .. } => Some(code),
            SinkError::InvalidRequest(_) => Some(SQLSTATE_SYNTAX_ERROR),
            _ => None,
        }
    }
}

impl From<DbError> for SinkError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::PgError(pg) => match pg.as_db_error() {
                Some(db) => SinkError::Rejected {
                    code: db.code().code().to_string(),
                    message: db.message().to_string(),
                },
                None if pg.is_closed() => SinkError::Closed,
                None => SinkError::Connection(pg.to_string()),
            },
            DbError::Io(io) => SinkError::Io(io),
            DbError::Timeout(limit) => SinkError::Timeout(limit),
            DbError::Reconnect(err) => SinkError::Connection(err.to_string()),
            DbError::QueryBuildError(msg) => SinkError::InvalidRequest(msg),
            DbError::Unknown(msg) => SinkError::Other(msg),
        }
    }
}

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Queue storage error: {0}")]
    Storage(#[from] sled::Error),

    #[error("Failed to (de)serialize queue entry: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Transaction {tx_id} is not the head of the queue")]
    NotHead { tx_id: u64 },

    #[error("Refusing to enqueue a transaction without mutations")]
    EmptyTransaction,
}
