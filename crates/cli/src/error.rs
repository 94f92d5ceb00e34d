use connectors::sql::base::error::{ConnectorError, DbError};
use engine_core::error::QueueError;
use engine_processing::error::{ConfigError, SchedulerError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Failed to read input file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse mutations file as JSON: {0}")]
    InputParse(#[from] serde_json::Error),

    #[error("Invalid mutations file: {0}")]
    InvalidInput(String),

    #[error("Failed to serialize data to JSON: {0}")]
    JsonSerialize(serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid upload settings: {0}")]
    Settings(#[from] ConfigError),

    #[error("Mutation queue error: {0}")]
    Queue(#[from] QueueError),

    /// Could not open a connection to the remote store.
    #[error("Connection error: {0}")]
    Connector(#[from] ConnectorError),

    /// PostgreSQL statement error.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] DbError),

    #[error("Upload failed: {0}")]
    Upload(#[from] SchedulerError),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}
