use crate::sql::base::error::{ConnectorError, DbError};
use async_trait::async_trait;

#[async_trait]
pub trait SqlAdapter {
    async fn connect(url: &str) -> Result<Self, ConnectorError>
    where
        Self: Sized;

    /// Executes a statement whose single parameter is a JSON document.
    /// Returns the number of affected rows.
    async fn exec_json(&self, query: &str, payload: serde_json::Value) -> Result<u64, DbError>;

    /// Round-trips a trivial query to check the connection is usable.
    async fn ping(&self) -> Result<(), DbError>;
}
