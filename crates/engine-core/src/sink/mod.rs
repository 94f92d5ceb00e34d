use crate::error::SinkError;
use async_trait::async_trait;
use model::records::{mutation::Fields, row::RowData};

pub mod postgres;

/// The authoritative row-store the uploader writes to.
///
/// Implementations report failures as `SinkError`; the uploader decides from
/// `SinkError::code` whether a failure is worth retrying.
#[async_trait]
pub trait RemoteSink: Send + Sync {
    /// Inserts or replaces every row of `rows` in `table` in one call.
    async fn bulk_upsert(&self, table: &str, rows: &[RowData]) -> Result<(), SinkError>;

    /// Deletes every row of `table` whose id is in `row_ids` in one call.
    async fn bulk_delete(&self, table: &str, row_ids: &[String]) -> Result<(), SinkError>;

    /// Sets exactly `fields` on the row `row_id` of `table`.
    async fn update_row(&self, table: &str, row_id: &str, fields: &Fields)
    -> Result<(), SinkError>;
}
