use crate::{error::SinkError, sink::RemoteSink};
use async_trait::async_trait;
use connectors::sql::{
    base::{
        adapter::SqlAdapter,
        statement::{ID_COLUMN, StatementGenerator},
    },
    postgres::adapter::PgAdapter,
};
use model::records::{
    mutation::Fields,
    row::{RowData, fields_to_json},
};
use serde_json::json;
use std::collections::BTreeSet;
use tracing::debug;

/// Writes uploads straight into Postgres tables keyed by an `id` column.
/// Row-level security on the server applies to every statement.
pub struct PostgresSink {
    adapter: PgAdapter,
}

impl PostgresSink {
    pub fn new(adapter: PgAdapter) -> Self {
        Self { adapter }
    }

    fn upsert_payload(rows: &[RowData]) -> (Vec<String>, serde_json::Value) {
        let columns = rows
            .iter()
            .flat_map(|row| row.fields.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect::<Vec<_>>();
        let payload = serde_json::Value::Array(rows.iter().map(RowData::to_json).collect());
        (columns, payload)
    }

    fn delete_payload(row_ids: &[String]) -> serde_json::Value {
        serde_json::Value::Array(row_ids.iter().map(|id| json!({ ID_COLUMN: id })).collect())
    }

    fn update_payload(row_id: &str, fields: &Fields) -> (Vec<String>, serde_json::Value) {
        let columns = fields
            .keys()
            .filter(|c| c.as_str() != ID_COLUMN)
            .cloned()
            .collect::<Vec<_>>();
        let mut payload = fields_to_json(fields);
        if let Some(object) = payload.as_object_mut() {
            object.insert(ID_COLUMN.to_string(), json!(row_id));
        }
        (columns, payload)
    }
}

#[async_trait]
impl RemoteSink for PostgresSink {
    async fn bulk_upsert(&self, table: &str, rows: &[RowData]) -> Result<(), SinkError> {
        if rows.is_empty() {
            return Ok(());
        }

        let (columns, payload) = Self::upsert_payload(rows);
        let sql = StatementGenerator::bulk_upsert(table, &columns)?;
        let affected = self.adapter.exec_json(&sql, payload).await?;

        debug!(table, rows = rows.len(), affected, "Bulk upsert applied");
        Ok(())
    }

    async fn bulk_delete(&self, table: &str, row_ids: &[String]) -> Result<(), SinkError> {
        if row_ids.is_empty() {
            return Ok(());
        }

        let sql = StatementGenerator::bulk_delete(table)?;
        let affected = self
            .adapter
            .exec_json(&sql, Self::delete_payload(row_ids))
            .await?;

        debug!(table, ids = row_ids.len(), affected, "Bulk delete applied");
        Ok(())
    }

    async fn update_row(
        &self,
        table: &str,
        row_id: &str,
        fields: &Fields,
    ) -> Result<(), SinkError> {
        let (columns, payload) = Self::update_payload(row_id, fields);
        if columns.is_empty() {
            debug!(table, row_id, "Update carries no columns, nothing to send");
            return Ok(());
        }

        let sql = StatementGenerator::update_by_id(table, &columns)?;
        let affected = self.adapter.exec_json(&sql, payload).await?;

        debug!(table, row_id, affected, "Row update applied");
        Ok(())
    }
}
