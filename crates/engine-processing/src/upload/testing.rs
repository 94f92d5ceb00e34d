use crate::upload::plan::RemoteCall;
use async_trait::async_trait;
use engine_core::{error::SinkError, sink::RemoteSink};
use model::records::{mutation::Fields, row::RowData};
use std::sync::Mutex;

type Script = Box<dyn Fn(usize, &RemoteCall) -> Option<SinkError> + Send + Sync>;

/// Sink that records every call it receives and fails the ones its script picks.
/// The script sees the zero-based index of the call across the sink's lifetime.
pub(crate) struct RecordingSink {
    calls: Mutex<Vec<RemoteCall>>,
    script: Script,
}

impl RecordingSink {
    pub(crate) fn ok() -> Self {
        Self::scripted(|_, _| None)
    }

    pub(crate) fn scripted<F>(script: F) -> Self
    where
        F: Fn(usize, &RemoteCall) -> Option<SinkError> + Send + Sync + 'static,
    {
        Self {
            calls: Mutex::new(Vec::new()),
            script: Box::new(script),
        }
    }

    pub(crate) fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: RemoteCall) -> Result<(), SinkError> {
        let mut calls = self.calls.lock().unwrap();
        let index = calls.len();
        let failure = (self.script)(index, &call);
        calls.push(call);
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RemoteSink for RecordingSink {
    async fn bulk_upsert(&self, table: &str, rows: &[RowData]) -> Result<(), SinkError> {
        self.record(RemoteCall::BulkUpsert {
            table: table.to_string(),
            rows: rows.to_vec(),
        })
    }

    async fn bulk_delete(&self, table: &str, row_ids: &[String]) -> Result<(), SinkError> {
        self.record(RemoteCall::BulkDelete {
            table: table.to_string(),
            row_ids: row_ids.to_vec(),
        })
    }

    async fn update_row(
        &self,
        table: &str,
        row_id: &str,
        fields: &Fields,
    ) -> Result<(), SinkError> {
        self.record(RemoteCall::UpdateRow {
            table: table.to_string(),
            row_id: row_id.to_string(),
            fields: fields.clone(),
        })
    }
}
