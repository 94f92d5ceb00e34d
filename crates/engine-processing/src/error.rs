use crate::scheduler::UploadSummary;
use engine_core::error::{QueueError, SinkError};
use model::records::transaction::StateTransitionError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconcileError {
    /// A remote call failed transiently. The transaction is still outstanding.
    #[error("Transaction {tx_id} left outstanding, '{call}' failed: {source}")]
    Retryable {
        tx_id: u64,
        call: String,
        #[source]
        source: SinkError,
    },

    #[error("Mutation queue error: {0}")]
    Queue(#[from] QueueError),

    #[error(transparent)]
    State(#[from] StateTransitionError),
}

impl ReconcileError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ReconcileError::Retryable { .. })
    }
}

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Retry attempts exhausted after {attempts} tries: {source}")]
    RetriesExhausted {
        attempts: usize,
        summary: UploadSummary,
        #[source]
        source: Box<ReconcileError>,
    },

    #[error("Upload stopped: {0}")]
    Reconcile(#[from] ReconcileError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },
}
