use crate::{
    error::ReconcileError,
    retry::{ErrorClassifier, FatalCodes},
    upload::plan::{RemoteCall, UploadPlan},
};
use engine_core::{
    error::{QueueError, SinkError},
    metrics::UploadMetrics,
    queue::MutationQueue,
    retry::RetryDisposition,
    sink::RemoteSink,
};
use model::records::transaction::{
    Completion, DiscardReason, PendingTransaction, TransactionState,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Result of issuing a single remote call, already classified.
#[derive(Debug)]
pub enum CallOutcome {
    Applied,
    Fatal(SinkError),
    Retryable(SinkError),
}

/// How a transaction was resolved. Either way it has left the queue.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    Applied { tx_id: u64, calls: usize },
    Discarded { tx_id: u64, reason: DiscardReason },
}

impl UploadOutcome {
    pub fn tx_id(&self) -> u64 {
        match self {
            UploadOutcome::Applied { tx_id, .. } | UploadOutcome::Discarded { tx_id, .. } => {
                *tx_id
            }
        }
    }
}

/// Replays queued local transactions against the remote sink.
///
/// A transaction leaves the queue only when every call succeeded or when a
/// call was rejected for a reason that no retry can fix. Transient failures
/// leave it outstanding and are returned to the caller, who retries the whole
/// transaction later.
pub struct UploadReconciler {
    queue: Arc<dyn MutationQueue>,
    sink: Arc<dyn RemoteSink>,
    classifier: Arc<dyn ErrorClassifier>,
    metrics: UploadMetrics,
    in_flight: Mutex<()>,
}

impl UploadReconciler {
    pub fn new(queue: Arc<dyn MutationQueue>, sink: Arc<dyn RemoteSink>) -> Self {
        Self {
            queue,
            sink,
            classifier: Arc::new(FatalCodes::default()),
            metrics: UploadMetrics::new(),
            in_flight: Mutex::new(()),
        }
    }

    pub fn with_classifier(mut self, classifier: impl ErrorClassifier + 'static) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    pub fn metrics(&self) -> &UploadMetrics {
        &self.metrics
    }

    /// Uploads the queue's current outstanding transaction.
    /// Returns `Ok(None)` without touching the sink when there is none.
    pub async fn upload_next(&self) -> Result<Option<UploadOutcome>, ReconcileError> {
        let _guard = self.in_flight.lock().await;
        match self.queue.next_outstanding().await? {
            Some(tx) => self.apply(&tx).await.map(Some),
            None => Ok(None),
        }
    }

    /// Uploads `tx`, which must be the queue's head.
    /// Any other transaction fails with `QueueError::NotHead` before a remote
    /// call is made. Calls on the same reconciler are serialized.
    pub async fn reconcile(
        &self,
        tx: &PendingTransaction,
    ) -> Result<UploadOutcome, ReconcileError> {
        let _guard = self.in_flight.lock().await;

        let is_head = self
            .queue
            .next_outstanding()
            .await?
            .is_some_and(|head| head.id == tx.id);
        if !is_head {
            warn!(
                tx_id = tx.id,
                "Refusing to upload a transaction that is not the queue head"
            );
            return Err(QueueError::NotHead { tx_id: tx.id }.into());
        }

        self.apply(tx).await
    }

    async fn apply(&self, tx: &PendingTransaction) -> Result<UploadOutcome, ReconcileError> {
        let mut state = TransactionState::Outstanding.transition(TransactionState::Applying)?;
        let plan = UploadPlan::build(tx);

        info!(
            tx_id = tx.id,
            mutations = tx.len(),
            tables = ?tx.tables(),
            calls = plan.len(),
            "Uploading transaction"
        );

        for (index, call) in plan.calls().iter().enumerate() {
            match self.issue(call).await {
                CallOutcome::Applied => {}
                CallOutcome::Fatal(err) => {
                    let reason = DiscardReason {
                        call: call.to_string(),
                        code: err.code().map(str::to_string),
                        message: err.to_string(),
                        skipped_calls: plan.len() - index - 1,
                    };
                    let completion = Completion::Discarded(reason.clone());
                    state = state.transition(completion.state())?;

                    error!(
                        tx_id = tx.id,
                        table = call.table(),
                        call = %call,
                        code = reason.code.as_deref().unwrap_or("none"),
                        skipped_calls = reason.skipped_calls,
                        mutations = tx.len(),
                        %state,
                        error = %err,
                        "Remote store rejected transaction, discarding it"
                    );

                    self.queue.complete(tx, completion).await?;
                    self.metrics.record_discarded();

                    return Ok(UploadOutcome::Discarded {
                        tx_id: tx.id,
                        reason,
                    });
                }
                CallOutcome::Retryable(err) => {
                    state = state.transition(TransactionState::Outstanding)?;
                    self.metrics.record_retryable_failure();

                    warn!(
                        tx_id = tx.id,
                        call = %call,
                        applied_calls = index,
                        %state,
                        error = %err,
                        "Remote call failed, transaction stays outstanding"
                    );

                    return Err(ReconcileError::Retryable {
                        tx_id: tx.id,
                        call: call.to_string(),
                        source: err,
                    });
                }
            }
        }

        let completion = Completion::Applied;
        state = state.transition(completion.state())?;
        self.queue.complete(tx, completion).await?;
        self.metrics.record_applied(tx.len() as u64);

        info!(tx_id = tx.id, calls = plan.len(), %state, "Transaction uploaded");
        Ok(UploadOutcome::Applied {
            tx_id: tx.id,
            calls: plan.len(),
        })
    }

    async fn issue(&self, call: &RemoteCall) -> CallOutcome {
        self.metrics.record_remote_call();
        debug!(call = %call, "Issuing remote call");

        let result = match call {
            RemoteCall::BulkUpsert { table, rows } => self.sink.bulk_upsert(table, rows).await,
            RemoteCall::BulkDelete { table, row_ids } => {
                self.sink.bulk_delete(table, row_ids).await
            }
            RemoteCall::UpdateRow {
                table,
                row_id,
                fields,
            } => self.sink.update_row(table, row_id, fields).await,
        };

        match result {
            Ok(()) => CallOutcome::Applied,
            Err(err) => match self.classifier.classify(&err) {
                RetryDisposition::Fatal => CallOutcome::Fatal(err),
                RetryDisposition::Retry => CallOutcome::Retryable(err),
            },
        }
    }
}
