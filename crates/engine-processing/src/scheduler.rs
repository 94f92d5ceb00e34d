use crate::{
    config::UploadConfig,
    error::{ReconcileError, SchedulerError},
    upload::{UploadOutcome, UploadReconciler},
};
use engine_core::retry::{RetryDisposition, RetryError, RetryPolicy};
use serde::Serialize;
use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What a scheduler pass resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UploadSummary {
    pub applied: usize,
    pub discarded: usize,
    pub retries: usize,
}

impl UploadSummary {
    fn record(&mut self, outcome: &UploadOutcome) {
        debug!(tx_id = outcome.tx_id(), "Transaction resolved");
        match outcome {
            UploadOutcome::Applied { .. } => self.applied += 1,
            UploadOutcome::Discarded { .. } => self.discarded += 1,
        }
    }
}

/// Drives the reconciler over the queue, retrying transient failures of the
/// head transaction with backoff. The head is never skipped: later
/// transactions wait until it is applied or discarded.
pub struct UploadScheduler {
    reconciler: Arc<UploadReconciler>,
    retry: RetryPolicy,
    poll_interval: Duration,
}

impl UploadScheduler {
    pub fn new(reconciler: Arc<UploadReconciler>, config: &UploadConfig) -> Self {
        Self {
            reconciler,
            retry: config.retry_policy(),
            poll_interval: config.poll_interval,
        }
    }

    pub fn reconciler(&self) -> &Arc<UploadReconciler> {
        &self.reconciler
    }

    /// Uploads until the queue is empty.
    /// When the head runs out of retries the error carries what this pass
    /// resolved before it.
    pub async fn drain(&self) -> Result<UploadSummary, SchedulerError> {
        let mut summary = UploadSummary::default();

        while let Some(outcome) = self.upload_with_retry(&mut summary).await? {
            summary.record(&outcome);
        }

        info!(
            applied = summary.applied,
            discarded = summary.discarded,
            retries = summary.retries,
            "Upload queue drained"
        );
        Ok(summary)
    }

    /// Keeps uploading until `cancel` fires, polling the queue when it is
    /// empty. A transaction whose retries run out is tried again on the next
    /// poll. Cancellation is observed between transactions only.
    pub async fn run(&self, cancel: CancellationToken) -> Result<UploadSummary, SchedulerError> {
        let mut summary = UploadSummary::default();
        info!(poll_interval = ?self.poll_interval, "Upload scheduler started");

        while !cancel.is_cancelled() {
            match self.upload_with_retry(&mut summary).await {
                Ok(Some(outcome)) => {
                    summary.record(&outcome);
                    continue;
                }
                Ok(None) => {}
                Err(SchedulerError::RetriesExhausted {
                    attempts, source, ..
                }) => {
                    warn!(
                        attempts,
                        error = %source,
                        "Giving up on transaction for now, will retry on next poll"
                    );
                }
                Err(err) => return Err(err),
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        info!(
            applied = summary.applied,
            discarded = summary.discarded,
            retries = summary.retries,
            "Upload scheduler stopped"
        );
        Ok(summary)
    }

    async fn upload_with_retry(
        &self,
        summary: &mut UploadSummary,
    ) -> Result<Option<UploadOutcome>, SchedulerError> {
        let retries = AtomicUsize::new(0);

        let result = self
            .retry
            .run(
                || self.reconciler.upload_next(),
                |err: &ReconcileError| {
                    if err.is_retryable() {
                        retries.fetch_add(1, Ordering::Relaxed);
                        RetryDisposition::Retry
                    } else {
                        RetryDisposition::Fatal
                    }
                },
            )
            .await;

        // The final failed attempt is not followed by a retry.
        let attempts = retries.load(Ordering::Relaxed);
        match result {
            Ok(outcome) => {
                summary.retries += attempts;
                Ok(outcome)
            }
            Err(RetryError::AttemptsExceeded(err)) => {
                summary.retries += attempts.saturating_sub(1);
                Err(SchedulerError::RetriesExhausted {
                    attempts,
                    summary: *summary,
                    source: Box::new(err),
                })
            }
            Err(RetryError::Fatal(err)) => Err(SchedulerError::Reconcile(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::{RemoteCall, testing::RecordingSink};
    use engine_core::{
        error::SinkError,
        queue::{MutationQueue, memory::MemoryMutationQueue},
    };
    use model::records::{mutation::Mutation, transaction::Completion};

    fn config(max_attempts: usize) -> UploadConfig {
        UploadConfig::default()
            .with_max_attempts(max_attempts)
            .with_backoff(Duration::ZERO, Duration::ZERO)
            .with_poll_interval(Duration::from_millis(10))
    }

    fn scheduler(
        queue: Arc<MemoryMutationQueue>,
        sink: Arc<RecordingSink>,
        max_attempts: usize,
    ) -> UploadScheduler {
        let reconciler = Arc::new(UploadReconciler::new(queue, sink));
        UploadScheduler::new(reconciler, &config(max_attempts))
    }

    async fn enqueue_deletes(queue: &MemoryMutationQueue, ids: &[&str]) {
        for id in ids {
            queue
                .enqueue(vec![Mutation::delete("equipment", *id)])
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn drain_uploads_everything_in_order() {
        let queue = Arc::new(MemoryMutationQueue::new());
        enqueue_deletes(&queue, &["1", "2", "3"]).await;
        let sink = Arc::new(RecordingSink::ok());

        let summary = scheduler(queue.clone(), sink.clone(), 3)
            .drain()
            .await
            .unwrap();

        assert_eq!(
            summary,
            UploadSummary {
                applied: 3,
                discarded: 0,
                retries: 0
            }
        );
        let ids = sink
            .calls()
            .into_iter()
            .map(|c| match c {
                RemoteCall::BulkDelete { row_ids, .. } => row_ids.join(","),
                other => panic!("unexpected call {other}"),
            })
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(queue.outstanding_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn transient_failures_are_retried_then_applied() {
        let queue = Arc::new(MemoryMutationQueue::new());
        enqueue_deletes(&queue, &["1"]).await;
        let sink = Arc::new(RecordingSink::scripted(|index, _| {
            (index < 2).then(|| SinkError::Connection("connection refused".into()))
        }));

        let summary = scheduler(queue.clone(), sink.clone(), 5)
            .drain()
            .await
            .unwrap();

        assert_eq!(summary.applied, 1);
        assert_eq!(summary.retries, 2);
        assert_eq!(sink.calls().len(), 3);
    }

    #[tokio::test]
    async fn discarded_transactions_do_not_block_the_queue() {
        let queue = Arc::new(MemoryMutationQueue::new());
        enqueue_deletes(&queue, &["1", "2"]).await;
        let sink = Arc::new(RecordingSink::scripted(|index, _| {
            (index == 0).then(|| SinkError::rejected("23503", "still referenced"))
        }));

        let summary = scheduler(queue.clone(), sink, 3).drain().await.unwrap();

        assert_eq!(summary.applied, 1);
        assert_eq!(summary.discarded, 1);
        let history = queue.history(10).await.unwrap();
        assert_eq!(history[0].completion, Completion::Applied);
        assert!(matches!(history[1].completion, Completion::Discarded(_)));
    }

    #[tokio::test]
    async fn exhausted_retries_keep_the_head_outstanding() {
        let queue = Arc::new(MemoryMutationQueue::new());
        enqueue_deletes(&queue, &["1", "2"]).await;
        let sink = Arc::new(RecordingSink::scripted(|_, _| {
            Some(SinkError::Timeout(Duration::from_secs(1)))
        }));

        let err = scheduler(queue.clone(), sink.clone(), 3)
            .drain()
            .await
            .unwrap_err();

        assert!(matches!(err, SchedulerError::RetriesExhausted { attempts: 3, .. }));
        assert_eq!(sink.calls().len(), 3);
        // The second transaction was never attempted.
        assert_eq!(queue.outstanding_count().await.unwrap(), 2);
        assert_eq!(queue.next_outstanding().await.unwrap().unwrap().id, 1);
    }

    #[tokio::test]
    async fn exhausted_retries_report_what_was_already_uploaded() {
        let queue = Arc::new(MemoryMutationQueue::new());
        enqueue_deletes(&queue, &["1", "2", "3"]).await;
        let sink = Arc::new(RecordingSink::scripted(|index, _| {
            (index > 0).then(|| SinkError::Timeout(Duration::from_secs(1)))
        }));

        let err = scheduler(queue.clone(), sink, 2)
            .drain()
            .await
            .unwrap_err();

        match err {
            SchedulerError::RetriesExhausted {
                attempts, summary, ..
            } => {
                assert_eq!(attempts, 2);
                assert_eq!(
                    summary,
                    UploadSummary {
                        applied: 1,
                        discarded: 0,
                        retries: 1
                    }
                );
            }
            other => panic!("unexpected error {other}"),
        }
        assert_eq!(queue.outstanding_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn run_picks_up_new_work_until_cancelled() {
        let queue = Arc::new(MemoryMutationQueue::new());
        let sink = Arc::new(RecordingSink::ok());
        let scheduler = Arc::new(scheduler(queue.clone(), sink.clone(), 3));
        let cancel = CancellationToken::new();

        let handle = {
            let scheduler = scheduler.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { scheduler.run(cancel).await })
        };

        enqueue_deletes(&queue, &["7"]).await;
        for _ in 0..100 {
            if queue.outstanding_count().await.unwrap() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        cancel.cancel();
        let summary = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        assert_eq!(summary.applied, 1);
        assert_eq!(sink.calls().len(), 1);
    }

    #[tokio::test]
    async fn run_outlives_exhausted_retries() {
        let queue = Arc::new(MemoryMutationQueue::new());
        enqueue_deletes(&queue, &["1"]).await;
        // Down for the first four calls, then recovers.
        let sink = Arc::new(RecordingSink::scripted(|index, _| {
            (index < 4).then(|| SinkError::Closed)
        }));
        let scheduler = Arc::new(scheduler(queue.clone(), sink.clone(), 2));
        let cancel = CancellationToken::new();

        let handle = {
            let scheduler = scheduler.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { scheduler.run(cancel).await })
        };

        for _ in 0..200 {
            if queue.outstanding_count().await.unwrap() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        cancel.cancel();

        let summary = handle.await.unwrap().unwrap();
        assert_eq!(summary.applied, 1);
        assert_eq!(sink.calls().len(), 5);
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_uploading() {
        let queue = Arc::new(MemoryMutationQueue::new());
        enqueue_deletes(&queue, &["1"]).await;
        let sink = Arc::new(RecordingSink::ok());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = scheduler(queue.clone(), sink.clone(), 3)
            .run(cancel)
            .await
            .unwrap();

        assert_eq!(summary, UploadSummary::default());
        assert!(sink.calls().is_empty());
        assert_eq!(queue.outstanding_count().await.unwrap(), 1);
    }
}
