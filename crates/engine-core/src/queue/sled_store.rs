use crate::{error::QueueError, queue::MutationQueue};
use async_trait::async_trait;
use model::records::{
    mutation::Mutation,
    transaction::{Completion, CompletionRecord, PendingTransaction},
};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use std::path::Path;

const TX_PREFIX: &str = "tx:";
const LOG_PREFIX: &str = "log:";

/// Durable queue on a local sled database.
///
/// Layout: `tx:{id}` holds outstanding transactions and `log:{id}` the completion
/// journal. Ids are zero-padded so key order is queue order.
pub struct SledMutationQueue {
    db: sled::Db,
}

impl SledMutationQueue {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, QueueError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    #[inline]
    fn tx_key(id: u64) -> String {
        format!("{TX_PREFIX}{id:020}")
    }

    #[inline]
    fn log_key(id: u64) -> String {
        format!("{LOG_PREFIX}{id:020}")
    }
}

#[async_trait]
impl MutationQueue for SledMutationQueue {
    async fn enqueue(&self, mutations: Vec<Mutation>) -> Result<u64, QueueError> {
        if mutations.is_empty() {
            return Err(QueueError::EmptyTransaction);
        }

        // Monotonic across restarts; the +1 keeps ids starting at 1.
        let id = self.db.generate_id()? + 1;
        let tx = PendingTransaction::new(id, mutations);
        self.db.insert(Self::tx_key(id), serde_json::to_vec(&tx)?)?;
        self.db.flush()?;
        Ok(id)
    }

    async fn next_outstanding(&self) -> Result<Option<PendingTransaction>, QueueError> {
        match self.db.scan_prefix(TX_PREFIX).next() {
            Some(item) => {
                let (_key, value) = item?;
                Ok(Some(serde_json::from_slice(&value)?))
            }
            None => Ok(None),
        }
    }

    async fn complete(
        &self,
        tx: &PendingTransaction,
        completion: Completion,
    ) -> Result<CompletionRecord, QueueError> {
        let is_head = self
            .next_outstanding()
            .await?
            .is_some_and(|head| head.id == tx.id);
        if !is_head {
            return Err(QueueError::NotHead { tx_id: tx.id });
        }

        let record = CompletionRecord::new(tx, completion);
        let tx_key = Self::tx_key(tx.id);
        let log_key = Self::log_key(tx.id);
        let log_value = serde_json::to_vec(&record)?;

        // Dequeue and journal atomically so a crash never loses the outcome.
        let result = self.db.transaction(|tx_db| {
            if tx_db.remove(tx_key.as_bytes())?.is_none() {
                return Err(ConflictableTransactionError::Abort(QueueError::NotHead {
                    tx_id: tx.id,
                }));
            }
            tx_db.insert(log_key.as_bytes(), log_value.as_slice())?;
            Ok(())
        });

        match result {
            Ok(()) => {}
            Err(TransactionError::Abort(e)) => return Err(e),
            Err(TransactionError::Storage(e)) => return Err(QueueError::Storage(e)),
        }

        self.db.flush()?;
        Ok(record)
    }

    async fn outstanding_count(&self) -> Result<usize, QueueError> {
        let mut count = 0;
        for item in self.db.scan_prefix(TX_PREFIX).keys() {
            item?;
            count += 1;
        }
        Ok(count)
    }

    async fn history(&self, limit: usize) -> Result<Vec<CompletionRecord>, QueueError> {
        let mut records = Vec::new();
        for item in self.db.scan_prefix(LOG_PREFIX).rev().take(limit) {
            let (_key, value) = item?;
            records.push(serde_json::from_slice(&value)?);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{
        core::value::Value,
        records::{mutation::Fields, transaction::DiscardReason},
    };
    use tempfile::tempdir;

    fn create(table: &str, id: &str) -> Mutation {
        let mut fields = Fields::new();
        fields.insert("name".into(), Value::from(format!("{table} {id}")));
        Mutation::create(table, id, fields)
    }

    #[tokio::test]
    async fn outstanding_transactions_survive_reopen() {
        let dir = tempdir().unwrap();
        let id = {
            let queue = SledMutationQueue::open(dir.path()).unwrap();
            queue.enqueue(vec![create("equipment", "4")]).await.unwrap()
        };

        let queue = SledMutationQueue::open(dir.path()).unwrap();
        let head = queue.next_outstanding().await.unwrap().unwrap();
        assert_eq!(head.id, id);
        assert_eq!(head.mutations, vec![create("equipment", "4")]);
    }

    #[tokio::test]
    async fn completion_moves_head_into_journal() {
        let dir = tempdir().unwrap();
        let queue = SledMutationQueue::open(dir.path()).unwrap();
        let first = queue.enqueue(vec![create("equipment", "1")]).await.unwrap();
        let second = queue
            .enqueue(vec![create("container", "1"), create("container", "2")])
            .await
            .unwrap();
        assert!(second > first);

        let head = queue.next_outstanding().await.unwrap().unwrap();
        let reason = DiscardReason {
            call: "bulk upsert equipment (1 rows)".into(),
            code: Some("23505".into()),
            message: "duplicate key".into(),
            skipped_calls: 0,
        };
        queue
            .complete(&head, Completion::Discarded(reason.clone()))
            .await
            .unwrap();

        assert_eq!(queue.outstanding_count().await.unwrap(), 1);
        assert_eq!(queue.next_outstanding().await.unwrap().unwrap().id, second);

        let history = queue.history(10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].tx_id, first);
        assert_eq!(history[0].completion, Completion::Discarded(reason));
    }

    #[tokio::test]
    async fn only_the_head_can_be_completed() {
        let dir = tempdir().unwrap();
        let queue = SledMutationQueue::open(dir.path()).unwrap();
        queue.enqueue(vec![create("equipment", "1")]).await.unwrap();
        queue.enqueue(vec![create("equipment", "2")]).await.unwrap();

        let head = queue.next_outstanding().await.unwrap().unwrap();
        queue.complete(&head, Completion::Applied).await.unwrap();

        let err = queue.complete(&head, Completion::Applied).await.unwrap_err();
        assert!(matches!(err, QueueError::NotHead { .. }));
        assert_eq!(queue.outstanding_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn empty_queue_has_no_head() {
        let dir = tempdir().unwrap();
        let queue = SledMutationQueue::open(dir.path()).unwrap();
        assert!(queue.next_outstanding().await.unwrap().is_none());
        assert!(queue.history(5).await.unwrap().is_empty());
    }
}
