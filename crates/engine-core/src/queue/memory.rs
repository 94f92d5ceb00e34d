use crate::{error::QueueError, queue::MutationQueue};
use async_trait::async_trait;
use model::records::{
    mutation::Mutation,
    transaction::{Completion, CompletionRecord, PendingTransaction},
};
use std::collections::VecDeque;
use tokio::sync::Mutex;

#[derive(Default)]
struct QueueState {
    next_id: u64,
    pending: VecDeque<PendingTransaction>,
    log: Vec<CompletionRecord>,
}

/// Non-durable queue for embedding and tests.
#[derive(Default)]
pub struct MemoryMutationQueue {
    state: Mutex<QueueState>,
}

impl MemoryMutationQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MutationQueue for MemoryMutationQueue {
    async fn enqueue(&self, mutations: Vec<Mutation>) -> Result<u64, QueueError> {
        if mutations.is_empty() {
            return Err(QueueError::EmptyTransaction);
        }

        let mut state = self.state.lock().await;
        state.next_id += 1;
        let id = state.next_id;
        state.pending.push_back(PendingTransaction::new(id, mutations));
        Ok(id)
    }

    async fn next_outstanding(&self) -> Result<Option<PendingTransaction>, QueueError> {
        Ok(self.state.lock().await.pending.front().cloned())
    }

    async fn complete(
        &self,
        tx: &PendingTransaction,
        completion: Completion,
    ) -> Result<CompletionRecord, QueueError> {
        let mut state = self.state.lock().await;
        match state.pending.front() {
            Some(head) if head.id == tx.id => {}
            _ => return Err(QueueError::NotHead { tx_id: tx.id }),
        }

        state.pending.pop_front();
        let record = CompletionRecord::new(tx, completion);
        state.log.push(record.clone());
        Ok(record)
    }

    async fn outstanding_count(&self) -> Result<usize, QueueError> {
        Ok(self.state.lock().await.pending.len())
    }

    async fn history(&self, limit: usize) -> Result<Vec<CompletionRecord>, QueueError> {
        let state = self.state.lock().await;
        Ok(state.log.iter().rev().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn head_advances_only_on_completion() {
        let queue = MemoryMutationQueue::new();
        let first = queue
            .enqueue(vec![Mutation::delete("equipment", "1")])
            .await
            .unwrap();
        let second = queue
            .enqueue(vec![Mutation::delete("equipment", "2")])
            .await
            .unwrap();

        let head = queue.next_outstanding().await.unwrap().unwrap();
        assert_eq!(head.id, first);
        // Peeking does not advance.
        assert_eq!(queue.next_outstanding().await.unwrap().unwrap().id, first);

        queue.complete(&head, Completion::Applied).await.unwrap();
        assert_eq!(queue.next_outstanding().await.unwrap().unwrap().id, second);
        assert_eq!(queue.outstanding_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn completing_a_non_head_transaction_fails() {
        let queue = MemoryMutationQueue::new();
        queue
            .enqueue(vec![Mutation::delete("equipment", "1")])
            .await
            .unwrap();
        queue
            .enqueue(vec![Mutation::delete("equipment", "2")])
            .await
            .unwrap();

        let head = queue.next_outstanding().await.unwrap().unwrap();
        queue.complete(&head, Completion::Applied).await.unwrap();

        // The same transaction cannot be completed twice.
        let err = queue.complete(&head, Completion::Applied).await.unwrap_err();
        assert!(matches!(err, QueueError::NotHead { tx_id } if tx_id == head.id));
    }

    #[tokio::test]
    async fn empty_transactions_are_refused() {
        let queue = MemoryMutationQueue::new();
        assert!(matches!(
            queue.enqueue(Vec::new()).await,
            Err(QueueError::EmptyTransaction)
        ));
    }

    #[tokio::test]
    async fn history_is_newest_first() {
        let queue = MemoryMutationQueue::new();
        for id in ["1", "2", "3"] {
            queue
                .enqueue(vec![Mutation::delete("container", id)])
                .await
                .unwrap();
            let head = queue.next_outstanding().await.unwrap().unwrap();
            queue.complete(&head, Completion::Applied).await.unwrap();
        }

        let ids = queue
            .history(2)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.tx_id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![3, 2]);
    }
}
