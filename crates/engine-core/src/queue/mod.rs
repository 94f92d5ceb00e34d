use crate::error::QueueError;
use async_trait::async_trait;
use model::records::{
    mutation::Mutation,
    transaction::{Completion, CompletionRecord, PendingTransaction},
};

pub mod memory;
pub mod sled_store;

/// FIFO of locally committed transactions awaiting upload.
///
/// Only the head is ever visible to the uploader, and only the head may be
/// completed. Completing it advances the queue.
#[async_trait]
pub trait MutationQueue: Send + Sync {
    /// Appends a transaction produced by the local write path. Returns its id.
    async fn enqueue(&self, mutations: Vec<Mutation>) -> Result<u64, QueueError>;

    /// The current outstanding transaction, if any.
    async fn next_outstanding(&self) -> Result<Option<PendingTransaction>, QueueError>;

    /// Marks the head transaction processed and advances the queue.
    /// Fails with `QueueError::NotHead` for any other transaction.
    async fn complete(
        &self,
        tx: &PendingTransaction,
        completion: Completion,
    ) -> Result<CompletionRecord, QueueError>;

    async fn outstanding_count(&self) -> Result<usize, QueueError>;

    /// Most recent completion records, newest first.
    async fn history(&self, limit: usize) -> Result<Vec<CompletionRecord>, QueueError>;
}
