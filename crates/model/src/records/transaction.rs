use crate::records::mutation::Mutation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt};
use thiserror::Error;

/// One unit of local commit history awaiting upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingTransaction {
    pub id: u64,
    pub mutations: Vec<Mutation>,
    pub created_at: DateTime<Utc>,
}

impl PendingTransaction {
    pub fn new(id: u64, mutations: Vec<Mutation>) -> Self {
        PendingTransaction {
            id,
            mutations,
            created_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    /// Distinct tables touched by this transaction.
    pub fn tables(&self) -> BTreeSet<&str> {
        self.mutations.iter().map(|m| m.table.as_str()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionState {
    Outstanding,
    Applying,
    CompletedSuccess,
    CompletedDiscarded,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid transaction state transition: {from} -> {to}")]
pub struct StateTransitionError {
    pub from: TransactionState,
    pub to: TransactionState,
}

impl TransactionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionState::CompletedSuccess | TransactionState::CompletedDiscarded
        )
    }

    /// Moves to `next`, rejecting any edge the upload lifecycle does not allow.
    /// Completed states are terminal.
    pub fn transition(self, next: TransactionState) -> Result<Self, StateTransitionError> {
        use TransactionState::*;
        if self.is_terminal() {
            return Err(StateTransitionError {
                from: self,
                to: next,
            });
        }
        match (self, next) {
            (Outstanding, Applying)
            | (Applying, CompletedSuccess)
            | (Applying, CompletedDiscarded)
            | (Applying, Outstanding) => Ok(next),
            (from, to) => Err(StateTransitionError { from, to }),
        }
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionState::Outstanding => "outstanding",
            TransactionState::Applying => "applying",
            TransactionState::CompletedSuccess => "completed (applied)",
            TransactionState::CompletedDiscarded => "completed (discarded)",
        };
        f.write_str(s)
    }
}

/// Why a transaction was dropped without being applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscardReason {
    /// The remote call that was rejected, e.g. `bulk upsert equipment (2 rows)`.
    pub call: String,
    pub code: Option<String>,
    pub message: String,
    /// Remote calls that were never issued because of the rejection.
    pub skipped_calls: usize,
}

/// How a transaction left the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Completion {
    Applied,
    Discarded(DiscardReason),
}

impl Completion {
    pub fn state(&self) -> TransactionState {
        match self {
            Completion::Applied => TransactionState::CompletedSuccess,
            Completion::Discarded(_) => TransactionState::CompletedDiscarded,
        }
    }
}

/// Journal entry written when a transaction is marked complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub tx_id: u64,
    pub mutation_count: usize,
    pub completion: Completion,
    pub completed_at: DateTime<Utc>,
}

impl CompletionRecord {
    pub fn new(tx: &PendingTransaction, completion: Completion) -> Self {
        CompletionRecord {
            tx_id: tx.id,
            mutation_count: tx.len(),
            completion,
            completed_at: Utc::now(),
        }
    }
}
