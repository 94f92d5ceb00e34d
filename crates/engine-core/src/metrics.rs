use serde::Serialize;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

#[derive(Debug, Default)]
struct InnerMetrics {
    transactions_applied: AtomicU64,
    transactions_discarded: AtomicU64,
    retryable_failures: AtomicU64,
    remote_calls: AtomicU64,
    mutations_uploaded: AtomicU64,
}

/// Upload counters shared between the reconciler and whoever reports on it.
#[derive(Debug, Clone)]
pub struct UploadMetrics {
    inner: Arc<InnerMetrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub transactions_applied: u64,
    pub transactions_discarded: u64,
    pub retryable_failures: u64,
    pub remote_calls: u64,
    pub mutations_uploaded: u64,
}

impl UploadMetrics {
    pub fn new() -> Self {
        UploadMetrics {
            inner: Arc::new(InnerMetrics::default()),
        }
    }

    pub fn record_applied(&self, mutations: u64) {
        self.inner
            .transactions_applied
            .fetch_add(1, Ordering::Relaxed);
        self.inner
            .mutations_uploaded
            .fetch_add(mutations, Ordering::Relaxed);
    }

    pub fn record_discarded(&self) {
        self.inner
            .transactions_discarded
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retryable_failure(&self) {
        self.inner.retryable_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_remote_call(&self) {
        self.inner.remote_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            transactions_applied: self.inner.transactions_applied.load(Ordering::Relaxed),
            transactions_discarded: self.inner.transactions_discarded.load(Ordering::Relaxed),
            retryable_failures: self.inner.retryable_failures.load(Ordering::Relaxed),
            remote_calls: self.inner.remote_calls.load(Ordering::Relaxed),
            mutations_uploaded: self.inner.mutations_uploaded.load(Ordering::Relaxed),
        }
    }
}

impl Default for UploadMetrics {
    fn default() -> Self {
        Self::new()
    }
}
