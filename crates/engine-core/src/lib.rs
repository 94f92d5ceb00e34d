pub mod error;
pub mod metrics;
pub mod queue;
pub mod retry;
pub mod sink;
