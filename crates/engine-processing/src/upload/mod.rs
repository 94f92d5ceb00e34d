pub mod plan;
pub mod reconciler;

#[cfg(test)]
pub(crate) mod testing;

pub use plan::{RemoteCall, UploadPlan};
pub use reconciler::{CallOutcome, UploadOutcome, UploadReconciler};
