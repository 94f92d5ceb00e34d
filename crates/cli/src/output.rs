use crate::error::CliError;
use engine_processing::scheduler::UploadSummary;
use model::records::transaction::{Completion, CompletionRecord, PendingTransaction};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct QueueStatus {
    pub outstanding: usize,
    pub head: Option<PendingTransaction>,
}

pub fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value).map_err(CliError::JsonSerialize)?;
    println!("{json}");
    Ok(())
}

pub fn print_summary(summary: &UploadSummary) {
    println!("Upload summary:");
    println!("-----------------------------");
    println!("{:<16} {}", "Applied", summary.applied);
    println!("{:<16} {}", "Discarded", summary.discarded);
    println!("{:<16} {}", "Retries", summary.retries);
}

pub fn print_status(status: &QueueStatus) {
    println!("{:<16} {}", "Outstanding", status.outstanding);

    let Some(head) = &status.head else {
        println!("{:<16} none", "Head");
        return;
    };

    println!(
        "{:<16} tx {} ({} mutations, queued {})",
        "Head",
        head.id,
        head.len(),
        head.created_at.to_rfc3339()
    );
    for mutation in &head.mutations {
        println!("  {mutation}");
        for (column, value) in mutation.fields.iter().flatten() {
            println!("      {column} = {value}");
        }
    }
}

pub fn print_history(records: &[CompletionRecord]) {
    if records.is_empty() {
        println!("No completed transactions");
        return;
    }

    println!(
        "{:<8} {:<10} {:<10} {:<26} Detail",
        "Tx", "Outcome", "Mutations", "Completed at"
    );
    for record in records {
        let (outcome, detail) = match &record.completion {
            Completion::Applied => ("applied", String::new()),
            Completion::Discarded(reason) => (
                "discarded",
                format!(
                    "[{}] {}: {} ({} calls skipped)",
                    reason.code.as_deref().unwrap_or("-"),
                    reason.call,
                    reason.message,
                    reason.skipped_calls
                ),
            ),
        };
        println!(
            "{:<8} {:<10} {:<10} {:<26} {}",
            record.tx_id,
            outcome,
            record.mutation_count,
            record.completed_at.to_rfc3339(),
            detail
        );
    }
}
