use crate::{
    env::EnvManager,
    error::CliError,
    output::QueueStatus,
    settings::{Overrides, Settings},
    shutdown::ShutdownCoordinator,
};
use clap::Parser;
use commands::Commands;
use engine_core::queue::{MutationQueue, sled_store::SledMutationQueue};
use engine_processing::{
    error::SchedulerError, scheduler::UploadScheduler, upload::UploadReconciler,
};
use model::records::transaction::Completion;
use std::{path::PathBuf, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod commands;
mod conn;
mod env;
mod error;
mod input;
mod output;
mod settings;
mod shutdown;

#[derive(Parser)]
#[command(
    name = "uplink",
    version = "0.1.0",
    about = "Uploads locally committed mutations to a remote row store"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true, help = "Load settings from this .env file")]
    env_file: Option<PathBuf>,

    #[arg(long, global = true, help = "Remote Postgres connection string")]
    database_url: Option<String>,

    #[arg(long, global = true, help = "Directory of the local mutation queue")]
    queue_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut env = EnvManager::new();
    if let Some(path) = &cli.env_file {
        env.load_from_file(path)?;
    }
    let settings = Settings::resolve(
        &env,
        &Overrides {
            database_url: cli.database_url,
            queue_path: cli.queue_path,
        },
    )?;

    match cli.command {
        Commands::Upload { watch } => upload(&settings, watch).await?,
        Commands::Enqueue { file } => {
            let mutations = input::read_transaction(&file).await?;
            let count = mutations.len();
            let queue = open_queue(&settings)?;
            let tx_id = queue.enqueue(mutations).await?;
            info!(tx_id, mutations = count, "Transaction queued");
        }
        Commands::Status { json } => {
            let queue = open_queue(&settings)?;
            let status = QueueStatus {
                outstanding: queue.outstanding_count().await?,
                head: queue.next_outstanding().await?,
            };
            if json {
                output::print_json(&status)?;
            } else {
                output::print_status(&status);
            }
        }
        Commands::Discarded { limit, all, json } => {
            let queue = open_queue(&settings)?;
            let records = queue
                .history(limit)
                .await?
                .into_iter()
                .filter(|r| all || matches!(r.completion, Completion::Discarded(_)))
                .collect::<Vec<_>>();
            if json {
                output::print_json(&records)?;
            } else {
                output::print_history(&records);
            }
        }
        Commands::TestConn { conn_str } => {
            let conn_str = match conn_str {
                Some(conn_str) => conn_str,
                None => settings.database_url()?.to_string(),
            };
            conn::ping(&conn_str, settings.call_timeout).await?;
        }
    }

    Ok(())
}

fn open_queue(settings: &Settings) -> Result<Arc<SledMutationQueue>, CliError> {
    let queue = SledMutationQueue::open(&settings.queue_path).map_err(|err| {
        CliError::Unexpected(format!(
            "Failed to open mutation queue at {}: {err}",
            settings.queue_path.display()
        ))
    })?;
    Ok(Arc::new(queue))
}

async fn upload(settings: &Settings, watch: bool) -> Result<(), CliError> {
    let queue = open_queue(settings)?;
    let sink = conn::open_sink(settings.database_url()?, settings.call_timeout).await?;

    let reconciler = UploadReconciler::new(queue, Arc::new(sink))
        .with_classifier(settings.upload.classifier());
    let scheduler = UploadScheduler::new(Arc::new(reconciler), &settings.upload);

    let summary = if watch {
        let shutdown = ShutdownCoordinator::new(CancellationToken::new());
        shutdown.register_handlers();
        let summary = scheduler.run(shutdown.cancel_token()).await?;
        if shutdown.is_shutdown_requested() {
            info!("Uploader stopped on request");
        }
        summary
    } else {
        match scheduler.drain().await {
            Ok(summary) => summary,
            Err(err) => {
                if let SchedulerError::RetriesExhausted { summary, .. } = &err {
                    output::print_summary(summary);
                }
                return Err(err.into());
            }
        }
    };

    let metrics = scheduler.reconciler().metrics().snapshot();
    info!(
        remote_calls = metrics.remote_calls,
        mutations_uploaded = metrics.mutations_uploaded,
        "Upload finished"
    );
    output::print_summary(&summary);
    Ok(())
}
