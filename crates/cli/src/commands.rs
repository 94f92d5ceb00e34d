use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Upload queued transactions to the remote store
    Upload {
        #[arg(
            long,
            help = "Keep running and upload new transactions as they are queued, until interrupted"
        )]
        watch: bool,
    },
    /// Queue one local transaction read from a JSON array of mutations
    Enqueue {
        #[arg(long, help = "Path to the mutations file")]
        file: PathBuf,
    },
    /// Show the outstanding transactions
    Status {
        #[arg(long, help = "If set, prints the status as JSON instead of a table")]
        json: bool,
    },
    /// List recently completed transactions and why any were discarded
    Discarded {
        #[arg(long, default_value_t = 20, help = "Number of records to scan")]
        limit: usize,

        #[arg(long, help = "Include transactions that were applied")]
        all: bool,

        #[arg(long, help = "If set, prints the records as JSON instead of a table")]
        json: bool,
    },
    /// Test the remote store connection
    TestConn {
        /// Connection string, defaults to the configured database URL
        #[arg(long)]
        conn_str: Option<String>,
    },
}
