use crate::error::CliError;
use connectors::sql::{base::adapter::SqlAdapter, postgres::adapter::PgAdapter};
use engine_core::sink::postgres::PostgresSink;
use std::time::Duration;
use tracing::{error, info};

/// Opens the remote row-store connection used by the uploader.
pub async fn connect(
    conn_str: &str,
    call_timeout: Option<Duration>,
) -> Result<PgAdapter, CliError> {
    let adapter = PgAdapter::connect(conn_str).await.map_err(|e| {
        error!("Postgres connection failed: {}", e);
        CliError::Connector(e)
    })?;
    Ok(adapter.with_call_timeout(call_timeout))
}

pub async fn open_sink(
    conn_str: &str,
    call_timeout: Option<Duration>,
) -> Result<PostgresSink, CliError> {
    Ok(PostgresSink::new(connect(conn_str, call_timeout).await?))
}

pub async fn ping(conn_str: &str, call_timeout: Option<Duration>) -> Result<(), CliError> {
    info!("Pinging Postgres");

    let adapter = connect(conn_str, call_timeout).await?;
    adapter.ping().await.map_err(|e| {
        error!("Postgres ping query failed: {}", e);
        CliError::Postgres(e)
    })?;

    info!("Postgres ping succeeded");
    Ok(())
}
