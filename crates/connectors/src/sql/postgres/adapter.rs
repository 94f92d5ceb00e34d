use crate::sql::{
    base::{
        adapter::SqlAdapter,
        error::{ConnectorError, DbError},
    },
    postgres::utils::connect_client,
};
use async_trait::async_trait;
use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tokio::sync::{RwLock, RwLockReadGuard};
use tokio_postgres::{Client, types::ToSql};
use tracing::{debug, info, warn};

/// Postgres connection that reopens itself after the socket is lost.
///
/// A call that fails with a broken connection marks the adapter; the next call
/// reconnects with the original URL before it runs.
#[derive(Clone)]
pub struct PgAdapter {
    url: Arc<str>,
    client: Arc<RwLock<Client>>,
    broken: Arc<AtomicBool>,
    call_timeout: Option<Duration>,
}

impl PgAdapter {
    /// Bounds every statement by `timeout`. Elapsed calls fail with `DbError::Timeout`.
    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }

    fn needs_reconnect(&self, client: &Client) -> bool {
        client.is_closed() || self.broken.load(Ordering::Acquire)
    }

    async fn client(&self) -> Result<RwLockReadGuard<'_, Client>, DbError> {
        {
            let client = self.client.read().await;
            if !self.needs_reconnect(&client) {
                return Ok(client);
            }
        }
        self.reconnect().await?;
        Ok(self.client.read().await)
    }

    async fn reconnect(&self) -> Result<(), DbError> {
        let mut client = self.client.write().await;
        // Another caller may have reconnected while this one waited.
        if !self.needs_reconnect(&client) {
            return Ok(());
        }

        warn!("Postgres connection lost, reconnecting");
        *client = connect_client(&self.url).await?;
        self.broken.store(false, Ordering::Release);
        info!("Reconnected to Postgres");
        Ok(())
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, DbError>
    where
        F: Future<Output = Result<T, tokio_postgres::Error>>,
    {
        let result = match self.call_timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| DbError::Timeout(limit))?
                .map_err(DbError::from),
            None => fut.await.map_err(DbError::from),
        };

        if let Err(err) = &result {
            if err.breaks_connection() {
                warn!(error = %err, "Postgres connection is unusable");
                self.broken.store(true, Ordering::Release);
            }
        }
        result
    }
}

#[async_trait]
impl SqlAdapter for PgAdapter {
    async fn connect(url: &str) -> Result<Self, ConnectorError> {
        let client = Arc::new(RwLock::new(connect_client(url).await?));
        Ok(PgAdapter {
            url: Arc::from(url),
            client,
            broken: Arc::new(AtomicBool::new(false)),
            call_timeout: None,
        })
    }

    async fn exec_json(&self, query: &str, payload: serde_json::Value) -> Result<u64, DbError> {
        debug!(sql = %query, "Executing statement");
        let client = self.client().await?;
        let params: [&(dyn ToSql + Sync); 1] = [&payload];
        self.bounded(client.execute(query, &params)).await
    }

    async fn ping(&self) -> Result<(), DbError> {
        let client = self.client().await?;
        self.bounded(client.simple_query("SELECT 1")).await?;
        Ok(())
    }
}
