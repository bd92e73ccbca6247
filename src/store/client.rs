//! Resilient store client: bounded retry with backoff plus a short-TTL
//! per-table read cache.
//!
//! Every backend call runs through [`with_retry`]; reads additionally go
//! through a cache keyed by table name so a burst of handler activity does
//! not translate into a burst of API round trips. Writes invalidate the
//! affected table's entry immediately after success.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::store::traits::TableBackend;

/// Maximum attempts per backend call.
const RETRY_ATTEMPTS: u32 = 4;

/// First backoff delay; doubles each attempt.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Run a backend call with bounded exponential backoff.
///
/// Transient faults (rate limit, unavailable, connection errors) are retried
/// up to [`RETRY_ATTEMPTS`] times; any other fault raises immediately.
pub async fn with_retry<T, F, Fut>(op: &str, mut call: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut delay = RETRY_BASE_DELAY;
    let mut attempt = 1;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < RETRY_ATTEMPTS => {
                warn!(
                    op,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "transient store fault; backing off"
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

struct CacheEntry {
    rows: Arc<Vec<Vec<String>>>,
    fetched_at: Instant,
}

/// Retrying, caching wrapper around a [`TableBackend`].
pub struct ResilientTables {
    backend: Arc<dyn TableBackend>,
    ttl: Duration,
    cache: Mutex<HashMap<String, CacheEntry>>,
}

impl ResilientTables {
    pub fn new(backend: Arc<dyn TableBackend>, ttl: Duration) -> Self {
        Self {
            backend,
            ttl,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Read a table, serving from cache while the snapshot is fresh.
    pub async fn read(&self, table: &str) -> Result<Arc<Vec<Vec<String>>>, StoreError> {
        {
            let cache = self.cache.lock().await;
            if let Some(entry) = cache.get(table)
                && entry.fetched_at.elapsed() <= self.ttl
            {
                return Ok(Arc::clone(&entry.rows));
            }
        }

        let rows = Arc::new(with_retry(table, || self.backend.read_all(table)).await?);
        debug!(table, rows = rows.len(), "table snapshot refreshed");

        let mut cache = self.cache.lock().await;
        cache.insert(
            table.to_string(),
            CacheEntry {
                rows: Arc::clone(&rows),
                fetched_at: Instant::now(),
            },
        );
        Ok(rows)
    }

    /// Overwrite a single cell and invalidate the table's snapshot.
    pub async fn update_cell(
        &self,
        table: &str,
        row: u32,
        col: u32,
        value: &str,
    ) -> Result<(), StoreError> {
        with_retry(table, || self.backend.update_cell(table, row, col, value)).await?;
        self.invalidate(table).await;
        Ok(())
    }

    /// Append a row and invalidate the table's snapshot.
    pub async fn append_row(&self, table: &str, values: &[String]) -> Result<(), StoreError> {
        with_retry(table, || self.backend.append_row(table, values)).await?;
        self.invalidate(table).await;
        Ok(())
    }

    /// Drop the cached snapshot for one table.
    pub async fn invalidate(&self, table: &str) {
        self.cache.lock().await.remove(table);
    }
}
