//! Secret collector
//!
//! Fetches every discovered leaf concurrently and funnels each field to a
//! single writer task that owns the sink.
//!
//! Architecture:
//! ```text
//! leaves ──┬── READ /b    ─┐
//!          ├── READ /a/c  ─┼──► mpsc ──► writer task ──► SecretSink
//!          └── READ /n    ─┘    (bounded)  (sole owner)
//! ```
//!
//! Fail-fast: the first fetch error drops the remaining fetches. Fields
//! already handed to the writer are still written; nothing is rolled back.

pub mod sink;

pub use sink::{DirSink, MaterializedSecret, SecretSink};

use crate::context::{RunContext, RunCounters};
use crate::error::{FetchError, MaterializerError, Result, WriteError};
use crate::store::{parse_payload, RequestKind};
use futures::future::try_join_all;
use std::collections::BTreeSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tracing::{debug, info};
use zeroize::Zeroizing;

/// Capacity of the fetch → writer channel
const WRITE_QUEUE_SIZE: usize = 256;

/// Result of one collection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectStats {
    /// Leaves fetched
    pub leaves: usize,
    /// Leaves with an empty or absent payload
    pub empty_leaves: usize,
    /// Fields written to the sink
    pub fields_written: u64,
    /// Value bytes written to the sink
    pub bytes_written: u64,
}

/// Concurrent leaf fetcher writing into a sink
pub struct SecretCollector {
    ctx: RunContext,
}

impl SecretCollector {
    pub fn new(ctx: RunContext) -> Self {
        Self { ctx }
    }

    /// Fetch every leaf and write its fields to `sink`
    ///
    /// Returns once every field has been written, or with the first fetch
    /// or write error.
    pub async fn collect_and_store<S: SecretSink>(
        &self,
        leaves: &BTreeSet<String>,
        sink: S,
    ) -> Result<CollectStats> {
        let (tx, rx) = mpsc::channel::<MaterializedSecret>(WRITE_QUEUE_SIZE);

        let counters = Arc::clone(self.ctx.counters());
        let writer = tokio::task::spawn_blocking(move || writer_loop(sink, rx, counters));

        let fetches = leaves.iter().map(|leaf| self.fetch_leaf(leaf, tx.clone()));
        let fetched = try_join_all(fetches).await;

        // Close the channel so the writer drains and stops
        drop(tx);

        let written = writer.await.map_err(|_| WriteError::WriterClosed)?;

        match (fetched, written) {
            (_, Err(write_err)) => Err(write_err.into()),
            (Err(fetch_err), Ok(_)) => Err(fetch_err),
            (Ok(field_counts), Ok((fields_written, bytes_written))) => Ok(CollectStats {
                leaves: field_counts.len(),
                empty_leaves: field_counts.iter().filter(|&&n| n == 0).count(),
                fields_written,
                bytes_written,
            }),
        }
    }

    /// Fetch one leaf and queue its fields; returns the field count
    async fn fetch_leaf(&self, leaf: &str, tx: Sender<MaterializedSecret>) -> Result<usize> {
        let response = self
            .ctx
            .store()
            .request(leaf, RequestKind::Read)
            .await
            .map_err(|source| FetchError::Transport {
                path: leaf.to_string(),
                source,
            })?;

        let payload = parse_payload(leaf, &response)?;
        self.ctx
            .counters()
            .leaves_fetched
            .fetch_add(1, Ordering::Relaxed);

        if payload.is_empty() {
            debug!("No fields at {}, skipping", leaf);
            return Ok(0);
        }

        let count = payload.len();
        for (name, value) in payload.fields {
            let secret = MaterializedSecret {
                name,
                value: Zeroizing::new(value),
                source: leaf.to_string(),
            };
            tx.send(secret)
                .await
                .map_err(|_| MaterializerError::Write(WriteError::WriterClosed))?;
        }

        Ok(count)
    }
}

/// Writer task: sole owner of the sink
fn writer_loop<S: SecretSink>(
    mut sink: S,
    mut rx: Receiver<MaterializedSecret>,
    counters: Arc<RunCounters>,
) -> std::result::Result<(u64, u64), WriteError> {
    debug!("Writer task started");

    let mut fields = 0u64;
    let mut bytes = 0u64;

    while let Some(secret) = rx.blocking_recv() {
        info!("Writing secret: {}", secret.name);
        debug!("Secret {} comes from {}", secret.name, secret.source);

        sink.write(&secret.name, &secret.value)?;

        let len = secret.value.len() as u64;
        fields += 1;
        bytes += len;
        counters.fields_written.fetch_add(1, Ordering::Relaxed);
        counters.bytes_written.fetch_add(len, Ordering::Relaxed);
    }

    debug!("Writer task finished, wrote {} fields", fields);
    Ok((fields, bytes))
}
