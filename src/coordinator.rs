//! Run coordinator
//!
//! Drives one materialization end to end:
//!
//! ```text
//! RunConfig ─► token (override | exchange)
//!           ─► HttpGateway (token, CA bundle, limits)
//!           ─► TreeWalker::discover_leaves("/")
//!           ─► empty check (--require-secrets)
//!           ─► SecretCollector::collect_and_store(leaves, DirSink)
//! ```

use crate::auth::acquire_token;
use crate::collector::{DirSink, SecretCollector};
use crate::config::RunConfig;
use crate::context::{RunContext, RunCounters, RunProgress};
use crate::error::{MaterializerError, Result};
use crate::store::{HttpGatewayBuilder, SecretStore};
use crate::walker::TreeWalker;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Root of the walk, relative to `<mount>/<group>/`
pub const WALK_ROOT: &str = "/";

/// Result of one run
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub dirs_listed: u64,
    pub leaves: usize,
    pub empty_leaves: usize,
    pub fields_written: u64,
    pub bytes_written: u64,
    pub duration: Duration,
}

/// Coordinates one materialization run
pub struct RunCoordinator {
    config: RunConfig,
    counters: Arc<RunCounters>,
}

impl RunCoordinator {
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            counters: Arc::new(RunCounters::default()),
        }
    }

    pub fn progress(&self, elapsed: Duration) -> RunProgress {
        self.counters.snapshot(elapsed)
    }

    /// Authenticate, build the HTTP gateway and run
    pub async fn run(&self) -> Result<RunStats> {
        info!("Using secret store at {}", self.config.store_addr);

        // Trust anchors are loaded before any network call
        let anchors = self.config.load_trust_anchors()?;
        if !anchors.is_empty() {
            info!("Loaded {} custom CA certificate(s)", anchors.len());
        }

        let token = acquire_token(&self.config.token_source, self.config.timeout).await?;

        let gateway = HttpGatewayBuilder::new(
            self.config.store_addr.base_url()?,
            self.config.mount.clone(),
            self.config.group.clone(),
            token,
        )
        .timeout(self.config.timeout)
        .retries(self.config.retry_count)
        .max_in_flight(self.config.max_in_flight)
        .trust_anchors(anchors)
        .build()?;

        self.run_with_store(Arc::new(gateway)).await
    }

    /// Run against an already authenticated store
    pub async fn run_with_store(&self, store: Arc<dyn SecretStore>) -> Result<RunStats> {
        let start = Instant::now();
        let ctx = RunContext::with_counters(store, self.config.max_depth, Arc::clone(&self.counters));

        info!("Discovering secrets under {}", ctx.store().describe(WALK_ROOT));
        let walker = TreeWalker::new(ctx.clone());
        let leaves = walker.discover_leaves(WALK_ROOT).await?;
        info!("Discovered {} secret(s)", leaves.len());

        if leaves.is_empty() {
            if self.config.require_secrets {
                return Err(MaterializerError::EmptyResult {
                    root: ctx.store().describe(WALK_ROOT),
                });
            }
            warn!("No secrets found under {}", ctx.store().describe(WALK_ROOT));
        }

        let sink = DirSink::create(&self.config.output_dir)?;
        info!("Writing secrets to {}", sink.path().display());

        let collector = SecretCollector::new(ctx.clone());
        let collected = collector.collect_and_store(&leaves, sink).await?;

        Ok(RunStats {
            dirs_listed: self.counters.snapshot(start.elapsed()).dirs_listed,
            leaves: collected.leaves,
            empty_leaves: collected.empty_leaves,
            fields_written: collected.fields_written,
            bytes_written: collected.bytes_written,
            duration: start.elapsed(),
        })
    }

    /// Run while reporting progress every 100ms
    pub async fn run_with_progress<F>(&self, progress_callback: F) -> Result<RunStats>
    where
        F: Fn(RunProgress) + Send + 'static,
    {
        let start = Instant::now();
        let counters = Arc::clone(&self.counters);

        let reporter = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(100));
            loop {
                ticker.tick().await;
                progress_callback(counters.snapshot(start.elapsed()));
            }
        });

        let result = self.run().await;
        reporter.abort();

        result
    }
}
