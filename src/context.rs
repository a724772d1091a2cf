//! Run context shared by the walker and the collector
//!
//! Holds everything an operation needs for one run: the store gateway, the
//! walk guard and the live counters. It is cheap to clone and never mutated
//! after construction; the counters are atomics.

use crate::store::SecretStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Live counters for one run
#[derive(Debug, Default)]
pub struct RunCounters {
    pub dirs_listed: AtomicU64,
    pub leaves_found: AtomicU64,
    pub leaves_fetched: AtomicU64,
    pub fields_written: AtomicU64,
    pub bytes_written: AtomicU64,
}

impl RunCounters {
    /// Take a snapshot for display
    pub fn snapshot(&self, elapsed: Duration) -> RunProgress {
        RunProgress {
            dirs_listed: self.dirs_listed.load(Ordering::Relaxed),
            leaves_found: self.leaves_found.load(Ordering::Relaxed),
            leaves_fetched: self.leaves_fetched.load(Ordering::Relaxed),
            fields_written: self.fields_written.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            elapsed,
        }
    }
}

/// Progress information for display
#[derive(Debug, Clone, Default)]
pub struct RunProgress {
    pub dirs_listed: u64,
    pub leaves_found: u64,
    pub leaves_fetched: u64,
    pub fields_written: u64,
    pub bytes_written: u64,
    pub elapsed: Duration,
}

/// Immutable per-run context
#[derive(Clone)]
pub struct RunContext {
    store: Arc<dyn SecretStore>,
    max_depth: usize,
    counters: Arc<RunCounters>,
}

impl RunContext {
    pub fn new(store: Arc<dyn SecretStore>, max_depth: usize) -> Self {
        Self::with_counters(store, max_depth, Arc::new(RunCounters::default()))
    }

    /// Context reporting into existing counters
    pub fn with_counters(store: Arc<dyn SecretStore>, max_depth: usize, counters: Arc<RunCounters>) -> Self {
        Self {
            store,
            max_depth,
            counters,
        }
    }

    pub fn store(&self) -> &dyn SecretStore {
        self.store.as_ref()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn counters(&self) -> &Arc<RunCounters> {
        &self.counters
    }
}
