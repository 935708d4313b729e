use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "consume_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Per-engine counters. Updated from the run loop only, but readable from any
/// thread while the loop is running, hence the atomics.
#[derive(Debug, Default)]
pub struct ConsumeMetrics {
    pub(crate) messages_fetched: AtomicU64,
    pub(crate) fetch_retries: AtomicU64,
    pub(crate) decode_failures: AtomicU64,
    pub(crate) batches_processed: AtomicU64,
    pub(crate) process_failures: AtomicU64,
    pub(crate) commits: AtomicU64,
    pub(crate) commit_failures: AtomicU64,
}

impl ConsumeMetrics {
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_fetched: self.messages_fetched.load(Ordering::Relaxed),
            fetch_retries: self.fetch_retries.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            batches_processed: self.batches_processed.load(Ordering::Relaxed),
            process_failures: self.process_failures.load(Ordering::Relaxed),
            commits: self.commits.load(Ordering::Relaxed),
            commit_failures: self.commit_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub messages_fetched: u64,
    pub fetch_retries: u64,
    pub decode_failures: u64,
    pub batches_processed: u64,
    pub process_failures: u64,
    pub commits: u64,
    pub commit_failures: u64,
}
