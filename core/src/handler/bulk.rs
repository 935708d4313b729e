use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio::time::{Instant, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use super::{Batch, BatchProcessor, DecodeFn, json_decode_fn, log_batch_error};
use crate::errors::{ConsumeError, FetchError};
use crate::source::Source;
use crate::telemetry::ConsumeMetrics;

pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// Bulk consumption engine: accumulates messages into count- and
/// time-bounded batches, hands each batch to the processor, and commits the
/// batch's offsets only after the processor accepts it.
///
/// Configuration happens through the consuming builder methods before `run`
/// is called; `run` borrows the handler for its whole duration, so the
/// configuration cannot change mid-run.
pub struct BulkHandler<T, P> {
    processor: P,
    decode_fn: DecodeFn<T>,
    batch_size: usize,
    interval: Duration,
    closed: AtomicBool,
    metrics: ConsumeMetrics,
}

impl<T, P> BulkHandler<T, P>
where
    T: Send + Sync,
    P: BatchProcessor<T>,
{
    /// Creates a handler that decodes payloads as JSON. Use
    /// [`with_decode_fn`](Self::with_decode_fn) for other encodings.
    pub fn new(processor: P) -> Self
    where
        T: DeserializeOwned,
    {
        Self {
            processor,
            decode_fn: json_decode_fn(),
            batch_size: DEFAULT_BATCH_SIZE,
            interval: DEFAULT_INTERVAL,
            closed: AtomicBool::new(false),
            metrics: ConsumeMetrics::default(),
        }
    }

    pub fn with_decode_fn(
        mut self,
        decode_fn: impl Fn(&[u8]) -> anyhow::Result<T> + Send + Sync + 'static,
    ) -> Self {
        self.decode_fn = Box::new(decode_fn);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn metrics(&self) -> &ConsumeMetrics {
        &self.metrics
    }

    /// Requests shutdown. Idempotent and callable from any thread. The flag
    /// is observed at the top of each loop iteration, so an in-flight
    /// accumulate/process/commit cycle always completes first; cancel the
    /// token passed to `run` if an outstanding fetch must be interrupted.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Drives accumulate -> process -> commit until `close` is observed
    /// (returns `Ok`), the source closes, or `shutdown` is canceled.
    pub async fn run<S: Source>(
        &self,
        source: &S,
        shutdown: CancellationToken,
    ) -> Result<(), ConsumeError> {
        while !self.closed.load(Ordering::SeqCst) {
            let (batch, terminal) = self.accumulate(source, &shutdown).await;
            if let Some(err) = terminal {
                return Err(err);
            }
            if batch.is_empty() {
                continue;
            }
            if let Err(err) = self.processor.process(batch.messages(), batch.values()).await {
                self.metrics.process_failures.fetch_add(1, Ordering::Relaxed);
                log_batch_error("bulk processing failed", &err, batch.messages());
                continue;
            }
            self.metrics.batches_processed.fetch_add(1, Ordering::Relaxed);
            match source.commit(batch.messages()).await {
                Ok(()) => {
                    self.metrics.commits.fetch_add(1, Ordering::Relaxed);
                }
                Err(err) => {
                    self.metrics.commit_failures.fetch_add(1, Ordering::Relaxed);
                    log_batch_error(
                        "batch processed but offset commit failed",
                        &err,
                        batch.messages(),
                    );
                }
            }
        }
        Ok(())
    }

    /// Builds one batch, fetching until `batch_size` messages are decoded or
    /// `interval` elapses. A terminal outcome is returned alongside whatever
    /// was accumulated so far; the partial batch is left uncommitted and the
    /// source redelivers it.
    async fn accumulate<S: Source>(
        &self,
        source: &S,
        shutdown: &CancellationToken,
    ) -> (Batch<T>, Option<ConsumeError>) {
        let mut batch = Batch::with_capacity(self.batch_size);
        let deadline = Instant::now() + self.interval;

        while batch.len() < self.batch_size {
            let fetched = tokio::select! {
                _ = shutdown.cancelled() => return (batch, Some(ConsumeError::Canceled)),
                fetched = timeout_at(deadline, source.fetch()) => fetched,
            };
            let message = match fetched {
                // Window elapsed: flush whatever was accumulated.
                Err(_) => break,
                Ok(Err(FetchError::Closed)) => return (batch, Some(ConsumeError::ReaderClosed)),
                Ok(Err(err)) => {
                    self.metrics.fetch_retries.fetch_add(1, Ordering::Relaxed);
                    warn!(error = %err, "message fetch failed, retrying");
                    continue;
                }
                Ok(Ok(message)) => message,
            };
            self.metrics.messages_fetched.fetch_add(1, Ordering::Relaxed);
            match (self.decode_fn)(&message.payload) {
                Ok(value) => batch.push(message, value),
                Err(err) => {
                    self.metrics.decode_failures.fetch_add(1, Ordering::Relaxed);
                    error!(
                        topic = %message.topic,
                        partition = message.partition,
                        offset = message.offset,
                        error = %err,
                        "failed to decode message payload, skipping"
                    );
                }
            }
        }
        (batch, None)
    }
}
