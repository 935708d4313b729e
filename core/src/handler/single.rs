use std::sync::atomic::{AtomicBool, Ordering};

use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::{DecodeFn, Processor, json_decode_fn, log_message_error};
use crate::errors::{ConsumeError, FetchError};
use crate::source::Source;
use crate::telemetry::ConsumeMetrics;

/// Single-message consumption engine: the degenerate batch of one, with no
/// accumulation window. Each fetch blocks until a message is available or a
/// terminal condition occurs; the message is decoded, processed and its
/// offset committed before the next fetch starts.
pub struct Handler<T, P> {
    processor: P,
    decode_fn: DecodeFn<T>,
    closed: AtomicBool,
    metrics: ConsumeMetrics,
}

impl<T, P> Handler<T, P>
where
    T: Send + Sync,
    P: Processor<T>,
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

    pub fn metrics(&self) -> &ConsumeMetrics {
        &self.metrics
    }

    /// Requests shutdown. Idempotent and callable from any thread; observed
    /// at the top of each loop iteration, so an in-flight message always
    /// finishes its process/commit cycle. An outstanding blocking fetch is
    /// only interrupted by canceling the token passed to `run`.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Consumes one message at a time until `close` is observed (returns
    /// `Ok`), the source closes, or `shutdown` is canceled.
    pub async fn run<S: Source>(
        &self,
        source: &S,
        shutdown: CancellationToken,
    ) -> Result<(), ConsumeError> {
        while !self.closed.load(Ordering::SeqCst) {
            let fetched = tokio::select! {
                _ = shutdown.cancelled() => return Err(ConsumeError::Canceled),
                fetched = source.fetch() => fetched,
            };
            let message = match fetched {
                Err(FetchError::Closed) => return Err(ConsumeError::ReaderClosed),
                Err(err) => {
                    self.metrics.fetch_retries.fetch_add(1, Ordering::Relaxed);
                    warn!(error = %err, "message fetch failed, retrying");
                    continue;
                }
                Ok(message) => message,
            };
            self.metrics.messages_fetched.fetch_add(1, Ordering::Relaxed);

            let value = match (self.decode_fn)(&message.payload) {
                Ok(value) => value,
                Err(err) => {
                    self.metrics.decode_failures.fetch_add(1, Ordering::Relaxed);
                    log_message_error("failed to decode message payload, skipping", &err, &message);
                    continue;
                }
            };

            if let Err(err) = self.processor.process(&message, value).await {
                self.metrics.process_failures.fetch_add(1, Ordering::Relaxed);
                log_message_error("message processing failed", &err, &message);
                continue;
            }

            match source.commit(std::slice::from_ref(&message)).await {
                Ok(()) => {
                    self.metrics.commits.fetch_add(1, Ordering::Relaxed);
                }
                Err(err) => {
                    self.metrics.commit_failures.fetch_add(1, Ordering::Relaxed);
                    log_message_error("message processed but offset commit failed", &err, &message);
                }
            }
        }
        Ok(())
    }
}
