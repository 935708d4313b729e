pub mod bulk;
pub mod single;

#[cfg(test)]
pub(crate) mod testing;

pub use bulk::BulkHandler;
pub use single::Handler;

use std::future::Future;

use serde::de::DeserializeOwned;
use tracing::error;

use crate::source::SourceMessage;

/// Decodes a raw payload into the handler's value type. Configured before the
/// run starts; decode failures are logged and the message is skipped.
pub type DecodeFn<T> = Box<dyn Fn(&[u8]) -> anyhow::Result<T> + Send + Sync>;

pub(crate) fn json_decode_fn<T: DeserializeOwned>() -> DecodeFn<T> {
    Box::new(|payload| Ok(serde_json::from_slice(payload)?))
}

/// Caller-supplied sink for the single-message policy. A returned error means
/// the message's offset is not committed and it will be redelivered, so
/// implementations must tolerate duplicates.
pub trait Processor<T>: Send + Sync {
    fn process(
        &self,
        message: &SourceMessage,
        value: T,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// Caller-supplied sink for the bulk policy. Same redelivery contract as
/// `Processor`, applied to the whole batch.
pub trait BatchProcessor<T>: Send + Sync {
    fn process(
        &self,
        messages: &[SourceMessage],
        values: &[T],
    ) -> impl Future<Output = anyhow::Result<()>> + Send;
}

impl<T, P> Processor<T> for std::sync::Arc<P>
where
    P: Processor<T>,
{
    fn process(
        &self,
        message: &SourceMessage,
        value: T,
    ) -> impl Future<Output = anyhow::Result<()>> + Send {
        (**self).process(message, value)
    }
}

impl<T, P> BatchProcessor<T> for std::sync::Arc<P>
where
    P: BatchProcessor<T>,
{
    fn process(
        &self,
        messages: &[SourceMessage],
        values: &[T],
    ) -> impl Future<Output = anyhow::Result<()>> + Send {
        (**self).process(messages, values)
    }
}

/// One accumulation cycle's worth of messages with their decoded values,
/// index-aligned. Insertion is pair-wise only, so the two sequences can never
/// diverge in length.
pub struct Batch<T> {
    messages: Vec<SourceMessage>,
    values: Vec<T>,
}

impl<T> Batch<T> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            messages: Vec::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn push(&mut self, message: SourceMessage, value: T) {
        self.messages.push(message);
        self.values.push(value);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[SourceMessage] {
        &self.messages
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }
}

pub(crate) fn log_message_error(
    context: &'static str,
    err: &dyn std::fmt::Display,
    message: &SourceMessage,
) {
    error!(
        topic = %message.topic,
        partition = message.partition,
        offset = message.offset,
        error = %err,
        "{context}"
    );
}

pub(crate) fn log_batch_error(
    context: &'static str,
    err: &dyn std::fmt::Display,
    messages: &[SourceMessage],
) {
    let first = &messages[0];
    let last = &messages[messages.len() - 1];
    error!(
        topic = %first.topic,
        partition = first.partition,
        msg_count = messages.len(),
        start_offset = first.offset,
        end_offset = last.offset,
        error = %err,
        "{context}"
    );
}
