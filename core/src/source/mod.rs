pub mod kafka;

use std::future::Future;

use crate::errors::{CommitError, FetchError};

/// A message received from the source. Ownership moves to the consumption
/// engine on fetch; the source only sees it again when its offset is
/// committed.
#[derive(Debug, Clone)]
pub struct SourceMessage {
    /// Topic or stream name this message was read from.
    pub topic: String,
    /// Partition or shard the message belongs to.
    pub partition: i32,
    /// Position within the partition, used for commit.
    pub offset: i64,
    /// Raw payload bytes, decoded by the engine's decode function.
    pub payload: Vec<u8>,
}

/// An ordered, partitioned log that messages are consumed from.
///
/// `fetch` blocks until a message is available or a terminal condition
/// occurs; the engine imposes deadlines and cancellation on top of it, so
/// implementations only distinguish closed (terminal) from transient
/// (retryable) failures.
pub trait Source: Send + Sync {
    fn fetch(&self) -> impl Future<Output = Result<SourceMessage, FetchError>> + Send;

    /// Marks the given messages as consumed. Called by the engine only after
    /// the processor accepted the batch containing exactly these messages.
    fn commit(
        &self,
        messages: &[SourceMessage],
    ) -> impl Future<Output = Result<(), CommitError>> + Send;
}
