use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Terminal outcomes of a consumption run. These are the only errors
/// `Handler::run` and `BulkHandler::run` ever return; every other failure
/// category is logged and absorbed by the loop.
#[derive(Error, Debug)]
pub enum ConsumeError {
    #[error("message source permanently closed")]
    ReaderClosed,

    #[error("consumption canceled")]
    Canceled,
}

/// Classification of a single fetch attempt against the message source.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The source will never produce another message. Ends the run loop.
    #[error("message source permanently closed")]
    Closed,

    /// A retryable fault. The engine logs it and fetches again without
    /// advancing the batch.
    #[error("transient fetch failure: {0}")]
    Transient(BoxError),
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }
}

/// Failure to mark a set of messages as consumed. Never retried and never
/// surfaced from the run loop; the cost is possible duplicate processing on
/// redelivery, not message loss.
#[derive(Error, Debug)]
#[error("offset commit failed: {0}")]
pub struct CommitError(pub BoxError);

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid configuration: {message}")]
    Invalid { message: String },

    #[error("missing required field: {field}")]
    MissingField { field: String },

    #[error("failed to load configuration from {path}: {error}")]
    LoadFailed { path: String, error: BoxError },
}
