pub mod config;
pub mod errors;
pub mod handler;
pub mod source;
pub mod telemetry;

pub use config::{ConsumeConfig, KafkaOptions, ProcessingConfig};
pub use errors::{CommitError, ConsumeError, FetchError};
pub use handler::{Batch, BatchProcessor, BulkHandler, Handler, Processor};
pub use source::{Source, SourceMessage};
