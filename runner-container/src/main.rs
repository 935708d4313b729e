use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use consume_core::config::load_config;
use consume_core::errors::ConsumeError;
use consume_core::handler::{BatchProcessor, BulkHandler};
use consume_core::source::SourceMessage;
use consume_core::source::kafka::KafkaSource;
use consume_core::telemetry::init_tracing;

/// Processor used by the standalone runner: logs every batch it receives.
/// Real deployments embed `consume-core` as a library and supply their own
/// processor; this binary exists to run a topic end to end from a config
/// file.
struct LogProcessor;

impl BatchProcessor<serde_json::Value> for LogProcessor {
    async fn process(
        &self,
        messages: &[SourceMessage],
        values: &[serde_json::Value],
    ) -> Result<()> {
        let first = &messages[0];
        let last = &messages[messages.len() - 1];
        info!(
            topic = %first.topic,
            msg_count = messages.len(),
            start_offset = first.offset,
            end_offset = last.offset,
            "consumed batch"
        );
        for value in values {
            debug!(%value, "decoded message");
        }
        Ok(())
    }
}

/// Entry point for running a long-lived consumption job on container hosting
/// services like AWS EKS, ECS, etc. Loads config from the path given as the
/// first argument (or the CONSUME_CONFIG environment variable), consumes the
/// configured topic until a shutdown signal arrives.
///
/// The first ctrl-c drains: the in-flight batch finishes its process/commit
/// cycle before the loop exits. A second ctrl-c cancels the outstanding
/// fetch as well.
#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let path = std::env::args().nth(1);
    let config = load_config(path.as_deref())?;
    config.validate()?;

    let source = KafkaSource::new(&config.kafka)?;
    let handler: Arc<BulkHandler<serde_json::Value, _>> = Arc::new(
        BulkHandler::new(LogProcessor)
            .with_batch_size(config.processing.batch_size)
            .with_interval(config.processing.interval()),
    );

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let handler = handler.clone();
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received, draining in-flight batch");
                handler.close();
            }
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("second shutdown signal, canceling outstanding fetch");
                shutdown.cancel();
            }
        }
    });

    let result = handler.run(&source, shutdown).await;
    info!(counters = ?handler.metrics().snapshot(), "consumption stopped");
    match result {
        Ok(()) | Err(ConsumeError::Canceled) => Ok(()),
        Err(err @ ConsumeError::ReaderClosed) => Err(err.into()),
    }
}
