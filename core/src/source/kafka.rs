use std::collections::HashMap;

use anyhow::{Context, Result};
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::Message;
use rdkafka::types::RDKafkaErrorCode;
use rdkafka::{ClientConfig, Offset, TopicPartitionList};
use tracing::{debug, info};

use crate::config::KafkaOptions;
use crate::errors::{CommitError, FetchError};
use crate::source::{Source, SourceMessage};

/// Kafka-backed message source. Offsets are committed manually by the
/// consumption engine, never auto-committed.
pub struct KafkaSource {
    consumer: StreamConsumer,
}

impl KafkaSource {
    pub fn new(options: &KafkaOptions) -> Result<Self> {
        let mut client_config = ClientConfig::new();

        client_config
            .set("bootstrap.servers", &options.bootstrap_servers)
            .set("group.id", &options.consumer_group)
            .set("enable.partition.eof", "false")
            .set("enable.auto.commit", "false")
            .set(
                "auto.offset.reset",
                options.auto_offset_reset.as_deref().unwrap_or("earliest"),
            );

        if let Some(timeout) = options.session_timeout_ms {
            client_config.set("session.timeout.ms", timeout.to_string());
        }

        if let Some(heartbeat) = options.heartbeat_interval_ms {
            client_config.set("heartbeat.interval.ms", heartbeat.to_string());
        }

        if let Some(security_protocol) = &options.security_protocol {
            client_config.set("security.protocol", security_protocol);
        }

        if let Some(sasl_mechanisms) = &options.sasl_mechanisms {
            client_config.set("sasl.mechanisms", sasl_mechanisms);
        }

        if let Some(sasl_username) = &options.sasl_username {
            client_config.set("sasl.username", sasl_username);
        }

        if let Some(sasl_password) = &options.sasl_password {
            client_config.set("sasl.password", sasl_password);
        }

        if let Some(ssl_ca_location) = &options.ssl_ca_location {
            client_config.set("ssl.ca.location", ssl_ca_location);
        }

        let consumer: StreamConsumer = client_config
            .create()
            .context("failed to create kafka consumer")?;

        consumer
            .subscribe(&[options.topic.as_str()])
            .context("failed to subscribe to kafka topic")?;

        info!("subscribed to kafka topic: {}", options.topic);
        Ok(Self { consumer })
    }
}

impl Source for KafkaSource {
    async fn fetch(&self) -> std::result::Result<SourceMessage, FetchError> {
        match self.consumer.recv().await {
            Ok(message) => {
                debug!(
                    partition = message.partition(),
                    offset = message.offset(),
                    "received message"
                );
                Ok(SourceMessage {
                    topic: message.topic().to_string(),
                    partition: message.partition(),
                    offset: message.offset(),
                    payload: message.payload().map(|p| p.to_vec()).unwrap_or_default(),
                })
            }
            Err(err) => Err(classify_fetch_error(err)),
        }
    }

    async fn commit(&self, messages: &[SourceMessage]) -> std::result::Result<(), CommitError> {
        if messages.is_empty() {
            return Ok(());
        }

        // Commit the high-water offset + 1 per partition.
        let mut offsets: HashMap<(&str, i32), i64> = HashMap::new();
        for message in messages {
            let entry = offsets
                .entry((message.topic.as_str(), message.partition))
                .or_insert(message.offset);
            if message.offset > *entry {
                *entry = message.offset;
            }
        }

        let mut tpl = TopicPartitionList::new();
        for ((topic, partition), offset) in &offsets {
            tpl.add_partition_offset(topic, *partition, Offset::Offset(offset + 1))
                .map_err(|e| CommitError(Box::new(e)))?;
        }

        self.consumer
            .commit(&tpl, CommitMode::Sync)
            .map_err(|e| CommitError(Box::new(e)))?;

        debug!(partitions = offsets.len(), "committed offsets");
        Ok(())
    }
}

/// Fatal consumer errors mean librdkafka has given up on the consumer; no
/// fetch will ever succeed again. Everything else is worth retrying.
fn classify_fetch_error(err: KafkaError) -> FetchError {
    match err.rdkafka_error_code() {
        Some(RDKafkaErrorCode::Fatal) => FetchError::Closed,
        _ => FetchError::Transient(Box::new(err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdkafka::producer::{FutureProducer, FutureRecord};
    use std::time::Duration;

    const TEST_TOPIC: &str = "consume-core-test";
    const TEST_GROUP: &str = "consume-core-test-group";
    const KAFKA_BOOTSTRAP_SERVERS: &str = "localhost:9092";

    fn test_options() -> KafkaOptions {
        KafkaOptions {
            bootstrap_servers: KAFKA_BOOTSTRAP_SERVERS.to_string(),
            topic: TEST_TOPIC.to_string(),
            consumer_group: TEST_GROUP.to_string(),
            security_protocol: None,
            sasl_mechanisms: None,
            sasl_username: None,
            sasl_password: None,
            ssl_ca_location: None,
            auto_offset_reset: Some("earliest".to_string()),
            session_timeout_ms: Some(6000),
            heartbeat_interval_ms: None,
        }
    }

    async fn produce_messages(count: usize) {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", KAFKA_BOOTSTRAP_SERVERS)
            .set("message.timeout.ms", "5000")
            .create()
            .expect("failed to create producer");

        for i in 0..count {
            let payload = format!(r#"{{"seq":{i}}}"#);
            let key = i.to_string();
            producer
                .send(
                    FutureRecord::to(TEST_TOPIC).payload(&payload).key(&key),
                    Duration::from_secs(5),
                )
                .await
                .expect("failed to send message");
        }
    }

    #[tokio::test]
    #[ignore = "requires a kafka broker on localhost:9092"]
    async fn fetches_and_commits_against_live_broker() {
        produce_messages(3).await;

        let source = KafkaSource::new(&test_options()).expect("failed to create source");

        let mut fetched = Vec::new();
        for _ in 0..3 {
            let message = tokio::time::timeout(Duration::from_secs(30), source.fetch())
                .await
                .expect("timed out waiting for message")
                .expect("fetch failed");
            fetched.push(message);
        }

        assert!(fetched.windows(2).all(|w| {
            w[0].partition != w[1].partition || w[0].offset < w[1].offset
        }));

        source.commit(&fetched).await.expect("commit failed");
    }
}
