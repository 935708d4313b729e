use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConsumeConfig {
    pub kafka: KafkaOptions,
    #[serde(default)]
    pub processing: ProcessingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KafkaOptions {
    pub bootstrap_servers: String,
    pub topic: String,
    pub consumer_group: String,
    pub security_protocol: Option<String>,
    pub sasl_mechanisms: Option<String>,
    pub sasl_username: Option<String>,
    pub sasl_password: Option<String>,
    pub ssl_ca_location: Option<String>,
    pub auto_offset_reset: Option<String>,
    pub session_timeout_ms: Option<u32>,
    pub heartbeat_interval_ms: Option<u32>,
}

/// Bounds of the accumulation window: a batch is ready when it holds
/// `batch_size` messages or `batch_timeout_ms` has elapsed, whichever
/// comes first.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProcessingConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_batch_timeout_ms")]
    pub batch_timeout_ms: u64,
}

fn default_batch_size() -> usize {
    10
}

fn default_batch_timeout_ms() -> u64 {
    1000
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            batch_timeout_ms: default_batch_timeout_ms(),
        }
    }
}

impl ProcessingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.batch_timeout_ms)
    }
}

pub fn load_config(config_path: Option<&str>) -> Result<ConsumeConfig, ConfigError> {
    match config_path {
        Some(path) => ConsumeConfig::from_file(path),
        None => ConsumeConfig::from_env(),
    }
}

impl ConsumeConfig {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.to_string(),
            error: Box::new(e),
        })?;
        serde_yaml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
            path: path.to_string(),
            error: Box::new(e),
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let content = std::env::var("CONSUME_CONFIG").map_err(|_| ConfigError::MissingField {
            field: "CONSUME_CONFIG".to_string(),
        })?;
        serde_yaml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
            path: "CONSUME_CONFIG".to_string(),
            error: Box::new(e),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.kafka.bootstrap_servers.is_empty() {
            return Err(ConfigError::MissingField {
                field: "kafka.bootstrap_servers".to_string(),
            });
        }
        if self.kafka.topic.is_empty() {
            return Err(ConfigError::MissingField {
                field: "kafka.topic".to_string(),
            });
        }
        if self.kafka.consumer_group.is_empty() {
            return Err(ConfigError::MissingField {
                field: "kafka.consumer_group".to_string(),
            });
        }
        if self.processing.batch_size == 0 {
            return Err(ConfigError::Invalid {
                message: "processing.batch_size must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
kafka:
  bootstrap_servers: "localhost:9092"
  topic: "financial-transactions"
  consumer_group: "txn-consumers"
  auto_offset_reset: "earliest"
processing:
  batch_size: 50
"#;

    #[test]
    fn parses_yaml_and_fills_defaults() {
        let config: ConsumeConfig = serde_yaml::from_str(SAMPLE).unwrap();
        assert_eq!(config.kafka.topic, "financial-transactions");
        assert_eq!(config.processing.batch_size, 50);
        // batch_timeout_ms was omitted and falls back to the default
        assert_eq!(config.processing.batch_timeout_ms, 1000);
        assert_eq!(config.processing.interval(), Duration::from_millis(1000));
        assert!(config.kafka.sasl_username.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = ConsumeConfig::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.kafka.consumer_group, "txn-consumers");
    }

    #[test]
    fn missing_file_is_a_load_error() {
        let err = ConsumeConfig::from_file("/nonexistent/consume.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::LoadFailed { .. }));
    }

    #[test]
    fn rejects_empty_required_fields() {
        let mut config: ConsumeConfig = serde_yaml::from_str(SAMPLE).unwrap();
        config.kafka.topic = String::new();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingField { .. })
        ));
    }

    #[test]
    fn rejects_zero_batch_size() {
        let mut config: ConsumeConfig = serde_yaml::from_str(SAMPLE).unwrap();
        config.processing.batch_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }
}
