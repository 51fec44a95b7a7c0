//! Durable log producer abstraction: trait, errors, and backend factory.

pub mod config;
#[cfg(feature = "log-kafka")]
pub mod kafka;
#[cfg(any(test, feature = "log-memory"))]
pub mod memory;

use bytes::Bytes;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Kafka,
    Memory,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Kafka => f.write_str("kafka"),
            Backend::Memory => f.write_str("memory"),
        }
    }
}

/// Where and how to connect. `params` are passed through to the backend
/// client verbatim (e.g. librdkafka properties).
#[derive(Clone, Debug, Default)]
pub struct ConnectOptions {
    pub bootstrap_servers: String,
    pub topic: String,
    pub params: BTreeMap<String, String>,
}

#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("connect: {0}")]
    Connect(String),
    #[error("publish: {0}")]
    Publish(String),
    #[error("other: {0}")]
    Other(String),
}

/// Producer side of the durable log. Delivery failures are opaque to callers.
#[async_trait::async_trait]
pub trait LogProducer: Send + Sync {
    /// Append one record, optionally keyed, and wait for the broker to accept it.
    async fn send(&self, key: Option<&str>, payload: Bytes) -> Result<(), TransportError>;
    async fn flush(&self, timeout: Duration) -> Result<(), TransportError>;
    async fn health_check(&self) -> Result<(), TransportError>;
}

pub struct ProducerBuilder;

impl ProducerBuilder {
    pub async fn connect(
        backend: Backend,
        opts: ConnectOptions,
    ) -> Result<Box<dyn LogProducer>, TransportError> {
        match backend {
            Backend::Kafka => {
                #[cfg(feature = "log-kafka")]
                {
                    return crate::transport::kafka::connect(opts).await;
                }
                #[cfg(not(feature = "log-kafka"))]
                {
                    let _ = opts;
                    Err(TransportError::Connect("kafka feature disabled".into()))
                }
            }
            Backend::Memory => {
                #[cfg(any(test, feature = "log-memory"))]
                {
                    let _ = opts;
                    return Ok(Box::new(crate::transport::memory::MemoryLog::new()));
                }
                #[cfg(not(any(test, feature = "log-memory")))]
                {
                    let _ = opts;
                    Err(TransportError::Connect("memory feature disabled".into()))
                }
            }
        }
    }
}
