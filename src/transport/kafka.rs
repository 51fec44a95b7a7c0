//! Kafka adapter (feature `log-kafka`), using rdkafka's `FutureProducer`.
use super::{ConnectOptions, LogProducer, TransportError};
use bytes::Bytes;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use std::time::Duration;

const DEFAULT_CLIENT_ID: &str = "play-sim-producer";
const QUEUE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct KafkaLog {
    producer: FutureProducer,
    topic: String,
}

pub async fn connect(opts: ConnectOptions) -> Result<Box<dyn LogProducer>, TransportError> {
    let mut config = ClientConfig::new();
    config
        .set("bootstrap.servers", &opts.bootstrap_servers)
        .set("client.id", DEFAULT_CLIENT_ID)
        .set("message.timeout.ms", "5000");
    for (k, v) in &opts.params {
        config.set(k, v);
    }
    let producer: FutureProducer = config
        .create()
        .map_err(|e| TransportError::Connect(e.to_string()))?;
    tracing::info!(servers = %opts.bootstrap_servers, topic = %opts.topic, "kafka producer created");
    Ok(Box::new(KafkaLog {
        producer,
        topic: opts.topic,
    }))
}

#[async_trait::async_trait]
impl LogProducer for KafkaLog {
    async fn send(&self, key: Option<&str>, payload: Bytes) -> Result<(), TransportError> {
        let mut record = FutureRecord::<str, [u8]>::to(&self.topic).payload(payload.as_ref());
        if let Some(k) = key {
            record = record.key(k);
        }
        self.producer
            .send(record, Timeout::After(QUEUE_TIMEOUT))
            .await
            .map(|_| ())
            .map_err(|(e, _msg)| TransportError::Publish(e.to_string()))
    }

    async fn flush(&self, timeout: Duration) -> Result<(), TransportError> {
        let producer = self.producer.clone();
        tokio::task::spawn_blocking(move || producer.flush(Timeout::After(timeout)))
            .await
            .map_err(|e| TransportError::Other(e.to_string()))?
            .map_err(|e| TransportError::Other(e.to_string()))
    }

    async fn health_check(&self) -> Result<(), TransportError> {
        let producer = self.producer.clone();
        let topic = self.topic.clone();
        tokio::task::spawn_blocking(move || {
            producer
                .client()
                .fetch_metadata(Some(&topic), Timeout::After(QUEUE_TIMEOUT))
                .map(|_| ())
        })
        .await
        .map_err(|e| TransportError::Other(e.to_string()))?
        .map_err(|e| TransportError::Connect(e.to_string()))
    }
}
