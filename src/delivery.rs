//! Delivery client: posts play events to the ingestion endpoint with bounded retry.

use crate::model::PlayEvent;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

#[derive(thiserror::Error, Debug)]
pub enum DeliveryError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("request failed: {0}")]
    Request(String),
    #[error("unexpected status {0}")]
    Status(u16),
}

/// One delivery attempt. Implementations must bound the attempt by `timeout`.
#[async_trait::async_trait]
pub trait EventTransport: Send + Sync {
    async fn send(&self, event: &PlayEvent, timeout: Duration) -> Result<(), DeliveryError>;
}

/// JSON `POST` to a fixed endpoint; any 2xx counts as delivered.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>, pool_size: usize) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(pool_size)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| DeliveryError::Request(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait::async_trait]
impl EventTransport for HttpTransport {
    async fn send(&self, event: &PlayEvent, timeout: Duration) -> Result<(), DeliveryError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(event)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::Timeout(timeout)
                } else {
                    DeliveryError::Request(e.to_string())
                }
            })?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(DeliveryError::Status(status.as_u16()))
        }
    }
}

/// Stateless apart from its transport; one instance is shared by every worker.
#[derive(Clone)]
pub struct DeliveryClient {
    transport: Arc<dyn EventTransport>,
}

impl DeliveryClient {
    pub fn new(transport: Arc<dyn EventTransport>) -> Self {
        Self { transport }
    }

    pub fn http(endpoint: impl Into<String>, pool_size: usize) -> Result<Self, DeliveryError> {
        Ok(Self::new(Arc::new(HttpTransport::new(endpoint, pool_size)?)))
    }

    /// Try up to `max_retries` attempts (counting the first, at least one),
    /// back to back, each bounded by `timeout`. Never errors: `false` means
    /// every attempt failed.
    pub async fn post_event(&self, event: &PlayEvent, timeout: Duration, max_retries: u32) -> bool {
        let attempts = max_retries.max(1);
        for attempt in 1..=attempts {
            match self.transport.send(event, timeout).await {
                Ok(()) => {
                    debug!(attempt, event_id = %event.event_id, "event delivered");
                    return true;
                }
                Err(e) => {
                    warn!(attempt, event_id = %event.event_id, error = %e, "failed to post event");
                }
            }
        }
        error!(attempts, event_id = %event.event_id, "giving up on event");
        false
    }
}
