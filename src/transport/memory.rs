//! In-process log backend (feature `log-memory`) for local runs and tests.
use super::{LogProducer, TransportError};
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq)]
pub struct LogRecord {
    pub key: Option<String>,
    pub payload: Bytes,
}

/// Append-only record list. Clones share the same log, so a test can keep a
/// handle while the server owns another.
#[derive(Clone, Default)]
pub struct MemoryLog {
    records: Arc<Mutex<Vec<LogRecord>>>,
    failing: Arc<AtomicBool>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A log whose every send fails, standing in for an unreachable broker.
    pub fn failing() -> Self {
        let log = Self::default();
        log.set_failing(true);
        log
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl LogProducer for MemoryLog {
    async fn send(&self, key: Option<&str>, payload: Bytes) -> Result<(), TransportError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransportError::Publish("memory log unavailable".into()));
        }
        let mut records = self
            .records
            .lock()
            .map_err(|e| TransportError::Other(e.to_string()))?;
        records.push(LogRecord {
            key: key.map(str::to_string),
            payload,
        });
        Ok(())
    }

    async fn flush(&self, _timeout: Duration) -> Result<(), TransportError> {
        Ok(())
    }

    async fn health_check(&self) -> Result<(), TransportError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(TransportError::Connect("memory log unavailable".into()))
        } else {
            Ok(())
        }
    }
}
