//! Record encoding for the durable log: JSON event body keyed by song id.

use crate::model::PlayEvent;
use bytes::Bytes;

/// Partition key for a play: every play of one song lands on one partition.
pub fn record_key(event: &PlayEvent) -> &str {
    &event.song_id
}

pub fn encode(event: &PlayEvent) -> Result<Bytes, serde_json::Error> {
    serde_json::to_vec(event).map(Bytes::from)
}

pub fn decode(payload: &[u8]) -> Result<PlayEvent, serde_json::Error> {
    serde_json::from_slice(payload)
}
