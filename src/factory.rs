//! Event factory: draws reference records uniformly and synthesizes play events.

use crate::master::{LOCATIONS, ReferenceData, SONGS, USERS};
use crate::model::{DeviceType, PlayEvent};
use chrono::{DateTime, Utc};
use rand::Rng;
use std::sync::Arc;

/// Plays shorter than this are not generated unless the song itself is shorter.
pub const MIN_PLAY_MS: u64 = 10_000;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FactoryError {
    #[error("reference data is empty: no {collection} records")]
    EmptyReferenceData { collection: &'static str },
}

/// Shared by every worker of a run. Randomness comes from the calling
/// thread's own generator, so concurrent `create_event` calls never contend.
#[derive(Debug, Clone)]
pub struct EventFactory {
    data: Arc<ReferenceData>,
}

impl EventFactory {
    /// Fails unless all three collections hold at least one record.
    pub fn new(data: Arc<ReferenceData>) -> Result<Self, FactoryError> {
        let checks = [
            (SONGS, data.songs.is_empty()),
            (USERS, data.users.is_empty()),
            (LOCATIONS, data.locations.is_empty()),
        ];
        if let Some((collection, _)) = checks.into_iter().find(|(_, empty)| *empty) {
            return Err(FactoryError::EmptyReferenceData { collection });
        }
        Ok(Self { data })
    }

    pub fn reference_data(&self) -> &ReferenceData {
        &self.data
    }

    /// Build one event stamped with `played_at`, or the current time when absent.
    pub fn create_event(&self, played_at: Option<DateTime<Utc>>) -> PlayEvent {
        self.create_event_with(&mut rand::rng(), played_at)
    }

    pub fn create_event_with<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        played_at: Option<DateTime<Utc>>,
    ) -> PlayEvent {
        let song = &self.data.songs[rng.random_range(0..self.data.songs.len())];
        let user = &self.data.users[rng.random_range(0..self.data.users.len())];
        let location = &self.data.locations[rng.random_range(0..self.data.locations.len())];

        // floor clamps to the song length so short songs still yield a valid play
        let floor = MIN_PLAY_MS.min(song.duration_ms);
        let play_duration_ms = rng.random_range(floor..=song.duration_ms);
        let device_type = DeviceType::ALL[rng.random_range(0..DeviceType::ALL.len())];

        PlayEvent {
            event_id: uuid::Uuid::new_v4().to_string(),
            song_id: song.song_id.clone(),
            user_id: user.user_id.clone(),
            location_id: location.location_id.clone(),
            played_at: played_at.unwrap_or_else(Utc::now),
            play_duration_ms,
            device_type,
        }
    }
}
