//! Reference records and the play event synthesized from them.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongRecord {
    pub song_id: String,
    pub title: String,
    pub artist_name: String,
    pub album_name: String,
    pub genre: String,
    pub duration_ms: u64,
    pub release_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub registration_date: NaiveDate,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub location_id: String,
    pub city: String,
    pub country_code: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Mobile,
    Desktop,
    Tablet,
}

impl DeviceType {
    pub const ALL: [DeviceType; 3] = [DeviceType::Mobile, DeviceType::Desktop, DeviceType::Tablet];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Mobile => "mobile",
            DeviceType::Desktop => "desktop",
            DeviceType::Tablet => "tablet",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ISO-8601 timestamp as UTC. Values without an offset are read as UTC, and a
/// bare date means midnight.
pub fn parse_iso_utc(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn deserialize_iso_utc<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_iso_utc(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("'{}' is not an ISO-8601 datetime", raw)))
}

/// One synthetic song play. `played_at` is written as RFC 3339 and read as any
/// ISO-8601 form, offset or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayEvent {
    pub event_id: String,
    pub song_id: String,
    pub user_id: String,
    pub location_id: String,
    #[serde(deserialize_with = "deserialize_iso_utc")]
    pub played_at: DateTime<Utc>,
    pub play_duration_ms: u64,
    pub device_type: DeviceType,
}

impl PlayEvent {
    /// Structural checks applied where events enter from outside the process.
    pub fn validate(&self) -> Result<(), String> {
        let ids = [
            ("event_id", &self.event_id),
            ("song_id", &self.song_id),
            ("user_id", &self.user_id),
            ("location_id", &self.location_id),
        ];
        for (name, value) in ids {
            if value.trim().is_empty() {
                return Err(format!("{} must not be empty", name));
            }
        }
        if self.play_duration_ms == 0 {
            return Err("play_duration_ms must be positive".to_string());
        }
        Ok(())
    }
}
