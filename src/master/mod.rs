//! Reference ("master") data: songs, users and locations loaded once per run.

pub mod generate;

use crate::model::{LocationRecord, SongRecord, UserRecord};
use serde::de::DeserializeOwned;
use std::fmt;
use std::path::{Path, PathBuf};

pub const SONGS: &str = "songs";
pub const USERS: &str = "users";
pub const LOCATIONS: &str = "locations";

/// On-disk encoding of the three reference resources.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum DataFormat {
    Csv,
    Json,
}

impl DataFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            DataFormat::Csv => "csv",
            DataFormat::Json => "json",
        }
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed csv in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("malformed json in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid {resource} record {id}: {reason}")]
    Invalid {
        resource: &'static str,
        id: String,
        reason: String,
    },
}

/// Immutable reference collections. Shared read-only across workers behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    pub songs: Vec<SongRecord>,
    pub users: Vec<UserRecord>,
    pub locations: Vec<LocationRecord>,
}

impl ReferenceData {
    pub fn new(
        songs: Vec<SongRecord>,
        users: Vec<UserRecord>,
        locations: Vec<LocationRecord>,
    ) -> Self {
        Self { songs, users, locations }
    }

    /// Load `songs.<ext>`, `users.<ext>` and `locations.<ext>` from `dir`.
    ///
    /// Empty but well-formed resources load as zero records; rejecting them is
    /// left to the event factory.
    pub fn load(dir: impl AsRef<Path>, format: DataFormat) -> Result<Self, LoadError> {
        let dir = dir.as_ref();
        let songs: Vec<SongRecord> = load_resource(&resource_path(dir, SONGS, format), format)?;
        let users: Vec<UserRecord> = load_resource(&resource_path(dir, USERS, format), format)?;
        let locations: Vec<LocationRecord> =
            load_resource(&resource_path(dir, LOCATIONS, format), format)?;

        for song in &songs {
            if song.duration_ms == 0 {
                return Err(LoadError::Invalid {
                    resource: SONGS,
                    id: song.song_id.clone(),
                    reason: "duration_ms must be positive".into(),
                });
            }
        }
        for loc in &locations {
            if !(-90.0..=90.0).contains(&loc.latitude) || !(-180.0..=180.0).contains(&loc.longitude) {
                return Err(LoadError::Invalid {
                    resource: LOCATIONS,
                    id: loc.location_id.clone(),
                    reason: format!("coordinates out of range ({}, {})", loc.latitude, loc.longitude),
                });
            }
        }

        tracing::info!(
            dir = %dir.display(),
            %format,
            songs = songs.len(),
            users = users.len(),
            locations = locations.len(),
            "reference data loaded"
        );
        Ok(Self { songs, users, locations })
    }

    pub fn song(&self, song_id: &str) -> Option<&SongRecord> {
        self.songs.iter().find(|s| s.song_id == song_id)
    }
}

pub fn resource_path(dir: &Path, resource: &str, format: DataFormat) -> PathBuf {
    dir.join(format!("{}.{}", resource, format.extension()))
}

fn load_resource<T: DeserializeOwned>(path: &Path, format: DataFormat) -> Result<Vec<T>, LoadError> {
    let raw = std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    match format {
        DataFormat::Csv => {
            let mut reader = csv::Reader::from_reader(raw.as_slice());
            reader
                .deserialize()
                .collect::<Result<Vec<T>, _>>()
                .map_err(|source| LoadError::Csv {
                    path: path.to_path_buf(),
                    source,
                })
        }
        DataFormat::Json => {
            // An empty file counts as an empty collection, matching headerless CSV.
            if raw.iter().all(u8::is_ascii_whitespace) {
                return Ok(Vec::new());
            }
            serde_json::from_slice(&raw).map_err(|source| LoadError::Json {
                path: path.to_path_buf(),
                source,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, name: &str, body: &str) {
        fs::write(dir.join(name), body).unwrap();
    }

    #[test]
    fn loads_csv_resources() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "songs.csv",
            "song_id,title,artist_name,album_name,genre,duration_ms,release_date\n\
             s0,t,a,al,pop,200000,2020-01-01\n",
        );
        write(
            tmp.path(),
            "users.csv",
            "user_id,username,email,registration_date,country\nu0,n,u@x.com,2020-01-01,US\n",
        );
        write(
            tmp.path(),
            "locations.csv",
            "location_id,city,country_code,latitude,longitude\nl0,c,US,40.7,-74.0\n",
        );
        let data = ReferenceData::load(tmp.path(), DataFormat::Csv).unwrap();
        assert_eq!(data.songs.len(), 1);
        assert_eq!(data.songs[0].duration_ms, 200_000);
        assert_eq!(data.users[0].country, "US");
        assert_eq!(data.locations[0].longitude, -74.0);
    }

    #[test]
    fn empty_resources_load_as_zero_records() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "songs.json", "[]");
        write(tmp.path(), "users.json", "");
        write(tmp.path(), "locations.json", "  \n");
        let data = ReferenceData::load(tmp.path(), DataFormat::Json).unwrap();
        assert!(data.songs.is_empty() && data.users.is_empty() && data.locations.is_empty());
    }

    #[test]
    fn malformed_input_fails_at_load() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "songs.json", "[{\"song_id\": 1}]");
        write(tmp.path(), "users.json", "[]");
        write(tmp.path(), "locations.json", "[]");
        let err = ReferenceData::load(tmp.path(), DataFormat::Json).unwrap_err();
        assert!(matches!(err, LoadError::Json { .. }));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = ReferenceData::load(tmp.path(), DataFormat::Csv).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "songs.json", "[]");
        write(tmp.path(), "users.json", "[]");
        write(
            tmp.path(),
            "locations.json",
            r#"[{"location_id":"l0","city":"c","country_code":"US","latitude":91.0,"longitude":0.0}]"#,
        );
        let err = ReferenceData::load(tmp.path(), DataFormat::Json).unwrap_err();
        assert!(matches!(err, LoadError::Invalid { resource: LOCATIONS, .. }));
    }
}
