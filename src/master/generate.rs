//! Synthetic reference data for local runs (`play-sim generate-master`).

use super::{DataFormat, LOCATIONS, SONGS, USERS, resource_path};
use crate::model::{LocationRecord, SongRecord, UserRecord};
use anyhow::{Context, Result};
use chrono::{Datelike, Days, NaiveDate, Utc};
use rand::Rng;
use serde::Serialize;
use std::path::Path;

const GENRES: [&str; 8] = [
    "pop", "rock", "jazz", "hiphop", "classical", "country", "electronic", "metal",
];
const WORDS: [&str; 16] = [
    "midnight", "river", "golden", "echo", "fire", "summer", "velvet", "neon", "ghost", "paper",
    "silver", "ocean", "wild", "electric", "blue", "heart",
];
const FIRST_NAMES: [&str; 10] = [
    "Alice", "Bob", "Carol", "Dave", "Eve", "Frank", "Grace", "Hank", "Ivy", "Jules",
];
const LAST_NAMES: [&str; 10] = [
    "Smith", "Jones", "Brown", "Wilson", "Taylor", "Clark", "Hall", "Young", "King", "Lopez",
];
const CITIES: [(&str, &str, &str); 10] = [
    ("New York", "US", "United States"),
    ("London", "GB", "United Kingdom"),
    ("Berlin", "DE", "Germany"),
    ("Tokyo", "JP", "Japan"),
    ("Sao Paulo", "BR", "Brazil"),
    ("Lagos", "NG", "Nigeria"),
    ("Mumbai", "IN", "India"),
    ("Sydney", "AU", "Australia"),
    ("Toronto", "CA", "Canada"),
    ("Paris", "FR", "France"),
];

pub const MIN_SONG_MS: u64 = 90_000;
pub const MAX_SONG_MS: u64 = 420_000;

fn pick<'a, R: Rng + ?Sized>(rng: &mut R, items: &'a [&'a str]) -> &'a str {
    items[rng.random_range(0..items.len())]
}

fn title<R: Rng + ?Sized>(rng: &mut R, words: usize) -> String {
    let mut parts: Vec<String> = (0..words).map(|_| pick(rng, &WORDS).to_string()).collect();
    if let Some(first) = parts.first_mut() {
        let mut chars = first.chars();
        if let Some(c) = chars.next() {
            let capitalized: String = c.to_uppercase().chain(chars).collect();
            *first = capitalized;
        }
    }
    parts.join(" ")
}

/// Uniform date between Jan 1 of `since_year` and today.
fn date_since<R: Rng + ?Sized>(rng: &mut R, since_year: i32) -> NaiveDate {
    let today = Utc::now().date_naive();
    let floor = NaiveDate::from_ymd_opt(since_year, 1, 1).unwrap_or(today);
    let span = (today - floor).num_days().max(0) as u64;
    floor
        .checked_add_days(Days::new(rng.random_range(0..=span)))
        .unwrap_or(today)
}

pub fn generate_songs(count: usize) -> Vec<SongRecord> {
    let mut rng = rand::rng();
    (0..count)
        .map(|_| SongRecord {
            song_id: uuid::Uuid::new_v4().to_string(),
            title: title(&mut rng, 3),
            artist_name: format!("{} {}", pick(&mut rng, &FIRST_NAMES), pick(&mut rng, &LAST_NAMES)),
            album_name: title(&mut rng, 2),
            genre: pick(&mut rng, &GENRES).to_string(),
            duration_ms: rng.random_range(MIN_SONG_MS..=MAX_SONG_MS),
            release_date: date_since(&mut rng, 2000),
        })
        .collect()
}

pub fn generate_users(count: usize) -> Vec<UserRecord> {
    let mut rng = rand::rng();
    let decade = Utc::now().year() / 10 * 10;
    (0..count)
        .map(|_| {
            let first = pick(&mut rng, &FIRST_NAMES).to_lowercase();
            let last = pick(&mut rng, &LAST_NAMES).to_lowercase();
            let n: u32 = rng.random_range(1..10_000);
            let (_, _, country) = CITIES[rng.random_range(0..CITIES.len())];
            UserRecord {
                user_id: uuid::Uuid::new_v4().to_string(),
                username: format!("{}{}{}", first, last, n),
                email: format!("{}.{}{}@example.com", first, last, n),
                registration_date: date_since(&mut rng, decade),
                country: country.to_string(),
            }
        })
        .collect()
}

pub fn generate_locations(count: usize) -> Vec<LocationRecord> {
    let mut rng = rand::rng();
    (0..count)
        .map(|_| {
            let (city, code, _) = CITIES[rng.random_range(0..CITIES.len())];
            LocationRecord {
                location_id: uuid::Uuid::new_v4().to_string(),
                city: city.to_string(),
                country_code: code.to_string(),
                latitude: rng.random_range(-90.0..=90.0),
                longitude: rng.random_range(-180.0..=180.0),
            }
        })
        .collect()
}

/// CSV with a header row. An empty collection leaves an empty file.
pub fn write_csv<T: Serialize>(records: &[T], path: &Path) -> Result<()> {
    if records.is_empty() {
        std::fs::File::create(path).with_context(|| format!("create {}", path.display()))?;
        return Ok(());
    }
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("create {}", path.display()))?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(records: &[T], path: &Path) -> Result<()> {
    let file = std::fs::File::create(path).with_context(|| format!("create {}", path.display()))?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), records)?;
    Ok(())
}

fn write_records<T: Serialize>(records: &[T], path: &Path, format: DataFormat) -> Result<()> {
    match format {
        DataFormat::Csv => write_csv(records, path),
        DataFormat::Json => write_json(records, path),
    }
}

pub struct MasterCounts {
    pub songs: usize,
    pub users: usize,
    pub locations: usize,
}

/// Generate and write all three resources into `dir`, creating it if needed.
pub fn generate_master_data(dir: &Path, counts: &MasterCounts, format: DataFormat) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    tracing::info!(
        songs = counts.songs,
        users = counts.users,
        locations = counts.locations,
        "generating master data"
    );
    write_records(&generate_songs(counts.songs), &resource_path(dir, SONGS, format), format)?;
    write_records(&generate_users(counts.users), &resource_path(dir, USERS, format), format)?;
    write_records(
        &generate_locations(counts.locations),
        &resource_path(dir, LOCATIONS, format),
        format,
    )?;
    tracing::info!(dir = %dir.display(), %format, "master data written");
    Ok(())
}
