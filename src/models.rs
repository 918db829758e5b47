use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;

/// Album artist value Jellyfin uses for compilations
const VARIOUS_ARTISTS: &str = "Various Artists";

/// Jellyfin reports runtimes in 100ns ticks
const TICKS_PER_SECOND: f64 = 10_000_000.0;

/// A single audio track from the user's library
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub id: String,
    pub name: String,
    pub album_id: Option<String>,
    pub album_artist: Option<String>,
    pub is_favorite: bool,
    pub genres: Vec<String>,
    pub duration_secs: f64,
    pub play_count: u32,
    pub last_played: Option<DateTime<Utc>>,
    pub path: Option<String>,
}

impl Track {
    /// Build a track from a Jellyfin item, resolving "Various Artists" to the first performer
    pub fn from_item(item: BaseItem) -> Self {
        let album_artist = match item.album_artist {
            Some(artist) if artist == VARIOUS_ARTISTS => item
                .artists
                .as_ref()
                .and_then(|artists| artists.first().cloned()),
            other => other,
        };

        let user_data = item.user_data.unwrap_or_default();
        let last_played = user_data
            .last_played_date
            .as_deref()
            .and_then(parse_server_timestamp);

        Track {
            id: item.id,
            name: item.name,
            album_id: item.album_id,
            album_artist,
            is_favorite: user_data.is_favorite,
            genres: item.genres.unwrap_or_default(),
            duration_secs: item.run_time_ticks.unwrap_or(0) as f64 / TICKS_PER_SECOND,
            play_count: user_data.play_count,
            last_played,
            path: item.path,
        }
    }
}

impl Default for Track {
    fn default() -> Self {
        Track {
            id: String::new(),
            name: "Unknown".to_string(),
            album_id: None,
            album_artist: None,
            is_favorite: false,
            genres: Vec::new(),
            duration_secs: 0.0,
            play_count: 0,
            last_played: None,
            path: None,
        }
    }
}

/// Parse a Jellyfin date (RFC 3339 with up to 7 fractional digits, or a bare UTC datetime)
pub fn parse_server_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    parse_naive_timestamp(raw.trim_end_matches('Z')).map(|naive| naive.and_utc())
}

/// Parse the `YYYY-MM-DD HH:MM:SS[.fffffff]` timestamps Playback Reporting stores
pub fn parse_naive_timestamp(raw: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
}

/// The library snapshot for one run: tracks in server listing order plus an id index
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tracks: Vec<Track>,
    index: HashMap<String, usize>,
}

impl Catalog {
    /// Build a catalog; a repeated id keeps its first occurrence
    pub fn new(tracks: Vec<Track>) -> Self {
        let mut catalog = Catalog::default();
        for track in tracks {
            if catalog.index.contains_key(&track.id) {
                continue;
            }
            catalog.index.insert(track.id.clone(), catalog.tracks.len());
            catalog.tracks.push(track);
        }
        catalog
    }

    pub fn get(&self, id: &str) -> Option<&Track> {
        self.index.get(id).map(|&i| &self.tracks[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Summed duration of the given ids; ids missing from the catalog count as zero
    pub fn total_duration<S: AsRef<str>>(&self, ids: &[S]) -> f64 {
        ids.iter()
            .filter_map(|id| self.get(id.as_ref()))
            .map(|track| track.duration_secs)
            .sum()
    }
}

/// One row of the Playback Reporting activity log
#[derive(Debug, Clone, PartialEq)]
pub struct ListenEvent {
    pub timestamp: NaiveDateTime,
    pub track_id: String,
    pub played_secs: f64,
}

impl ListenEvent {
    /// Parse a `[DateCreated, ItemId, PlayDuration]` row; returns `None` for malformed rows
    pub fn from_row(row: &[serde_json::Value]) -> Option<Self> {
        let [date, item, duration, ..] = row else {
            return None;
        };
        let timestamp = parse_naive_timestamp(date.as_str()?)?;
        let track_id = item.as_str()?.to_string();
        let played_secs = match duration {
            serde_json::Value::Number(n) => n.as_f64()?,
            serde_json::Value::String(s) => s.trim().parse().ok()?,
            _ => return None,
        };
        Some(ListenEvent {
            timestamp,
            track_id,
            played_secs,
        })
    }
}

/// Per-user data attached to every Jellyfin item
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserItemData {
    #[serde(default)]
    pub play_count: u32,
    pub last_played_date: Option<String>,
    #[serde(default)]
    pub is_favorite: bool,
}

/// Subset of a Jellyfin `BaseItemDto` we read
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BaseItem {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub album_id: Option<String>,
    pub album_artist: Option<String>,
    pub artists: Option<Vec<String>>,
    pub user_data: Option<UserItemData>,
    pub run_time_ticks: Option<u64>,
    pub genres: Option<Vec<String>>,
    pub path: Option<String>,
}

/// Response structure for item listing endpoints
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemsResponse {
    #[serde(default)]
    pub items: Vec<BaseItem>,
}

/// Response entry for the `/Users` endpoint
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserInfo {
    pub id: String,
    pub name: String,
}

/// Response structure for the Playback Reporting custom query endpoint
#[derive(Debug, Deserialize)]
pub struct CustomQueryResponse {
    #[serde(default)]
    pub results: Vec<Vec<serde_json::Value>>,
}

/// Response structure for `POST /Playlists`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreatePlaylistResponse {
    pub id: String,
}
