//! Track descriptors and the historical payload shapes they come from.
//!
//! Saved-track exports have shipped in several shapes over time: a flat
//! record with an `artists` list, a record nesting the track under a
//! `track` object, and a legacy flat `artist` string. All of them are
//! normalized up front into one canonical [`TrackDescriptor`]; fields a
//! malformed record lacks fall back to sentinel values rather than
//! failing the batch.

use serde::{Deserialize, Serialize};

/// Sentinel artist name for records where no artist could be extracted.
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// Sentinel track name for records where no title could be extracted.
pub const UNKNOWN_TRACK: &str = "Unknown Track";

/// Canonical internal track shape.
///
/// Identity is `id` (an opaque external string). `name` and `artist`
/// form the human-readable dedup key used when `preview_url` is absent
/// and must be resolved externally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackDescriptor {
    pub id: String,
    pub name: String,
    pub artist: String,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub preview_url: Option<String>,
}

impl TrackDescriptor {
    /// Composite `"name - artist"` key used for preview resolution and
    /// download file naming.
    pub fn dedup_key(&self) -> String {
        format!("{} - {}", self.name, self.artist)
    }

    /// Filesystem-safe name of the downloaded preview for this track.
    pub fn preview_filename(&self) -> String {
        format!("{}.mp3", sanitize_filename(&self.dedup_key()))
    }
}

/// Reference to an artist inside a payload: either an object with a
/// `name` field or a bare string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArtistRef {
    Named { name: String },
    Plain(String),
}

impl ArtistRef {
    fn name(&self) -> &str {
        match self {
            Self::Named { name } | Self::Plain(name) => name,
        }
    }
}

/// Inner track object of the nested payload shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedTrack {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
}

/// One raw saved-track record, in any of the known historical shapes.
///
/// Variants are tried in declaration order, which encodes the artist
/// extraction precedence: flat `artists` list, then nested `track`
/// object, then legacy flat `artist` string. Anything else falls
/// through to [`RawTrack::Unknown`] and normalizes to sentinels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTrack {
    Flat {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        name: Option<String>,
        artists: Vec<ArtistRef>,
        #[serde(default)]
        preview_url: Option<String>,
        #[serde(default)]
        duration_ms: Option<u64>,
    },
    Nested {
        track: NestedTrack,
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        preview_url: Option<String>,
        #[serde(default)]
        duration_ms: Option<u64>,
    },
    LegacyArtist {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        name: Option<String>,
        artist: String,
        #[serde(default)]
        preview_url: Option<String>,
        #[serde(default)]
        duration_ms: Option<u64>,
    },
    Unknown(serde_json::Value),
}

impl RawTrack {
    /// Normalize this record into the canonical descriptor, filling
    /// missing fields with sentinels.
    pub fn normalize(&self) -> TrackDescriptor {
        match self {
            Self::Flat {
                id,
                name,
                artists,
                preview_url,
                duration_ms,
            } => TrackDescriptor {
                id: id.clone().unwrap_or_default(),
                name: non_empty(name.as_deref(), UNKNOWN_TRACK),
                artist: first_artist(artists),
                duration_ms: duration_ms.unwrap_or(0),
                preview_url: non_empty_opt(preview_url.as_deref()),
            },
            Self::Nested {
                track,
                id,
                preview_url,
                duration_ms,
            } => TrackDescriptor {
                id: id.clone().unwrap_or_default(),
                name: non_empty(track.name.as_deref(), UNKNOWN_TRACK),
                artist: first_artist(&track.artists),
                duration_ms: duration_ms.unwrap_or(0),
                preview_url: non_empty_opt(preview_url.as_deref()),
            },
            Self::LegacyArtist {
                id,
                name,
                artist,
                preview_url,
                duration_ms,
            } => TrackDescriptor {
                id: id.clone().unwrap_or_default(),
                name: non_empty(name.as_deref(), UNKNOWN_TRACK),
                artist: non_empty(Some(artist), UNKNOWN_ARTIST),
                duration_ms: duration_ms.unwrap_or(0),
                preview_url: non_empty_opt(preview_url.as_deref()),
            },
            Self::Unknown(value) => TrackDescriptor {
                id: value
                    .get("id")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                name: UNKNOWN_TRACK.to_string(),
                artist: UNKNOWN_ARTIST.to_string(),
                duration_ms: 0,
                preview_url: None,
            },
        }
    }
}

fn first_artist(artists: &[ArtistRef]) -> String {
    artists
        .first()
        .map(|a| a.name().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| UNKNOWN_ARTIST.to_string())
}

fn non_empty(value: Option<&str>, fallback: &str) -> String {
    match value {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => fallback.to_string(),
    }
}

fn non_empty_opt(value: Option<&str>) -> Option<String> {
    value.filter(|s| !s.is_empty()).map(str::to_string)
}

/// Replace characters unsafe in filenames with underscores.
///
/// Alphanumerics, spaces, hyphens, and underscores pass through
/// untouched so the result stays readable.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, ' ' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
