//! Navidrome native API (`/api/...`) response shapes.

use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;

use crate::error::ValidationError;
use crate::model::{OrderedEntriesVisitor, ServerType};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NdParticipant {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub sub_role: Option<String>,
}

/// `participants` object, kept in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NdParticipants(pub Vec<(String, Vec<NdParticipant>)>);

impl<'de> Deserialize<'de> for NdParticipants {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer
            .deserialize_map(OrderedEntriesVisitor::default())
            .map(NdParticipants)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NdGenre {
    pub id: String,
    pub name: String,
}

/// Fields shared by library songs and playlist entries.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NdTrackFields {
    pub title: String,
    #[serde(default)]
    pub album: String,
    #[serde(default)]
    pub album_id: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub artist_id: String,
    #[serde(default)]
    pub album_artist: String,
    #[serde(default)]
    pub album_artist_id: String,
    #[serde(default)]
    pub track_number: u32,
    #[serde(default)]
    pub disc_number: u32,
    pub disc_subtitle: Option<String>,
    #[serde(default)]
    pub year: i32,
    pub release_date: Option<String>,
    pub size: Option<u64>,
    pub suffix: Option<String>,
    /// Seconds, fractional.
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub bit_rate: u32,
    pub bpm: Option<u32>,
    pub channels: Option<u32>,
    pub comment: Option<String>,
    pub lyrics: Option<String>,
    pub compilation: Option<bool>,
    pub path: Option<String>,
    pub genres: Option<Vec<NdGenre>>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub play_count: Option<u32>,
    pub play_date: Option<String>,
    #[serde(default)]
    pub starred: bool,
    pub rating: Option<u32>,
    pub rg_album_gain: Option<f64>,
    pub rg_album_peak: Option<f64>,
    pub rg_track_gain: Option<f64>,
    pub rg_track_peak: Option<f64>,
    pub participants: Option<NdParticipants>,
}

/// Library song (`/api/song`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NdSong {
    pub id: String,
    #[serde(flatten)]
    pub fields: NdTrackFields,
}

/// Playlist row (`/api/playlist/{id}/tracks`). `id` is the row identity.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NdPlaylistSong {
    pub id: String,
    pub media_file_id: String,
    pub playlist_id: String,
    #[serde(flatten)]
    pub fields: NdTrackFields,
}

/// A Navidrome song in the shape its endpoint returned it.
#[derive(Debug, Clone, PartialEq)]
pub enum NavidromeTrack {
    Library(NdSong),
    PlaylistEntry(NdPlaylistSong),
}

impl NavidromeTrack {
    pub fn fields(&self) -> &NdTrackFields {
        match self {
            Self::Library(song) => &song.fields,
            Self::PlaylistEntry(entry) => &entry.fields,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NdAlbum {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub album_artist: String,
    #[serde(default)]
    pub album_artist_id: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub artist_id: String,
    pub cover_art_id: Option<String>,
    pub comment: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub duration: Option<f64>,
    pub genres: Option<Vec<NdGenre>>,
    pub compilation: Option<bool>,
    pub play_date: Option<String>,
    pub play_count: Option<u32>,
    pub mbz_album_id: Option<String>,
    pub original_date: Option<String>,
    pub original_year: Option<i32>,
    pub release_date: Option<String>,
    #[serde(default)]
    pub min_year: i32,
    pub size: Option<u64>,
    #[serde(default)]
    pub song_count: u32,
    #[serde(default)]
    pub starred: bool,
    pub rating: Option<u32>,
    pub participants: Option<NdParticipants>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NdArtist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub album_count: u32,
    pub song_count: Option<u32>,
    pub biography: Option<String>,
    pub large_image_url: Option<String>,
    pub genres: Option<Vec<NdGenre>>,
    pub play_date: Option<String>,
    pub play_count: Option<u32>,
    pub mbz_artist_id: Option<String>,
    #[serde(default)]
    pub starred: bool,
    pub rating: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NdPlaylist {
    pub id: String,
    pub name: String,
    pub comment: Option<String>,
    #[serde(default)]
    pub duration: f64,
    pub owner_name: Option<String>,
    pub owner_id: Option<String>,
    #[serde(default)]
    pub public: bool,
    pub rules: Option<Value>,
    pub size: Option<u64>,
    #[serde(default)]
    pub song_count: u32,
    pub sync: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NdUser {
    pub id: String,
    pub user_name: String,
    pub email: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub last_login_at: Option<String>,
}

/// Decodes a native API body into `T`.
pub fn decode<T: DeserializeOwned>(raw: Value, operation: &'static str) -> Result<T, ValidationError> {
    serde_json::from_value(raw).map_err(|source| ValidationError::Schema {
        backend: ServerType::Navidrome,
        operation,
        source,
    })
}
