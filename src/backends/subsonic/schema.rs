//! Subsonic / OpenSubsonic JSON response shapes.
//!
//! Every field a server may omit is optional. Lists accept either an array or
//! a single object, since some servers collapse one-element lists.

use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{ApiError, BackendError, ValidationError};
use crate::model::ServerType;

const ENVELOPE_KEY: &str = "subsonic-response";

/// Accepts string or numeric ids and yields a string.
pub(crate) fn id_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(text) => text,
        RawId::Number(number) => number.to_string(),
    })
}

pub(crate) fn opt_id_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    #[derive(Deserialize)]
    struct Wrapped(#[serde(deserialize_with = "id_string")] String);

    Ok(Option::<Wrapped>::deserialize(deserializer)?.map(|Wrapped(id)| id))
}

/// Accepts `[..]`, a single object, or `null`.
pub(crate) fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany<T> {
        Many(Vec<T>),
        One(T),
    }

    Ok(match Option::<OneOrMany<T>>::deserialize(deserializer)? {
        Some(OneOrMany::Many(items)) => items,
        Some(OneOrMany::One(item)) => vec![item],
        None => Vec::new(),
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubsonicErrorBody {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtistRef {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributorArtist {
    #[serde(default, deserialize_with = "opt_id_string")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contributor {
    pub role: String,
    #[serde(default)]
    pub sub_role: Option<String>,
    pub artist: ContributorArtist,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItemGenre {
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayGain {
    pub track_gain: Option<f64>,
    pub album_gain: Option<f64>,
    pub track_peak: Option<f64>,
    pub album_peak: Option<f64>,
}

/// Flat and role-segmented artist fields shared by songs and albums.
pub trait ArtistFields {
    fn artist(&self) -> Option<&str>;
    fn artist_id(&self) -> Option<&str>;
    fn artists(&self) -> Option<&[ArtistRef]>;
    fn album_artists(&self) -> Option<&[ArtistRef]>;
    fn contributors(&self) -> Option<&[Contributor]>;
    fn genre(&self) -> Option<&str>;
    fn genres(&self) -> Option<&[ItemGenre]>;
}

/// `Child` entry: a song, podcast episode or directory.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubsonicSong {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub title: String,
    pub album: Option<String>,
    #[serde(default, deserialize_with = "opt_id_string")]
    pub album_id: Option<String>,
    pub artist: Option<String>,
    #[serde(default, deserialize_with = "opt_id_string")]
    pub artist_id: Option<String>,
    pub track: Option<u32>,
    pub disc_number: Option<u32>,
    pub year: Option<i32>,
    pub genre: Option<String>,
    pub genres: Option<Vec<ItemGenre>>,
    #[serde(default, deserialize_with = "opt_id_string")]
    pub cover_art: Option<String>,
    pub size: Option<u64>,
    pub content_type: Option<String>,
    /// Seconds.
    pub duration: Option<u64>,
    pub bit_rate: Option<u32>,
    pub bpm: Option<u32>,
    pub channel_count: Option<u32>,
    pub comment: Option<String>,
    pub path: Option<String>,
    pub play_count: Option<u32>,
    pub played: Option<String>,
    pub created: Option<String>,
    pub starred: Option<String>,
    pub user_rating: Option<u32>,
    pub replay_gain: Option<ReplayGain>,
    pub artists: Option<Vec<ArtistRef>>,
    pub album_artists: Option<Vec<ArtistRef>>,
    pub contributors: Option<Vec<Contributor>>,
    pub display_artist: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubsonicAlbum {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub name: String,
    pub artist: Option<String>,
    #[serde(default, deserialize_with = "opt_id_string")]
    pub artist_id: Option<String>,
    #[serde(default, deserialize_with = "opt_id_string")]
    pub cover_art: Option<String>,
    #[serde(default)]
    pub song_count: u32,
    /// Seconds.
    #[serde(default)]
    pub duration: u64,
    pub play_count: Option<u32>,
    pub played: Option<String>,
    pub created: Option<String>,
    pub starred: Option<String>,
    pub year: Option<i32>,
    pub genre: Option<String>,
    pub genres: Option<Vec<ItemGenre>>,
    pub user_rating: Option<u32>,
    pub music_brainz_id: Option<String>,
    pub is_compilation: Option<bool>,
    pub artists: Option<Vec<ArtistRef>>,
    pub album_artists: Option<Vec<ArtistRef>>,
    pub contributors: Option<Vec<Contributor>>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub song: Vec<SubsonicSong>,
}

macro_rules! impl_artist_fields {
    ($ty:ty) => {
        impl ArtistFields for $ty {
            fn artist(&self) -> Option<&str> {
                self.artist.as_deref()
            }
            fn artist_id(&self) -> Option<&str> {
                self.artist_id.as_deref()
            }
            fn artists(&self) -> Option<&[ArtistRef]> {
                self.artists.as_deref()
            }
            fn album_artists(&self) -> Option<&[ArtistRef]> {
                self.album_artists.as_deref()
            }
            fn contributors(&self) -> Option<&[Contributor]> {
                self.contributors.as_deref()
            }
            fn genre(&self) -> Option<&str> {
                self.genre.as_deref()
            }
            fn genres(&self) -> Option<&[ItemGenre]> {
                self.genres.as_deref()
            }
        }
    };
}

impl_artist_fields!(SubsonicSong);
impl_artist_fields!(SubsonicAlbum);

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubsonicArtist {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub name: String,
    #[serde(default, deserialize_with = "opt_id_string")]
    pub cover_art: Option<String>,
    pub artist_image_url: Option<String>,
    pub album_count: Option<u32>,
    pub starred: Option<String>,
    pub user_rating: Option<u32>,
    pub music_brainz_id: Option<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub album: Vec<SubsonicAlbum>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarArtist {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub name: String,
    pub artist_image_url: Option<String>,
}

/// `getArtistInfo2` payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtistInfo {
    pub biography: Option<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub similar_artist: Vec<SimilarArtist>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtistIndex {
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "one_or_many")]
    pub artist: Vec<SubsonicArtist>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtistsPayload {
    #[serde(default, deserialize_with = "one_or_many")]
    pub index: Vec<ArtistIndex>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubsonicPlaylist {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub name: String,
    pub comment: Option<String>,
    pub owner: Option<String>,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub song_count: u32,
    /// Seconds.
    #[serde(default)]
    pub duration: u64,
    pub created: Option<String>,
    pub changed: Option<String>,
    #[serde(default, deserialize_with = "opt_id_string")]
    pub cover_art: Option<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub entry: Vec<SubsonicSong>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistsPayload {
    #[serde(default, deserialize_with = "one_or_many")]
    pub playlist: Vec<SubsonicPlaylist>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubsonicGenre {
    pub value: String,
    #[serde(default)]
    pub song_count: u32,
    #[serde(default)]
    pub album_count: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenresPayload {
    #[serde(default, deserialize_with = "one_or_many")]
    pub genre: Vec<SubsonicGenre>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SongListPayload {
    #[serde(default, deserialize_with = "one_or_many")]
    pub song: Vec<SubsonicSong>,
}

/// Saved play queue, from `getPlayQueue` (`playQueue`) or the index-based
/// `getPlayQueue2` (`playQueue2`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubsonicPlayQueue {
    #[serde(default, deserialize_with = "one_or_many")]
    pub entry: Vec<SubsonicSong>,
    #[serde(default, deserialize_with = "opt_id_string")]
    pub current: Option<String>,
    /// Only returned by servers that store the position in the list.
    pub current_index: Option<usize>,
    /// Milliseconds into the current song.
    #[serde(alias = "positionMs")]
    pub position: Option<u64>,
}

impl SubsonicPlayQueue {
    /// Index of the current entry. The stored index wins; the `current` id
    /// is matched against its first occurrence only when no index was kept.
    pub fn resolved_current_index(&self) -> Option<usize> {
        match self.current_index {
            Some(index) if index < self.entry.len() => Some(index),
            _ => self
                .current
                .as_deref()
                .and_then(|current| self.entry.iter().position(|song| song.id == current)),
        }
    }
}

fn envelope<'a>(raw: &'a Value, operation: &'static str) -> Result<&'a Value, ApiError> {
    let body = raw.get(ENVELOPE_KEY).ok_or(ValidationError::MissingField {
        backend: ServerType::Subsonic,
        operation,
        field: ENVELOPE_KEY,
    })?;
    let status = body.get("status").and_then(Value::as_str).unwrap_or_default();
    if status != "ok" {
        let error = body
            .get("error")
            .cloned()
            .and_then(|error| serde_json::from_value::<SubsonicErrorBody>(error).ok())
            .unwrap_or(SubsonicErrorBody {
                code: 0,
                message: format!("server responded with status `{status}`"),
            });
        return Err(BackendError::protocol(error.code, error.message).into());
    }
    Ok(body)
}

fn parse<T: DeserializeOwned>(
    value: Value,
    backend: ServerType,
    operation: &'static str,
) -> Result<T, ValidationError> {
    serde_json::from_value(value).map_err(|source| ValidationError::Schema {
        backend,
        operation,
        source,
    })
}

/// Validates the envelope and decodes the payload stored under `key`.
pub fn decode<T: DeserializeOwned>(
    raw: &Value,
    operation: &'static str,
    key: &'static str,
) -> Result<T, ApiError> {
    let body = envelope(raw, operation)?;
    let payload = body.get(key).cloned().ok_or(ValidationError::MissingField {
        backend: ServerType::Subsonic,
        operation,
        field: key,
    })?;
    Ok(parse(payload, ServerType::Subsonic, operation)?)
}

/// Like [`decode`], but an absent payload yields `None`.
pub fn decode_optional<T: DeserializeOwned>(
    raw: &Value,
    operation: &'static str,
    key: &'static str,
) -> Result<Option<T>, ApiError> {
    let body = envelope(raw, operation)?;
    match body.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(payload) => Ok(Some(parse(payload.clone(), ServerType::Subsonic, operation)?)),
    }
}

/// Validates an envelope that carries no payload (`star`, `scrobble`, ...).
pub fn decode_empty(raw: &Value, operation: &'static str) -> Result<(), ApiError> {
    envelope(raw, operation).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_accepts_numeric_ids() {
        let raw = json!({
            "subsonic-response": {
                "status": "ok",
                "song": { "id": 42, "title": "Test", "albumId": 7 }
            }
        });
        let song: SubsonicSong = decode(&raw, "getSong", "song").expect("song should decode");
        assert_eq!(song.id, "42");
        assert_eq!(song.album_id.as_deref(), Some("7"));
    }

    #[test]
    fn test_decode_rejects_structurally_invalid_payload() {
        let raw = json!({
            "subsonic-response": { "status": "ok", "song": { "id": "1", "duration": "long" } }
        });
        let error = decode::<SubsonicSong>(&raw, "getSong", "song").unwrap_err();
        assert!(matches!(
            error,
            ApiError::Validation(ValidationError::Schema { operation: "getSong", .. })
        ));
    }

    #[test]
    fn test_failed_status_maps_to_backend_error() {
        let raw = json!({
            "subsonic-response": {
                "status": "failed",
                "error": { "code": 70, "message": "Song not found" }
            }
        });
        let error = decode::<SubsonicSong>(&raw, "getSong", "song").unwrap_err();
        let ApiError::Backend(backend) = error else {
            panic!("expected backend error");
        };
        assert_eq!(backend.code, Some(70));
        assert_eq!(backend.message, "Song not found");
    }

    #[test]
    fn test_missing_envelope_is_validation_error() {
        let error = decode_empty(&json!({ "status": "ok" }), "ping").unwrap_err();
        assert!(matches!(
            error,
            ApiError::Validation(ValidationError::MissingField { field: ENVELOPE_KEY, .. })
        ));
    }

    #[test]
    fn test_single_object_list_is_accepted() {
        let raw = json!({
            "subsonic-response": {
                "status": "ok",
                "playlist": {
                    "id": "p1", "name": "Mix",
                    "entry": { "id": "1", "title": "Only" }
                }
            }
        });
        let playlist: SubsonicPlaylist =
            decode(&raw, "getPlaylist", "playlist").expect("playlist should decode");
        assert_eq!(playlist.entry.len(), 1);
        assert_eq!(playlist.entry[0].title, "Only");
    }

    #[test]
    fn test_play_queue_prefers_stored_index_over_current_id() {
        let queue: SubsonicPlayQueue = serde_json::from_value(json!({
            "entry": [{ "id": "A", "title": "A" }, { "id": "B", "title": "B" }, { "id": "A", "title": "A" }],
            "current": "A",
            "currentIndex": 2,
            "positionMs": 90
        }))
        .expect("queue should decode");
        assert_eq!(queue.resolved_current_index(), Some(2));
        assert_eq!(queue.position, Some(90));

        let stale = SubsonicPlayQueue {
            current_index: Some(7),
            ..queue.clone()
        };
        assert_eq!(stale.resolved_current_index(), Some(0));
    }

    #[test]
    fn test_absent_play_queue_decodes_to_none() {
        let raw = json!({ "subsonic-response": { "status": "ok" } });
        let queue: Option<SubsonicPlayQueue> =
            decode_optional(&raw, "getPlayQueue", "playQueue").expect("ok envelope");
        assert!(queue.is_none());
    }
}
