//! Backend-agnostic entity model.
//!
//! Every entity produced by a normalizer carries the originating `server_id`
//! and `server_type` so later operations (favorite, rate, stream) can be routed
//! back to the backend that produced it.

use std::fmt;
use std::ops::{Deref, DerefMut};

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Supported server protocol families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ServerType {
    Navidrome,
    Subsonic,
}

impl fmt::Display for ServerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Navidrome => f.write_str("navidrome"),
            Self::Subsonic => f.write_str("subsonic"),
        }
    }
}

/// Library item kinds, used when routing favorite/rating calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LibraryItem {
    Song,
    Album,
    AlbumArtist,
    Playlist,
    Genre,
}

/// Artist reference attached to songs and albums.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedArtist {
    pub id: String,
    pub name: String,
    pub image_url: Option<String>,
}

impl RelatedArtist {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            image_url: None,
        }
    }
}

/// Contributor roles in first-appearance order.
///
/// Keys are either a bare role (`"composer"`) or a role with its sub-role
/// folded in (`"performer (guitar)"`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Participants {
    entries: Vec<(String, Vec<RelatedArtist>)>,
}

impl Participants {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `artist` under `role`, creating the role at the end if unseen.
    pub fn push(&mut self, role: impl Into<String>, artist: RelatedArtist) {
        let role = role.into();
        match self.entries.iter_mut().find(|(key, _)| *key == role) {
            Some((_, artists)) => artists.push(artist),
            None => self.entries.push((role, vec![artist])),
        }
    }

    pub fn get(&self, role: &str) -> Option<&[RelatedArtist]> {
        self.entries
            .iter()
            .find(|(key, _)| key == role)
            .map(|(_, artists)| artists.as_slice())
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }
}

impl Serialize for Participants {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (role, artists) in &self.entries {
            map.serialize_entry(role, artists)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Participants {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = deserializer.deserialize_map(OrderedEntriesVisitor::default())?;
        Ok(Self { entries })
    }
}

/// Map visitor that keeps keys in document order.
pub(crate) struct OrderedEntriesVisitor<V> {
    marker: std::marker::PhantomData<V>,
}

impl<V> Default for OrderedEntriesVisitor<V> {
    fn default() -> Self {
        Self {
            marker: std::marker::PhantomData,
        }
    }
}

impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedEntriesVisitor<V> {
    type Value = Vec<(String, V)>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((key, value)) = access.next_entry::<String, V>()? {
            entries.push((key, value));
        }
        Ok(entries)
    }
}

/// ReplayGain album/track pair. Each side is independently optional.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReplayGainPair {
    pub album: Option<f64>,
    pub track: Option<f64>,
}

impl ReplayGainPair {
    /// Returns `None` when neither side carries a value.
    pub fn from_parts(album: Option<f64>, track: Option<f64>) -> Option<Self> {
        if album.is_none() && track.is_none() {
            None
        } else {
            Some(Self { album, track })
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Genre {
    pub id: String,
    pub name: String,
    pub image_url: Option<String>,
    pub album_count: Option<u32>,
    pub song_count: Option<u32>,
}

impl Genre {
    pub fn named(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            image_url: None,
            album_count: None,
            song_count: None,
        }
    }
}

/// The unified song entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    /// Library song id on the originating server.
    pub id: String,
    /// Playlist row identity, present only for songs read from a playlist.
    pub playlist_item_id: Option<String>,
    pub server_id: String,
    pub server_type: ServerType,
    pub name: String,
    pub album: String,
    pub album_id: String,
    pub artist_name: String,
    pub artists: Vec<RelatedArtist>,
    pub album_artists: Vec<RelatedArtist>,
    pub participants: Option<Participants>,
    pub track_number: u32,
    pub disc_number: u32,
    pub disc_subtitle: Option<String>,
    /// Milliseconds.
    pub duration: u64,
    pub genres: Vec<Genre>,
    pub gain: Option<ReplayGainPair>,
    pub peak: Option<ReplayGainPair>,
    pub bit_rate: u32,
    pub bpm: Option<u32>,
    pub channels: Option<u32>,
    pub comment: Option<String>,
    pub compilation: Option<bool>,
    pub container: Option<String>,
    pub path: Option<String>,
    pub size: Option<u64>,
    pub lyrics: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub release_date: Option<String>,
    pub release_year: Option<String>,
    pub play_count: u32,
    pub last_played_at: Option<String>,
    pub user_favorite: bool,
    pub user_rating: Option<u32>,
    pub image_url: Option<String>,
    pub stream_url: String,
}

/// A song placed in the playback queue.
///
/// `unique_id` distinguishes repeated occurrences of the same library song.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSong {
    pub unique_id: String,
    #[serde(flatten)]
    pub song: Song,
}

impl Deref for QueueSong {
    type Target = Song;

    fn deref(&self) -> &Self::Target {
        &self.song
    }
}

impl DerefMut for QueueSong {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.song
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    pub id: String,
    pub server_id: String,
    pub server_type: ServerType,
    pub name: String,
    pub album_artist: String,
    pub artists: Vec<RelatedArtist>,
    pub album_artists: Vec<RelatedArtist>,
    pub participants: Option<Participants>,
    pub backdrop_image_url: Option<String>,
    pub comment: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    /// Milliseconds.
    pub duration: Option<u64>,
    pub genres: Vec<Genre>,
    pub image_url: Option<String>,
    pub is_compilation: Option<bool>,
    pub last_played_at: Option<String>,
    pub mbz_id: Option<String>,
    pub original_date: Option<String>,
    pub play_count: Option<u32>,
    pub release_date: Option<String>,
    pub release_year: Option<i32>,
    pub size: Option<u64>,
    pub song_count: u32,
    /// Populated only by detail lookups.
    pub songs: Option<Vec<Song>>,
    pub user_favorite: bool,
    pub user_rating: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumArtist {
    pub id: String,
    pub server_id: String,
    pub server_type: ServerType,
    pub name: String,
    pub album_count: u32,
    pub song_count: Option<u32>,
    pub biography: Option<String>,
    pub genres: Vec<Genre>,
    pub image_url: Option<String>,
    pub last_played_at: Option<String>,
    pub mbz: Option<String>,
    pub play_count: Option<u32>,
    pub similar_artists: Vec<RelatedArtist>,
    pub user_favorite: bool,
    pub user_rating: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub id: String,
    pub server_id: String,
    pub server_type: ServerType,
    pub name: String,
    pub description: Option<String>,
    /// Milliseconds.
    pub duration: u64,
    pub image_url: Option<String>,
    pub owner: Option<String>,
    pub owner_id: Option<String>,
    pub public: bool,
    /// Smart-playlist rules, passed through untouched.
    pub rules: Option<serde_json::Value>,
    pub size: Option<u64>,
    pub song_count: u32,
    pub sync: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub is_admin: bool,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub last_login_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::{Participants, RelatedArtist, ReplayGainPair, ServerType};

    #[test]
    fn test_participants_serialize_in_insertion_order() {
        let mut participants = Participants::new();
        participants.push("producer", RelatedArtist::new("2", "Zed"));
        participants.push("composer", RelatedArtist::new("1", "Amy"));
        participants.push("producer", RelatedArtist::new("3", "Max"));

        let json = serde_json::to_string(&participants).expect("participants should serialize");
        let producer_at = json.find("producer").expect("producer key");
        let composer_at = json.find("composer").expect("composer key");
        assert!(producer_at < composer_at);
        assert_eq!(participants.get("producer").map(|list| list.len()), Some(2));
        assert_eq!(
            participants.roles().collect::<Vec<_>>(),
            vec!["producer", "composer"]
        );
    }

    #[test]
    fn test_participants_deserialize_preserves_document_order() {
        let parsed: Participants = serde_json::from_str(
            r#"{"mixer":[{"id":"9","name":"Ann","imageUrl":null}],"arranger":[]}"#,
        )
        .expect("participants should parse");

        assert_eq!(parsed.roles().collect::<Vec<_>>(), vec!["mixer", "arranger"]);
        assert_eq!(parsed.get("arranger"), Some(&[][..]));
    }

    #[test]
    fn test_replay_gain_pair_is_none_only_when_both_sides_missing() {
        assert_eq!(ReplayGainPair::from_parts(None, None), None);
        let pair = ReplayGainPair::from_parts(None, Some(-6.5)).expect("track gain present");
        assert_eq!(pair.album, None);
        assert_eq!(pair.track, Some(-6.5));
    }

    #[test]
    fn test_server_type_serializes_upper_case() {
        assert_eq!(
            serde_json::to_string(&ServerType::Navidrome).expect("serialize"),
            "\"NAVIDROME\""
        );
    }
}
