//! Backend-agnostic dispatch facade.
//!
//! Each operation picks the request shape and normalizer for the server's
//! backend, so callers never branch on [`ServerType`].

use std::sync::Arc;

use log::debug;
use serde_json::Value;

use crate::backends::navidrome::normalize as nd;
use crate::backends::navidrome::schema::{
    self as nd_schema, NavidromeTrack, NdAlbum, NdArtist, NdGenre, NdPlaylist, NdPlaylistSong,
    NdSong, NdUser,
};
use crate::backends::subsonic::normalize as ss;
use crate::backends::subsonic::schema::{
    self as ss_schema, ArtistInfo, ArtistsPayload, GenresPayload, PlaylistsPayload,
    SongListPayload, SubsonicAlbum, SubsonicArtist, SubsonicPlayQueue, SubsonicPlaylist,
    SubsonicSong,
};
use crate::backends::{BackendRequest, ServerContext, Transport};
use crate::error::ApiError;
use crate::model::{Album, AlbumArtist, Genre, LibraryItem, Playlist, ServerType, Song, User};
use crate::queue_snapshot::QueueSnapshot;

/// Offset/limit window for list operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 500,
        }
    }
}

impl Page {
    fn navidrome_params(&self, request: BackendRequest) -> BackendRequest {
        request
            .param("_start", self.offset)
            .param("_end", self.offset + self.limit)
    }

    fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.offset)
            .take(self.limit)
            .collect()
    }
}

/// Image sizes requested from normalizers; `None` uses each backend's default.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ImageSizes {
    pub song: Option<u32>,
    pub album: Option<u32>,
    pub artist: Option<u32>,
}

pub struct ApiClient {
    transport: Arc<dyn Transport>,
    image_sizes: ImageSizes,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            image_sizes: ImageSizes::default(),
        }
    }

    pub fn with_image_sizes(mut self, image_sizes: ImageSizes) -> Self {
        self.image_sizes = image_sizes;
        self
    }

    fn invoke(&self, server: &ServerContext, request: BackendRequest) -> Result<Value, ApiError> {
        debug!(
            "ApiClient: {} on {} server {}",
            request.operation, server.server_type, server.id
        );
        Ok(self.transport.invoke(server, &request)?)
    }

    pub fn get_song(&self, server: &ServerContext, id: &str) -> Result<Song, ApiError> {
        const OP: &str = "getSong";
        match server.server_type {
            ServerType::Subsonic => {
                let raw = self.invoke(server, BackendRequest::subsonic(OP, "getSong").param("id", id))?;
                let song: SubsonicSong = ss_schema::decode(&raw, OP, "song")?;
                Ok(ss::song(&song, server, self.image_sizes.song))
            }
            ServerType::Navidrome => {
                let raw = self.invoke(server, BackendRequest::navidrome(OP, format!("song/{id}")))?;
                let song: NdSong = nd_schema::decode(raw, OP)?;
                Ok(nd::song(&NavidromeTrack::Library(song), server, self.image_sizes.song))
            }
        }
    }

    /// Album with its songs populated.
    pub fn get_album_detail(&self, server: &ServerContext, id: &str) -> Result<Album, ApiError> {
        const OP: &str = "getAlbumDetail";
        match server.server_type {
            ServerType::Subsonic => {
                let raw = self.invoke(server, BackendRequest::subsonic(OP, "getAlbum").param("id", id))?;
                let album: SubsonicAlbum = ss_schema::decode(&raw, OP, "album")?;
                Ok(ss::album(&album, server, self.image_sizes.album))
            }
            ServerType::Navidrome => {
                let raw = self.invoke(server, BackendRequest::navidrome(OP, format!("album/{id}")))?;
                let album: NdAlbum = nd_schema::decode(raw, OP)?;
                let raw_songs = self.invoke(
                    server,
                    BackendRequest::navidrome(OP, "song")
                        .param("album_id", id)
                        .param("_sort", "album")
                        .param("_order", "ASC"),
                )?;
                let songs: Vec<NdSong> = nd_schema::decode(raw_songs, OP)?;
                Ok(nd::album(&album, Some(&songs), server, self.image_sizes.album))
            }
        }
    }

    pub fn get_album_artist_detail(
        &self,
        server: &ServerContext,
        id: &str,
    ) -> Result<AlbumArtist, ApiError> {
        const OP: &str = "getAlbumArtistDetail";
        match server.server_type {
            ServerType::Subsonic => {
                let raw = self.invoke(server, BackendRequest::subsonic(OP, "getArtist").param("id", id))?;
                let artist: SubsonicArtist = ss_schema::decode(&raw, OP, "artist")?;
                Ok(ss::album_artist(&artist, server, self.image_sizes.artist))
            }
            ServerType::Navidrome => {
                let raw = self.invoke(server, BackendRequest::navidrome(OP, format!("artist/{id}")))?;
                let artist: NdArtist = nd_schema::decode(raw, OP)?;
                let raw_info = self.invoke(
                    server,
                    BackendRequest::subsonic(OP, "getArtistInfo2")
                        .param("id", id)
                        .param("count", 10),
                )?;
                let info: ArtistInfo =
                    ss_schema::decode_optional(&raw_info, OP, "artistInfo2")?.unwrap_or_default();
                Ok(nd::album_artist(
                    &artist,
                    &info.similar_artist,
                    server,
                    self.image_sizes.artist,
                ))
            }
        }
    }

    pub fn get_album_artist_list(
        &self,
        server: &ServerContext,
        page: Page,
    ) -> Result<Vec<AlbumArtist>, ApiError> {
        const OP: &str = "getAlbumArtistList";
        match server.server_type {
            ServerType::Subsonic => {
                let raw = self.invoke(server, BackendRequest::subsonic(OP, "getArtists"))?;
                let payload: ArtistsPayload = ss_schema::decode(&raw, OP, "artists")?;
                let artists = payload
                    .index
                    .iter()
                    .flat_map(|index| index.artist.iter())
                    .map(|artist| ss::album_artist(artist, server, self.image_sizes.artist))
                    .collect();
                Ok(page.apply(artists))
            }
            ServerType::Navidrome => {
                let request = BackendRequest::navidrome(OP, "artist")
                    .param("_sort", "name")
                    .param("_order", "ASC");
                let raw = self.invoke(server, page.navidrome_params(request))?;
                let artists: Vec<NdArtist> = nd_schema::decode(raw, OP)?;
                Ok(artists
                    .iter()
                    .map(|artist| nd::album_artist(artist, &[], server, self.image_sizes.artist))
                    .collect())
            }
        }
    }

    pub fn get_playlist_detail(&self, server: &ServerContext, id: &str) -> Result<Playlist, ApiError> {
        const OP: &str = "getPlaylistDetail";
        match server.server_type {
            ServerType::Subsonic => {
                let raw = self.invoke(server, BackendRequest::subsonic(OP, "getPlaylist").param("id", id))?;
                let playlist: SubsonicPlaylist = ss_schema::decode(&raw, OP, "playlist")?;
                Ok(ss::playlist(&playlist, server))
            }
            ServerType::Navidrome => {
                let raw = self.invoke(server, BackendRequest::navidrome(OP, format!("playlist/{id}")))?;
                let playlist: NdPlaylist = nd_schema::decode(raw, OP)?;
                Ok(nd::playlist(&playlist, server, None))
            }
        }
    }

    /// Playlist rows; Navidrome rows carry `playlist_item_id`.
    pub fn get_playlist_song_list(&self, server: &ServerContext, id: &str) -> Result<Vec<Song>, ApiError> {
        const OP: &str = "getPlaylistSongList";
        match server.server_type {
            ServerType::Subsonic => {
                let raw = self.invoke(server, BackendRequest::subsonic(OP, "getPlaylist").param("id", id))?;
                let playlist: SubsonicPlaylist = ss_schema::decode(&raw, OP, "playlist")?;
                Ok(playlist
                    .entry
                    .iter()
                    .map(|song| ss::song(song, server, self.image_sizes.song))
                    .collect())
            }
            ServerType::Navidrome => {
                let raw = self.invoke(
                    server,
                    BackendRequest::navidrome(OP, format!("playlist/{id}/tracks"))
                        .param("_sort", "id")
                        .param("_order", "ASC"),
                )?;
                let entries: Vec<NdPlaylistSong> = nd_schema::decode(raw, OP)?;
                Ok(entries
                    .into_iter()
                    .map(|entry| nd::song(&NavidromeTrack::PlaylistEntry(entry), server, self.image_sizes.song))
                    .collect())
            }
        }
    }

    pub fn get_playlist_list(&self, server: &ServerContext, page: Page) -> Result<Vec<Playlist>, ApiError> {
        const OP: &str = "getPlaylistList";
        match server.server_type {
            ServerType::Subsonic => {
                let raw = self.invoke(server, BackendRequest::subsonic(OP, "getPlaylists"))?;
                let payload: PlaylistsPayload = ss_schema::decode(&raw, OP, "playlists")?;
                let playlists = payload
                    .playlist
                    .iter()
                    .map(|playlist| ss::playlist(playlist, server))
                    .collect();
                Ok(page.apply(playlists))
            }
            ServerType::Navidrome => {
                let request = BackendRequest::navidrome(OP, "playlist")
                    .param("_sort", "name")
                    .param("_order", "ASC");
                let raw = self.invoke(server, page.navidrome_params(request))?;
                let playlists: Vec<NdPlaylist> = nd_schema::decode(raw, OP)?;
                Ok(playlists
                    .iter()
                    .map(|playlist| nd::playlist(playlist, server, None))
                    .collect())
            }
        }
    }

    pub fn get_genre_list(&self, server: &ServerContext) -> Result<Vec<Genre>, ApiError> {
        const OP: &str = "getGenreList";
        match server.server_type {
            ServerType::Subsonic => {
                let raw = self.invoke(server, BackendRequest::subsonic(OP, "getGenres"))?;
                let payload: GenresPayload = ss_schema::decode(&raw, OP, "genres")?;
                Ok(payload.genre.iter().map(ss::genre).collect())
            }
            ServerType::Navidrome => {
                let raw = self.invoke(
                    server,
                    BackendRequest::navidrome(OP, "genre")
                        .param("_sort", "name")
                        .param("_order", "ASC"),
                )?;
                let genres: Vec<NdGenre> = nd_schema::decode(raw, OP)?;
                Ok(genres.iter().map(nd::genre).collect())
            }
        }
    }

    pub fn get_user_list(&self, server: &ServerContext) -> Result<Vec<User>, ApiError> {
        const OP: &str = "getUserList";
        match server.server_type {
            ServerType::Subsonic => Err(ApiError::Unsupported {
                operation: OP,
                server_type: ServerType::Subsonic,
            }),
            ServerType::Navidrome => {
                let raw = self.invoke(
                    server,
                    BackendRequest::navidrome(OP, "user")
                        .param("_sort", "name")
                        .param("_order", "ASC"),
                )?;
                let users: Vec<NdUser> = nd_schema::decode(raw, OP)?;
                Ok(users.iter().map(nd::user).collect())
            }
        }
    }

    pub fn get_random_song_list(
        &self,
        server: &ServerContext,
        size: usize,
        genre: Option<&str>,
    ) -> Result<Vec<Song>, ApiError> {
        const OP: &str = "getRandomSongList";
        match server.server_type {
            ServerType::Subsonic => {
                let mut request = BackendRequest::subsonic(OP, "getRandomSongs").param("size", size);
                if let Some(genre) = genre {
                    request = request.param("genre", genre);
                }
                let raw = self.invoke(server, request)?;
                let payload: SongListPayload = ss_schema::decode(&raw, OP, "randomSongs")?;
                Ok(payload
                    .song
                    .iter()
                    .map(|song| ss::song(song, server, self.image_sizes.song))
                    .collect())
            }
            ServerType::Navidrome => {
                let mut request = BackendRequest::navidrome(OP, "song")
                    .param("_sort", "random")
                    .param("_order", "ASC")
                    .param("_start", 0)
                    .param("_end", size);
                if let Some(genre) = genre {
                    request = request.param("genre_id", genre);
                }
                let raw = self.invoke(server, request)?;
                let songs: Vec<NdSong> = nd_schema::decode(raw, OP)?;
                Ok(songs
                    .into_iter()
                    .map(|song| nd::song(&NavidromeTrack::Library(song), server, self.image_sizes.song))
                    .collect())
            }
        }
    }

    /// Stars or unstars items through the Subsonic-compatible API, which both
    /// backends implement.
    pub fn set_favorite(
        &self,
        server: &ServerContext,
        item: LibraryItem,
        ids: &[String],
        favorite: bool,
    ) -> Result<(), ApiError> {
        const OP: &str = "setFavorite";
        let key = match item {
            LibraryItem::Song => "id",
            LibraryItem::Album => "albumId",
            LibraryItem::AlbumArtist => "artistId",
            LibraryItem::Playlist | LibraryItem::Genre => {
                return Err(ApiError::Unsupported {
                    operation: OP,
                    server_type: server.server_type,
                })
            }
        };
        if ids.is_empty() {
            return Ok(());
        }
        let method = if favorite { "star" } else { "unstar" };
        let raw = self.invoke(server, BackendRequest::subsonic(OP, method).params(key, ids))?;
        ss_schema::decode_empty(&raw, OP)
    }

    /// Rates each id; `0` clears the rating.
    pub fn set_rating(&self, server: &ServerContext, ids: &[String], rating: u32) -> Result<(), ApiError> {
        const OP: &str = "setRating";
        let rating = rating.min(5);
        for id in ids {
            let raw = self.invoke(
                server,
                BackendRequest::subsonic(OP, "setRating")
                    .param("id", id)
                    .param("rating", rating),
            )?;
            ss_schema::decode_empty(&raw, OP)?;
        }
        Ok(())
    }

    /// Reports a play; `submission = false` only updates "now playing".
    pub fn scrobble(
        &self,
        server: &ServerContext,
        id: &str,
        submission: bool,
        time_ms: Option<i64>,
    ) -> Result<(), ApiError> {
        const OP: &str = "scrobble";
        let mut request = BackendRequest::subsonic(OP, "scrobble")
            .param("id", id)
            .param("submission", submission);
        if let Some(time_ms) = time_ms {
            request = request.param("time", time_ms);
        }
        let raw = self.invoke(server, request)?;
        ss_schema::decode_empty(&raw, OP)
    }

    /// Saves the whole queue. The index is sent alongside the current id so
    /// duplicated songs restore to the right occurrence.
    pub fn save_play_queue(&self, server: &ServerContext, snapshot: &QueueSnapshot) -> Result<(), ApiError> {
        const OP: &str = "savePlayQueue";
        let mut request = BackendRequest::subsonic(OP, "savePlayQueue").params("id", snapshot.song_ids());
        if let (Some(current), Some(index)) = (snapshot.current_song_id(), snapshot.current_index) {
            request = request
                .param("current", current)
                .param("currentIndex", index)
                .param("position", snapshot.position_ms);
        }
        let raw = self.invoke(server, request)?;
        ss_schema::decode_empty(&raw, OP)
    }

    /// Updates only the current pointer and position of the saved queue,
    /// leaving its song list alone.
    pub fn save_play_queue_position(
        &self,
        server: &ServerContext,
        current_song_id: Option<&str>,
        current_index: Option<usize>,
        position_ms: u64,
    ) -> Result<(), ApiError> {
        const OP: &str = "savePlayQueue2";
        let mut request = BackendRequest::subsonic(OP, "savePlayQueue2").form_encoded();
        if let Some(current) = current_song_id {
            request = request.param("current", current);
        }
        if let Some(index) = current_index {
            request = request
                .param("currentIndex", index)
                .param("positionMs", position_ms);
        }
        let raw = self.invoke(server, request)?;
        ss_schema::decode_empty(&raw, OP)
    }

    /// The server-side saved queue, or `None` when nothing is saved.
    pub fn get_play_queue(&self, server: &ServerContext) -> Result<Option<QueueSnapshot>, ApiError> {
        const OP: &str = "getPlayQueue";
        let raw = self.invoke(server, BackendRequest::subsonic(OP, "getPlayQueue"))?;
        let Some(queue) = ss_schema::decode_optional::<SubsonicPlayQueue>(&raw, OP, "playQueue")? else {
            return Ok(None);
        };
        Ok(Some(QueueSnapshot::from_song_ids(
            queue.entry.iter().map(|song| song.id.clone()),
            queue.resolved_current_index(),
            queue.position.unwrap_or(0),
        )))
    }
}
