use crate::backends::media::{
    collapse_never_date, cover_art_url, january_first_utc, stream_url,
};
use crate::backends::subsonic::schema::{
    ArtistFields, ArtistRef, SubsonicAlbum, SubsonicArtist, SubsonicGenre, SubsonicPlaylist,
    SubsonicSong,
};
use crate::backends::ServerContext;
use crate::model::{
    Album, AlbumArtist, Genre, Participants, Playlist, RelatedArtist, ReplayGainPair, ServerType,
    Song,
};

pub const DEFAULT_SONG_IMAGE_SIZE: u32 = 300;
pub const DEFAULT_ALBUM_IMAGE_SIZE: u32 = 300;
pub const DEFAULT_ARTIST_IMAGE_SIZE: u32 = 100;
pub const DEFAULT_PLAYLIST_IMAGE_SIZE: u32 = 300;

fn related(list: &[ArtistRef]) -> Vec<RelatedArtist> {
    list.iter()
        .map(|artist| RelatedArtist::new(artist.id.clone(), artist.name.clone()))
        .collect()
}

fn flat_artist<T: ArtistFields>(item: &T) -> Vec<RelatedArtist> {
    vec![RelatedArtist::new(
        item.artist_id().unwrap_or_default(),
        item.artist().unwrap_or_default(),
    )]
}

struct ResolvedArtists {
    artists: Vec<RelatedArtist>,
    album_artists: Vec<RelatedArtist>,
    participants: Option<Participants>,
}

/// Role lists win over the flat `artist`/`artistId` pair, which is only a fallback.
fn resolve_artists<T: ArtistFields>(item: &T) -> ResolvedArtists {
    let artists = item
        .artists()
        .map(related)
        .unwrap_or_else(|| flat_artist(item));
    let album_artists = item
        .album_artists()
        .map(related)
        .unwrap_or_else(|| flat_artist(item));

    let participants = item.contributors().map(|contributors| {
        let mut participants = Participants::new();
        for contributor in contributors {
            let role = match contributor.sub_role.as_deref() {
                Some(sub_role) if !sub_role.is_empty() => {
                    format!("{} ({})", contributor.role, sub_role)
                }
                _ => contributor.role.clone(),
            };
            participants.push(
                role,
                RelatedArtist::new(
                    contributor.artist.id.clone().unwrap_or_default(),
                    contributor.artist.name.clone().unwrap_or_default(),
                ),
            );
        }
        participants
    });

    ResolvedArtists {
        artists,
        album_artists,
        participants,
    }
}

fn resolve_genres<T: ArtistFields>(item: &T) -> Vec<Genre> {
    if let Some(genres) = item.genres() {
        return genres
            .iter()
            .map(|genre| Genre::named(genre.name.clone(), genre.name.clone()))
            .collect();
    }
    item.genre()
        .filter(|genre| !genre.is_empty())
        .map(|genre| vec![Genre::named(genre, genre)])
        .unwrap_or_default()
}

fn image_size(requested: Option<u32>, default: u32) -> u32 {
    requested.filter(|size| *size > 0).unwrap_or(default)
}

pub fn song(item: &SubsonicSong, server: &ServerContext, size: Option<u32>) -> Song {
    let ResolvedArtists {
        artists,
        album_artists,
        participants,
    } = resolve_artists(item);
    let replay_gain = item.replay_gain.clone().unwrap_or_default();

    Song {
        id: item.id.clone(),
        playlist_item_id: None,
        server_id: server.id.clone(),
        server_type: ServerType::Subsonic,
        name: item.title.clone(),
        album: item.album.clone().unwrap_or_default(),
        album_id: item.album_id.clone().unwrap_or_default(),
        artist_name: item
            .display_artist
            .clone()
            .or_else(|| item.artist.clone())
            .unwrap_or_default(),
        artists,
        album_artists,
        participants,
        track_number: item.track.filter(|track| *track > 0).unwrap_or(1),
        disc_number: item.disc_number.filter(|disc| *disc > 0).unwrap_or(1),
        disc_subtitle: None,
        duration: item.duration.unwrap_or(0) * 1000,
        genres: resolve_genres(item),
        gain: ReplayGainPair::from_parts(replay_gain.album_gain, replay_gain.track_gain),
        peak: ReplayGainPair::from_parts(replay_gain.album_peak, replay_gain.track_peak),
        bit_rate: item.bit_rate.unwrap_or(0),
        bpm: item.bpm.filter(|bpm| *bpm > 0),
        channels: item.channel_count,
        comment: item.comment.clone().filter(|comment| !comment.is_empty()),
        compilation: None,
        container: item.content_type.clone(),
        path: item.path.clone(),
        size: item.size,
        lyrics: None,
        created_at: item.created.clone(),
        updated_at: None,
        release_date: None,
        release_year: item.year.map(|year| year.to_string()),
        play_count: item.play_count.unwrap_or(0),
        last_played_at: collapse_never_date(item.played.as_deref()),
        user_favorite: item.starred.is_some(),
        user_rating: item.user_rating.filter(|rating| *rating > 0),
        image_url: cover_art_url(
            server,
            item.cover_art.as_deref(),
            image_size(size, DEFAULT_SONG_IMAGE_SIZE),
        ),
        stream_url: stream_url(server, &item.id),
    }
}

pub fn album(item: &SubsonicAlbum, server: &ServerContext, size: Option<u32>) -> Album {
    let ResolvedArtists {
        artists,
        album_artists,
        participants,
    } = resolve_artists(item);

    Album {
        id: item.id.clone(),
        server_id: server.id.clone(),
        server_type: ServerType::Subsonic,
        name: item.name.clone(),
        album_artist: item.artist.clone().unwrap_or_default(),
        artists,
        album_artists,
        participants,
        backdrop_image_url: None,
        comment: None,
        created_at: item.created.clone(),
        updated_at: item.created.clone(),
        duration: Some(item.duration * 1000),
        genres: resolve_genres(item),
        image_url: cover_art_url(
            server,
            item.cover_art.as_deref(),
            image_size(size, DEFAULT_ALBUM_IMAGE_SIZE),
        ),
        is_compilation: item.is_compilation,
        last_played_at: collapse_never_date(item.played.as_deref()),
        mbz_id: item.music_brainz_id.clone().filter(|id| !id.is_empty()),
        original_date: None,
        play_count: item.play_count,
        release_date: item.year.and_then(january_first_utc),
        release_year: item.year,
        size: None,
        song_count: item.song_count,
        songs: Some(
            item.song
                .iter()
                .map(|entry| song(entry, server, None))
                .collect(),
        ),
        user_favorite: item.starred.is_some(),
        user_rating: item.user_rating.filter(|rating| *rating > 0),
    }
}

pub fn album_artist(item: &SubsonicArtist, server: &ServerContext, size: Option<u32>) -> AlbumArtist {
    AlbumArtist {
        id: item.id.clone(),
        server_id: server.id.clone(),
        server_type: ServerType::Subsonic,
        name: item.name.clone(),
        album_count: item.album_count.unwrap_or(0),
        song_count: None,
        biography: None,
        genres: Vec::new(),
        image_url: cover_art_url(
            server,
            item.cover_art.as_deref(),
            image_size(size, DEFAULT_ARTIST_IMAGE_SIZE),
        ),
        last_played_at: None,
        mbz: item.music_brainz_id.clone().filter(|id| !id.is_empty()),
        play_count: None,
        similar_artists: Vec::new(),
        user_favorite: item.starred.is_some(),
        user_rating: item.user_rating.filter(|rating| *rating > 0),
    }
}

/// Playlist durations arrive in seconds.
pub fn playlist(item: &SubsonicPlaylist, server: &ServerContext) -> Playlist {
    Playlist {
        id: item.id.clone(),
        server_id: server.id.clone(),
        server_type: ServerType::Subsonic,
        name: item.name.clone(),
        description: item.comment.clone().filter(|comment| !comment.is_empty()),
        duration: item.duration * 1000,
        image_url: cover_art_url(server, item.cover_art.as_deref(), DEFAULT_PLAYLIST_IMAGE_SIZE),
        owner: item.owner.clone(),
        owner_id: item.owner.clone(),
        public: item.public,
        rules: None,
        size: None,
        song_count: item.song_count,
        sync: None,
    }
}

pub fn genre(item: &SubsonicGenre) -> Genre {
    Genre {
        id: item.value.clone(),
        name: item.value.clone(),
        image_url: None,
        album_count: Some(item.album_count),
        song_count: Some(item.song_count),
    }
}
