use crate::backends::media::{
    collapse_never_date, cover_art_url, date_part, january_first_utc, normalize_release_date,
    resize_cover_art_url, stream_url,
};
use crate::backends::navidrome::schema::{
    NavidromeTrack, NdAlbum, NdArtist, NdGenre, NdParticipants, NdPlaylist, NdSong, NdUser,
};
use crate::backends::subsonic::schema::SimilarArtist;
use crate::backends::ServerContext;
use crate::model::{
    Album, AlbumArtist, Genre, Participants, Playlist, RelatedArtist, ReplayGainPair, ServerType,
    Song, User,
};

pub const DEFAULT_SONG_IMAGE_SIZE: u32 = 100;
pub const DEFAULT_ALBUM_IMAGE_SIZE: u32 = 300;
pub const DEFAULT_ARTIST_IMAGE_SIZE: u32 = 300;
pub const DEFAULT_PLAYLIST_IMAGE_SIZE: u32 = 300;
const BACKDROP_IMAGE_SIZE: u32 = 1000;
const ARTIST_PLACEHOLDER_IMAGE: &str = "/app/artist-placeholder.webp";

const ALBUM_ARTIST_ROLE: &str = "albumartist";
const ARTIST_ROLE: &str = "artist";

struct ResolvedArtists {
    artists: Vec<RelatedArtist>,
    album_artists: Vec<RelatedArtist>,
    participants: Option<Participants>,
}

/// Splits `participants` into the artist/album-artist lists and the remaining
/// roles, folding sub-roles into `"role (subRole)"` keys.
fn resolve_artists(
    participants: Option<&NdParticipants>,
    artist: (&str, &str),
    album_artist: (&str, &str),
) -> ResolvedArtists {
    let mut artists = None;
    let mut album_artists = None;
    let mut others = None;

    if let Some(NdParticipants(roles)) = participants {
        let mut folded = Participants::new();
        for (role, list) in roles {
            if role == ARTIST_ROLE || role == ALBUM_ARTIST_ROLE {
                let related: Vec<RelatedArtist> = list
                    .iter()
                    .map(|entry| RelatedArtist::new(entry.id.clone(), entry.name.clone()))
                    .collect();
                if role == ARTIST_ROLE {
                    artists = Some(related);
                } else {
                    album_artists = Some(related);
                }
                continue;
            }

            // Sub-roles of one role are grouped in first-appearance order.
            let mut groups: Vec<(Option<&str>, Vec<RelatedArtist>)> = Vec::new();
            for entry in list {
                let sub_role = entry.sub_role.as_deref().filter(|value| !value.is_empty());
                let related = RelatedArtist::new(entry.id.clone(), entry.name.clone());
                match groups.iter_mut().find(|(key, _)| *key == sub_role) {
                    Some((_, members)) => members.push(related),
                    None => groups.push((sub_role, vec![related])),
                }
            }
            for (sub_role, members) in groups {
                let key = match sub_role {
                    Some(sub_role) => format!("{role} ({sub_role})"),
                    None => role.clone(),
                };
                for member in members {
                    folded.push(key.clone(), member);
                }
            }
        }
        others = Some(folded);
    }

    ResolvedArtists {
        artists: artists.unwrap_or_else(|| vec![RelatedArtist::new(artist.0, artist.1)]),
        album_artists: album_artists
            .unwrap_or_else(|| vec![RelatedArtist::new(album_artist.0, album_artist.1)]),
        participants: others,
    }
}

fn genres(list: Option<&[NdGenre]>) -> Vec<Genre> {
    list.unwrap_or_default()
        .iter()
        .map(|genre| Genre::named(genre.id.clone(), genre.name.clone()))
        .collect()
}

fn seconds_to_millis(seconds: f64) -> u64 {
    if seconds.is_finite() && seconds > 0.0 {
        (seconds * 1000.0).round() as u64
    } else {
        0
    }
}

fn release_date(release_date: Option<&str>, year: i32) -> Option<String> {
    release_date
        .and_then(normalize_release_date)
        .or_else(|| (year > 0).then(|| january_first_utc(year)).flatten())
}

fn image_size(requested: Option<u32>, default: u32) -> u32 {
    requested.filter(|size| *size > 0).unwrap_or(default)
}

/// Normalizes a library song or a playlist row.
///
/// Playlist rows carry the library id in `mediaFileId`; their own id becomes
/// `playlist_item_id`.
pub fn song(track: &NavidromeTrack, server: &ServerContext, size: Option<u32>) -> Song {
    let (id, playlist_item_id) = match track {
        NavidromeTrack::Library(song) => (song.id.clone(), None),
        NavidromeTrack::PlaylistEntry(entry) => {
            (entry.media_file_id.clone(), Some(entry.id.clone()))
        }
    };
    let item = track.fields();
    let ResolvedArtists {
        artists,
        album_artists,
        participants,
    } = resolve_artists(
        item.participants.as_ref(),
        (item.artist_id.as_str(), item.artist.as_str()),
        (item.album_artist_id.as_str(), item.album_artist.as_str()),
    );

    Song {
        image_url: cover_art_url(server, Some(&id), image_size(size, DEFAULT_SONG_IMAGE_SIZE)),
        stream_url: stream_url(server, &id),
        id,
        playlist_item_id,
        server_id: server.id.clone(),
        server_type: ServerType::Navidrome,
        name: item.title.clone(),
        album: item.album.clone(),
        album_id: item.album_id.clone(),
        artist_name: item.artist.clone(),
        artists,
        album_artists,
        participants,
        track_number: item.track_number,
        disc_number: item.disc_number,
        disc_subtitle: item.disc_subtitle.clone().filter(|value| !value.is_empty()),
        duration: seconds_to_millis(item.duration),
        genres: genres(item.genres.as_deref()),
        gain: ReplayGainPair::from_parts(item.rg_album_gain, item.rg_track_gain),
        peak: ReplayGainPair::from_parts(item.rg_album_peak, item.rg_track_peak),
        bit_rate: item.bit_rate,
        bpm: item.bpm.filter(|bpm| *bpm > 0),
        channels: item.channels.filter(|channels| *channels > 0),
        comment: item.comment.clone().filter(|value| !value.is_empty()),
        compilation: item.compilation,
        container: item.suffix.clone(),
        path: item.path.clone(),
        size: item.size,
        lyrics: item.lyrics.clone().filter(|value| !value.is_empty()),
        created_at: item.created_at.as_deref().map(date_part),
        updated_at: item.updated_at.clone(),
        release_date: release_date(item.release_date.as_deref(), item.year),
        release_year: (item.year > 0).then(|| item.year.to_string()),
        play_count: item.play_count.unwrap_or(0),
        last_played_at: collapse_never_date(item.play_date.as_deref()),
        user_favorite: item.starred,
        user_rating: item.rating.filter(|rating| *rating > 0),
    }
}

pub fn album(
    item: &NdAlbum,
    songs: Option<&[NdSong]>,
    server: &ServerContext,
    size: Option<u32>,
) -> Album {
    let ResolvedArtists {
        artists,
        album_artists,
        participants,
    } = resolve_artists(
        item.participants.as_ref(),
        (item.artist_id.as_str(), item.artist.as_str()),
        (item.album_artist_id.as_str(), item.album_artist.as_str()),
    );
    let cover_art_id = item
        .cover_art_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .unwrap_or(&item.id);
    let image_url = cover_art_url(
        server,
        Some(cover_art_id),
        image_size(size, DEFAULT_ALBUM_IMAGE_SIZE),
    );

    Album {
        id: item.id.clone(),
        server_id: server.id.clone(),
        server_type: ServerType::Navidrome,
        name: item.name.clone(),
        album_artist: item.album_artist.clone(),
        artists,
        album_artists,
        participants,
        backdrop_image_url: image_url
            .as_deref()
            .map(|url| resize_cover_art_url(url, BACKDROP_IMAGE_SIZE)),
        comment: item.comment.clone().filter(|value| !value.is_empty()),
        created_at: item.created_at.as_deref().map(date_part),
        updated_at: item.updated_at.clone(),
        duration: item.duration.map(seconds_to_millis),
        genres: genres(item.genres.as_deref()),
        image_url,
        is_compilation: item.compilation,
        last_played_at: collapse_never_date(item.play_date.as_deref()),
        mbz_id: item.mbz_album_id.clone().filter(|value| !value.is_empty()),
        original_date: release_date(
            item.original_date.as_deref(),
            item.original_year.unwrap_or(0),
        ),
        play_count: Some(item.play_count.unwrap_or(0)),
        release_date: release_date(item.release_date.as_deref(), item.min_year),
        release_year: (item.min_year > 0).then_some(item.min_year),
        size: item.size,
        song_count: item.song_count,
        songs: songs.map(|songs| {
            songs
                .iter()
                .map(|entry| song(&NavidromeTrack::Library(entry.clone()), server, None))
                .collect()
        }),
        user_favorite: item.starred,
        user_rating: item.rating.filter(|rating| *rating > 0),
    }
}

pub fn album_artist(
    item: &NdArtist,
    similar: &[SimilarArtist],
    server: &ServerContext,
    size: Option<u32>,
) -> AlbumArtist {
    let image_url = item
        .large_image_url
        .clone()
        .filter(|url| !url.is_empty() && url != ARTIST_PLACEHOLDER_IMAGE)
        .or_else(|| {
            cover_art_url(
                server,
                Some(&format!("ar-{}", item.id)),
                image_size(size, DEFAULT_ARTIST_IMAGE_SIZE),
            )
        });

    AlbumArtist {
        id: item.id.clone(),
        server_id: server.id.clone(),
        server_type: ServerType::Navidrome,
        name: item.name.clone(),
        album_count: item.album_count,
        song_count: item.song_count,
        biography: item.biography.clone().filter(|value| !value.is_empty()),
        genres: genres(item.genres.as_deref()),
        image_url,
        last_played_at: collapse_never_date(item.play_date.as_deref()),
        mbz: item.mbz_artist_id.clone().filter(|value| !value.is_empty()),
        play_count: Some(item.play_count.unwrap_or(0)),
        similar_artists: similar
            .iter()
            .map(|artist| RelatedArtist {
                id: artist.id.clone(),
                name: artist.name.clone(),
                image_url: artist.artist_image_url.clone().filter(|url| !url.is_empty()),
            })
            .collect(),
        user_favorite: item.starred,
        user_rating: item.rating.filter(|rating| *rating > 0),
    }
}

pub fn playlist(item: &NdPlaylist, server: &ServerContext, size: Option<u32>) -> Playlist {
    Playlist {
        id: item.id.clone(),
        server_id: server.id.clone(),
        server_type: ServerType::Navidrome,
        name: item.name.clone(),
        description: item.comment.clone().filter(|value| !value.is_empty()),
        duration: seconds_to_millis(item.duration),
        image_url: cover_art_url(
            server,
            Some(&item.id),
            image_size(size, DEFAULT_PLAYLIST_IMAGE_SIZE),
        ),
        owner: item.owner_name.clone(),
        owner_id: item.owner_id.clone(),
        public: item.public,
        rules: item.rules.clone(),
        size: item.size,
        song_count: item.song_count,
        sync: item.sync,
    }
}

pub fn genre(item: &NdGenre) -> Genre {
    Genre::named(item.id.clone(), item.name.clone())
}

pub fn user(item: &NdUser) -> User {
    User {
        id: item.id.clone(),
        name: item.user_name.clone(),
        email: item.email.clone().filter(|value| !value.is_empty()),
        is_admin: item.is_admin,
        created_at: item.created_at.clone(),
        updated_at: item.updated_at.clone(),
        last_login_at: item.last_login_at.clone(),
    }
}
