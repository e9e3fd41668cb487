//! URL synthesis and date handling shared by both normalizers.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

use crate::backends::ServerContext;

/// Subsonic protocol version advertised on synthesized media URLs.
pub const MEDIA_API_VERSION: &str = "1.13.0";
/// Client id advertised to servers.
pub const CLIENT_ID: &str = "sonance";
/// Cover-art id servers hand out for "no artwork".
const PLACEHOLDER_COVER_ART_HASH: &str = "2a96cbd8b46e442fc41c2b86b821562f";
/// Sentinel year prefix used by both backends for "never".
const NEVER_DATE_MARKER: &str = "0001-";

/// Builds a `getCoverArt` URL, or `None` for empty/placeholder artwork ids.
pub fn cover_art_url(server: &ServerContext, cover_art_id: Option<&str>, size: u32) -> Option<String> {
    let cover_art_id = cover_art_id.map(str::trim).unwrap_or_default();
    if cover_art_id.is_empty() || cover_art_id.contains(PLACEHOLDER_COVER_ART_HASH) {
        return None;
    }
    let size = if size == 0 { 250 } else { size };
    Some(format!(
        "{}/rest/getCoverArt.view?id={}&{}&v={}&c={}&size={}",
        server.url,
        urlencoding::encode(cover_art_id),
        server.credential,
        MEDIA_API_VERSION,
        CLIENT_ID,
        size
    ))
}

pub fn stream_url(server: &ServerContext, song_id: &str) -> String {
    format!(
        "{}/rest/stream.view?id={}&v={}&c={}&{}",
        server.url,
        urlencoding::encode(song_id),
        MEDIA_API_VERSION,
        CLIENT_ID,
        server.credential
    )
}

/// Replaces the `size=` parameter of a cover-art URL.
pub fn resize_cover_art_url(url: &str, size: u32) -> String {
    match url.rfind("size=") {
        Some(start) => {
            let value_start = start + "size=".len();
            let value_end = url[value_start..]
                .find('&')
                .map(|offset| value_start + offset)
                .unwrap_or(url.len());
            format!("{}{}{}", &url[..value_start], size, &url[value_end..])
        }
        None => url.to_string(),
    }
}

/// Collapses absent, blank and "year 0001" dates to `None`.
///
/// Detection is a literal match on the sentinel year; a backend that changes
/// its sentinel representation will stop being collapsed here.
pub fn collapse_never_date(value: Option<&str>) -> Option<String> {
    let value = value.map(str::trim).filter(|value| !value.is_empty())?;
    if value.contains(NEVER_DATE_MARKER) {
        return None;
    }
    Some(value.to_string())
}

pub fn format_utc(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// January 1 of `year`, 00:00 UTC.
pub fn january_first_utc(year: i32) -> Option<String> {
    let date = NaiveDate::from_ymd_opt(year, 1, 1)?;
    let midnight = date.and_hms_opt(0, 0, 0)?;
    Some(format_utc(midnight.and_utc()))
}

/// Normalizes a full or partial date string to an RFC 3339 UTC timestamp.
///
/// Accepts RFC 3339, zone-less `YYYY-MM-DDTHH:MM:SS`, `YYYY-MM-DD`, `YYYY-MM`
/// and `YYYY`; partial dates fill
/// in the first day of the missing period.
pub fn normalize_release_date(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(format_utc(parsed.with_timezone(&Utc)));
    }
    // Zone-less timestamps are read as UTC.
    if let Ok(parsed) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(format_utc(parsed.and_utc()));
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| format_utc(dt.and_utc()));
    }
    let mut parts = value.splitn(3, '-');
    let year = parts.next()?.parse::<i32>().ok()?;
    let month = match parts.next() {
        Some(month) => month.parse::<u32>().ok()?,
        None => 1,
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| format_utc(dt.and_utc()))
}

/// Keeps only the `YYYY-MM-DD` part of a timestamp.
pub fn date_part(value: &str) -> String {
    value.split('T').next().unwrap_or(value).to_string()
}

/// Builds the Subsonic token credential fragment for a password.
pub fn token_credential(username: &str, password: &str) -> String {
    let mut bytes = [0u8; 8];
    let _ = getrandom::fill(&mut bytes);
    let salt: String = bytes.iter().map(|value| format!("{value:02x}")).collect();
    let token = format!("{:x}", md5::compute(format!("{password}{salt}")));
    format!(
        "u={}&s={}&t={}",
        urlencoding::encode(username),
        salt,
        token
    )
}
