//! Persisted play-queue snapshot and its re-resolution.
//!
//! Only song ids, the current pointer and the playback position are stored;
//! song metadata is fetched again on restore.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, PartialResolutionWarning};
use crate::model::Song;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEntry {
    pub song_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    pub songs: Vec<SnapshotEntry>,
    pub current_index: Option<usize>,
    pub position_ms: u64,
}

impl QueueSnapshot {
    pub fn from_song_ids<I, S>(song_ids: I, current_index: Option<usize>, position_ms: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            songs: song_ids
                .into_iter()
                .map(|song_id| SnapshotEntry {
                    song_id: song_id.into(),
                })
                .collect(),
            current_index,
            position_ms,
        }
    }

    pub fn song_ids(&self) -> impl Iterator<Item = &str> {
        self.songs.iter().map(|entry| entry.song_id.as_str())
    }

    pub fn current_song_id(&self) -> Option<&str> {
        self.current_index
            .and_then(|index| self.songs.get(index))
            .map(|entry| entry.song_id.as_str())
    }
}

/// Songs re-resolved from a snapshot, ready to load into the queue.
#[derive(Debug, Clone, PartialEq)]
pub struct RestoreOutcome {
    pub songs: Vec<Song>,
    /// `None` when the snapshot had no current item or it failed to resolve.
    pub current_index: Option<usize>,
    pub position_ms: u64,
    pub warning: Option<PartialResolutionWarning>,
}

/// Re-resolves every snapshot id through `resolve`.
///
/// Ids that fail are dropped and reported in the outcome's warning; the
/// current index is shifted to keep pointing at the same entry.
pub fn resolve_snapshot<F>(snapshot: &QueueSnapshot, mut resolve: F) -> RestoreOutcome
where
    F: FnMut(&str) -> Result<Song, ApiError>,
{
    let mut songs = Vec::with_capacity(snapshot.songs.len());
    let mut dropped_ids = Vec::new();
    let mut current_index = None;

    for (index, entry) in snapshot.songs.iter().enumerate() {
        match resolve(&entry.song_id) {
            Ok(song) => {
                if snapshot.current_index == Some(index) {
                    current_index = Some(songs.len());
                }
                songs.push(song);
            }
            Err(err) => {
                warn!("QueueSnapshot: dropping unresolvable song {}: {}", entry.song_id, err);
                dropped_ids.push(entry.song_id.clone());
            }
        }
    }

    RestoreOutcome {
        songs,
        position_ms: if current_index.is_some() {
            snapshot.position_ms
        } else {
            0
        },
        current_index,
        warning: (!dropped_ids.is_empty()).then_some(PartialResolutionWarning { dropped_ids }),
    }
}
