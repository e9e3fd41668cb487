//! Event-bus protocol shared by all runtime components.
//!
//! Queue commands, remote-control requests, playback intents and background
//! worker results all travel over one broadcast bus as [`Message`]s.

use crate::backends::ServerContext;
use crate::config::Config;
use crate::error::PartialResolutionWarning;
use crate::model::{LibraryItem, Song};
use crate::queue::{AddPosition, QueueSummary, UserStateUpdate};
use crate::queue_snapshot::RestoreOutcome;

/// Top-level envelope for all bus traffic.
#[derive(Debug, Clone)]
pub enum Message {
    Queue(QueueMessage),
    Remote(RemoteMessage),
    Playback(PlaybackMessage),
    Worker(WorkerResult),
    Config(ConfigMessage),
}

/// Local queue commands and queue notifications.
#[derive(Debug, Clone)]
pub enum QueueMessage {
    SetQueue {
        songs: Vec<Song>,
        start_index: usize,
    },
    AddToQueue {
        songs: Vec<Song>,
        position: AddPosition,
    },
    MoveItem {
        unique_id: String,
        new_position: usize,
    },
    RemoveItem {
        unique_id: String,
    },
    SetCurrent {
        unique_id: String,
    },
    Clear,
    /// Published after every applied mutation.
    QueueChanged(QueueSummary),
    /// A local command was rejected; the queue is unchanged.
    CommandRejected {
        command: &'static str,
        error: String,
    },
    /// A remote restore was applied, possibly without some ids.
    Restored {
        warning: Option<PartialResolutionWarning>,
    },
}

/// Requests arriving over the remote-control channel.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteEvent {
    Favorite {
        ids: Vec<String>,
        server_id: String,
        item: LibraryItem,
        favorite: bool,
    },
    Rating {
        ids: Vec<String>,
        server_id: String,
        rating: u32,
    },
    /// Relative seek, in seconds; negative values rewind.
    Seek {
        offset_secs: f64,
    },
    Volume {
        volume: u8,
    },
    SaveQueue,
    /// Saves only the current pointer and position of the remote queue.
    SavePosition,
    RestoreQueue,
    Repeat,
    Shuffle,
    Next,
    Previous,
    Play,
    Pause,
}

/// Success/failure signal answering exactly one remote request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAck {
    pub request: u64,
    pub success: bool,
    pub error: Option<String>,
}

impl RemoteAck {
    pub fn ok(request: u64) -> Self {
        Self {
            request,
            success: true,
            error: None,
        }
    }

    pub fn failed(request: u64, error: impl Into<String>) -> Self {
        Self {
            request,
            success: false,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub enum RemoteMessage {
    Request { request: u64, event: RemoteEvent },
    Ack(RemoteAck),
}

/// Intents for the playback engine, plus its position reports.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackMessage {
    Load {
        current_stream_url: String,
        next_stream_url: Option<String>,
    },
    Play,
    Pause,
    Stop,
    SeekTo {
        position_ms: u64,
    },
    SetVolume(u8),
    PositionChanged {
        position_ms: u64,
    },
    TrackEnded,
}

/// Results posted back by background network workers.
#[derive(Debug, Clone)]
pub enum WorkerResult {
    UserStateUpdated {
        request: u64,
        server_id: String,
        ids: Vec<String>,
        update: UserStateUpdate,
        result: Result<(), String>,
    },
    QueueSaved {
        request: u64,
        result: Result<(), String>,
    },
    QueueRestored {
        request: u64,
        generation: u64,
        server_id: String,
        result: Result<Option<RestoreOutcome>, String>,
    },
}

#[derive(Debug, Clone)]
pub enum ConfigMessage {
    /// The active server changed; in-flight work for the old one is stale.
    ActiveServerChanged(Option<ServerContext>),
    ConfigChanged(Config),
}
