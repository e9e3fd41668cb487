//! Error taxonomy shared by the normalization layer, dispatch facade and queue.

use std::fmt;

use thiserror::Error;

use crate::model::ServerType;

/// A raw payload did not match the backend's wire schema.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{backend} payload for {operation} failed validation: {source}")]
    Schema {
        backend: ServerType,
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{backend} payload for {operation} is missing `{field}`")]
    MissingField {
        backend: ServerType,
        operation: &'static str,
        field: &'static str,
    },
}

/// Transport or server-side failure, carried verbatim from the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendError {
    /// HTTP status, when the failure came with one.
    pub status: Option<u16>,
    /// Protocol-level error code (e.g. Subsonic `error.code`).
    pub code: Option<i64>,
    pub message: String,
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("backend error")?;
        if let Some(status) = self.status {
            write!(f, " (HTTP {status})")?;
        }
        if let Some(code) = self.code {
            write!(f, " (code {code})")?;
        }
        write!(f, ": {}", self.message)
    }
}

impl std::error::Error for BackendError {}

impl BackendError {
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            code: None,
            message: message.into(),
        }
    }

    pub fn protocol(code: i64, message: impl Into<String>) -> Self {
        Self {
            status: None,
            code: Some(code),
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            code: None,
            message: message.into(),
        }
    }
}

/// Errors surfaced by the dispatch facade.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("{operation} is not supported by {server_type} servers")]
    Unsupported {
        operation: &'static str,
        server_type: ServerType,
    },
}

/// Queue operations referencing positions or identities that do not exist.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("queue index {index} is out of range for {len} item(s)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("unique id `{0}` is not in the queue")]
    UnknownUniqueId(String),
}

/// Persisted song ids that could not be re-resolved during a restore.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PartialResolutionWarning {
    pub dropped_ids: Vec<String>,
}
