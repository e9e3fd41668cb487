//! Music-server client core: Subsonic and Navidrome normalization, a
//! backend-agnostic API facade, and a playback queue driven over an event bus.
//!
//! A presentation layer builds an [`api::ApiClient`] for library browsing and
//! runs a [`queue_manager::QueueManager`] on its own thread, talking to it
//! through [`protocol::Message`]s.

pub mod api;
pub mod backends;
pub mod config;
pub mod error;
pub mod identity;
pub mod model;
pub mod protocol;
pub mod queue;
pub mod queue_manager;
pub mod queue_snapshot;
