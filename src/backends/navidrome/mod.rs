//! Navidrome backend: native API reads, Subsonic-compatible writes.

pub mod normalize;
pub mod schema;
