//! Generic Subsonic / OpenSubsonic backend.

pub mod normalize;
pub mod schema;
