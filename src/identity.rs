//! Positional identity generation for queued songs.

use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

/// Source of process-local `unique_id` values for queue entries.
pub trait UniqueIdGenerator: Send + Sync {
    fn next(&self) -> String;
}

/// Random v4 UUIDs; the production generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl UniqueIdGenerator for UuidGenerator {
    fn next(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Deterministic `<prefix>-<n>` ids for tests and reproducible sessions.
#[derive(Debug)]
pub struct SequentialIdGenerator {
    prefix: String,
    counter: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicU64::new(0),
        }
    }
}

impl UniqueIdGenerator for SequentialIdGenerator {
    fn next(&self) -> String {
        let value = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}", self.prefix, value)
    }
}
