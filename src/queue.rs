//! Playback queue engine.
//!
//! Owns the curated (`default`) order, the optional shuffled order and the
//! current position. Every operation validates before it mutates, so an error
//! leaves the queue untouched.

use std::collections::HashMap;
use std::sync::Arc;

use rand::{rngs::StdRng, Rng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::QueueError;
use crate::identity::UniqueIdGenerator;
use crate::model::{QueueSong, Song};
use crate::queue_snapshot::{QueueSnapshot, RestoreOutcome};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    #[default]
    None, // Stop at the end of the queue
    All, // Wrap around to the first item
    One, // Replay the current item
}

impl RepeatMode {
    /// None -> All -> One -> None.
    pub fn cycle(self) -> Self {
        match self {
            Self::None => Self::All,
            Self::All => Self::One,
            Self::One => Self::None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AddPosition {
    Start,
    End,
    AfterCurrent,
}

/// Result of a `next()`/`previous()` step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Advance {
    /// The current index changed.
    Moved,
    /// The same item restarts from the beginning.
    Repeated,
    /// Nothing to move to; state unchanged.
    Exhausted,
}

/// User-state change to mirror onto queued copies of a song.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UserStateUpdate {
    Favorite(bool),
    Rating(Option<u32>),
}

/// Compact view of the queue published after each mutation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueueSummary {
    pub len: usize,
    pub current_index: Option<usize>,
    pub current_unique_id: Option<String>,
    pub current_song_id: Option<String>,
    pub position_ms: u64,
    pub repeat: RepeatMode,
    pub shuffled: bool,
}

pub struct QueueEngine {
    default: Vec<QueueSong>,
    // Unique ids in play order; `Some` while shuffle is active.
    shuffled: Option<Vec<String>>,
    // Index into the active ordering.
    current_index: Option<usize>,
    // Set when the current item was removed from the end of the queue; the
    // queue stays exhausted until it is repositioned.
    ended: bool,
    time_ms: u64,
    repeat: RepeatMode,
    ids: Arc<dyn UniqueIdGenerator>,
    rng: Box<dyn RngCore + Send>,
}

impl QueueEngine {
    pub fn new(ids: Arc<dyn UniqueIdGenerator>, rng: Box<dyn RngCore + Send>) -> Self {
        Self {
            default: Vec::new(),
            shuffled: None,
            current_index: None,
            ended: false,
            time_ms: 0,
            repeat: RepeatMode::None,
            ids,
            rng,
        }
    }

    /// Engine whose shuffles are seeded from OS entropy.
    pub fn with_entropy(ids: Arc<dyn UniqueIdGenerator>) -> Self {
        let mut seed = [0u8; 32];
        if let Err(err) = getrandom::fill(&mut seed) {
            log::warn!("QueueEngine: failed to gather entropy for shuffle seed: {}", err);
        }
        Self::new(ids, Box::new(StdRng::from_seed(seed)))
    }

    fn stamp(&self, songs: Vec<Song>) -> Vec<QueueSong> {
        songs
            .into_iter()
            .map(|song| QueueSong {
                unique_id: self.ids.next(),
                song,
            })
            .collect()
    }

    fn default_position(&self, unique_id: &str) -> Option<usize> {
        self.default
            .iter()
            .position(|song| song.unique_id == unique_id)
    }

    fn active_position(&self, unique_id: &str) -> Option<usize> {
        match &self.shuffled {
            Some(order) => order.iter().position(|id| id == unique_id),
            None => self.default_position(unique_id),
        }
    }

    /// Song at `index` in the active ordering.
    pub fn song_at(&self, index: usize) -> Option<&QueueSong> {
        match &self.shuffled {
            Some(order) => order
                .get(index)
                .and_then(|unique_id| self.default_position(unique_id))
                .map(|position| &self.default[position]),
            None => self.default.get(index),
        }
    }

    pub fn len(&self) -> usize {
        self.default.len()
    }

    pub fn is_empty(&self) -> bool {
        self.default.is_empty()
    }

    pub fn current(&self) -> Option<&QueueSong> {
        self.current_index.and_then(|index| self.song_at(index))
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn time_ms(&self) -> u64 {
        self.time_ms
    }

    pub fn repeat(&self) -> RepeatMode {
        self.repeat
    }

    pub fn set_repeat(&mut self, repeat: RepeatMode) {
        self.repeat = repeat;
    }

    pub fn is_shuffled(&self) -> bool {
        self.shuffled.is_some()
    }

    /// Curated order, regardless of shuffle.
    pub fn default_songs(&self) -> &[QueueSong] {
        &self.default
    }

    pub fn shuffled_ids(&self) -> Option<&[String]> {
        self.shuffled.as_deref()
    }

    /// Songs in the active ordering.
    pub fn songs_in_order(&self) -> Vec<&QueueSong> {
        let Some(order) = &self.shuffled else {
            return self.default.iter().collect();
        };
        let positions: HashMap<&str, usize> = self
            .default
            .iter()
            .enumerate()
            .map(|(position, song)| (song.unique_id.as_str(), position))
            .collect();
        order
            .iter()
            .filter_map(|unique_id| positions.get(unique_id.as_str()))
            .map(|&position| &self.default[position])
            .collect()
    }

    pub fn summary(&self) -> QueueSummary {
        let current = self.current();
        QueueSummary {
            len: self.default.len(),
            current_index: self.current_index,
            current_unique_id: current.map(|song| song.unique_id.clone()),
            current_song_id: current.map(|song| song.id.clone()),
            position_ms: self.time_ms,
            repeat: self.repeat,
            shuffled: self.is_shuffled(),
        }
    }

    /// Replaces the queue. Clears any shuffle.
    pub fn set_queue(&mut self, songs: Vec<Song>, start_index: usize) -> Result<(), QueueError> {
        if !songs.is_empty() && start_index >= songs.len() {
            return Err(QueueError::IndexOutOfRange {
                index: start_index,
                len: songs.len(),
            });
        }
        self.current_index = (!songs.is_empty()).then_some(start_index);
        self.default = self.stamp(songs);
        self.shuffled = None;
        self.ended = false;
        self.time_ms = 0;
        Ok(())
    }

    /// Inserts songs into the curated order and returns their unique ids.
    ///
    /// While shuffled, the new ids go to the end of the shuffled order so the
    /// upcoming shuffled sequence is not disturbed.
    pub fn add_to_queue(&mut self, songs: Vec<Song>, position: AddPosition) -> Vec<String> {
        let added = self.stamp(songs);
        let unique_ids: Vec<String> = added.iter().map(|song| song.unique_id.clone()).collect();
        let count = added.len();
        if count == 0 {
            return unique_ids;
        }

        let current_default = self
            .current()
            .and_then(|song| self.default_position(&song.unique_id));
        let insert_at = match position {
            AddPosition::Start => 0,
            AddPosition::End => self.default.len(),
            AddPosition::AfterCurrent => current_default
                .map(|index| index + 1)
                .unwrap_or(self.default.len()),
        };
        self.default.splice(insert_at..insert_at, added);

        match &mut self.shuffled {
            Some(order) => order.extend(unique_ids.iter().cloned()),
            None => {
                if let Some(current) = current_default {
                    if insert_at <= current {
                        self.current_index = Some(current + count);
                    }
                }
            }
        }
        unique_ids
    }

    /// Randomizes the play order, keeping the current item first.
    pub fn shuffle(&mut self) {
        let current_unique_id = self.current().map(|song| song.unique_id.clone());
        let mut order: Vec<String> = self
            .default
            .iter()
            .map(|song| song.unique_id.clone())
            .filter(|unique_id| Some(unique_id) != current_unique_id.as_ref())
            .collect();

        // Fisher-Yates
        for i in (1..order.len()).rev() {
            let j = self.rng.gen_range(0..=i);
            order.swap(i, j);
        }

        if let Some(current_unique_id) = current_unique_id {
            order.insert(0, current_unique_id);
            self.current_index = Some(0);
        }
        self.shuffled = Some(order);
    }

    /// Returns to the curated order, keeping the same current item.
    pub fn unshuffle(&mut self) {
        let current_unique_id = self.current().map(|song| song.unique_id.clone());
        self.shuffled = None;
        self.current_index = current_unique_id
            .as_deref()
            .and_then(|unique_id| self.default_position(unique_id));
    }

    fn next_index(&self) -> Option<usize> {
        let len = self.default.len();
        if len == 0 {
            return None;
        }
        match self.current_index {
            None if self.ended => None,
            None => Some(0),
            Some(index) if self.repeat == RepeatMode::One => Some(index),
            Some(index) if index + 1 < len => Some(index + 1),
            Some(_) if self.repeat == RepeatMode::All => Some(0),
            Some(_) => None,
        }
    }

    /// The item `next()` would make current, if any.
    pub fn next_song(&self) -> Option<&QueueSong> {
        self.next_index().and_then(|index| self.song_at(index))
    }

    pub fn next(&mut self) -> Advance {
        let Some(next) = self.next_index() else {
            return Advance::Exhausted;
        };
        let repeated = self.current_index == Some(next);
        self.current_index = Some(next);
        self.time_ms = 0;
        if repeated {
            Advance::Repeated
        } else {
            Advance::Moved
        }
    }

    /// From an exhausted queue, steps back onto the last item.
    pub fn previous(&mut self) -> Advance {
        let Some(index) = self.current_index else {
            if self.ended && !self.default.is_empty() {
                self.ended = false;
                self.current_index = Some(self.default.len() - 1);
                self.time_ms = 0;
                return Advance::Moved;
            }
            return Advance::Exhausted;
        };
        self.time_ms = 0;
        if self.repeat == RepeatMode::One {
            return Advance::Repeated;
        }
        if index > 0 {
            self.current_index = Some(index - 1);
            return Advance::Moved;
        }
        if self.repeat == RepeatMode::All && self.default.len() > 1 {
            self.current_index = Some(self.default.len() - 1);
            return Advance::Moved;
        }
        Advance::Repeated
    }

    /// Jumps to the item with `unique_id` and restarts it.
    pub fn set_current(&mut self, unique_id: &str) -> Result<(), QueueError> {
        let index = self
            .active_position(unique_id)
            .ok_or_else(|| QueueError::UnknownUniqueId(unique_id.to_string()))?;
        self.current_index = Some(index);
        self.ended = false;
        self.time_ms = 0;
        Ok(())
    }

    pub fn set_time(&mut self, time_ms: u64) {
        self.time_ms = time_ms;
    }

    /// Moves an item within the active ordering. While shuffled only the
    /// shuffled order changes.
    pub fn move_item(&mut self, unique_id: &str, new_position: usize) -> Result<(), QueueError> {
        let from = self
            .active_position(unique_id)
            .ok_or_else(|| QueueError::UnknownUniqueId(unique_id.to_string()))?;
        let len = self.default.len();
        if new_position >= len {
            return Err(QueueError::IndexOutOfRange {
                index: new_position,
                len,
            });
        }

        let current_unique_id = self.current().map(|song| song.unique_id.clone());
        match &mut self.shuffled {
            Some(order) => {
                let moved = order.remove(from);
                order.insert(new_position, moved);
            }
            None => {
                let moved = self.default.remove(from);
                self.default.insert(new_position, moved);
            }
        }
        self.current_index = current_unique_id
            .as_deref()
            .and_then(|current| self.active_position(current));
        Ok(())
    }

    /// Removes an item from both orderings. Removing the current item moves
    /// the pointer to whatever now follows it, wrapping only under repeat-all.
    pub fn remove_item(&mut self, unique_id: &str) -> Result<(), QueueError> {
        let active = self
            .active_position(unique_id)
            .ok_or_else(|| QueueError::UnknownUniqueId(unique_id.to_string()))?;
        let default = self
            .default_position(unique_id)
            .ok_or_else(|| QueueError::UnknownUniqueId(unique_id.to_string()))?;

        self.default.remove(default);
        if let Some(order) = &mut self.shuffled {
            order.remove(active);
        }

        let len = self.default.len();
        self.current_index = match self.current_index {
            Some(current) if current == active => {
                self.time_ms = 0;
                if active < len {
                    Some(active)
                } else if self.repeat == RepeatMode::All && len > 0 {
                    Some(0)
                } else {
                    self.ended = true;
                    None
                }
            }
            Some(current) if current > active => Some(current - 1),
            other => other,
        };
        Ok(())
    }

    pub fn clear(&mut self) {
        self.default.clear();
        self.shuffled = None;
        self.current_index = None;
        self.ended = false;
        self.time_ms = 0;
    }

    /// Mirrors a favorite/rating change onto every queued copy of the songs.
    /// Returns how many entries changed.
    pub fn apply_user_state(
        &mut self,
        server_id: &str,
        song_ids: &[String],
        update: UserStateUpdate,
    ) -> usize {
        let mut updated = 0;
        for song in self
            .default
            .iter_mut()
            .filter(|song| song.server_id == server_id && song_ids.contains(&song.id))
        {
            match update {
                UserStateUpdate::Favorite(favorite) => song.user_favorite = favorite,
                UserStateUpdate::Rating(rating) => song.user_rating = rating,
            }
            updated += 1;
        }
        updated
    }

    /// Snapshot of the active ordering for remote persistence.
    pub fn serialize(&self) -> QueueSnapshot {
        QueueSnapshot::from_song_ids(
            self.songs_in_order().into_iter().map(|song| song.id.clone()),
            self.current_index,
            self.time_ms,
        )
    }

    /// Loads re-resolved songs, replacing the queue.
    pub fn restore(&mut self, outcome: RestoreOutcome) -> Result<(), QueueError> {
        if let Some(index) = outcome.current_index {
            if index >= outcome.songs.len() {
                return Err(QueueError::IndexOutOfRange {
                    index,
                    len: outcome.songs.len(),
                });
            }
        }
        self.default = self.stamp(outcome.songs);
        self.shuffled = None;
        self.current_index = outcome.current_index;
        self.ended = false;
        self.time_ms = if self.current_index.is_some() {
            outcome.position_ms
        } else {
            0
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::SequentialIdGenerator;
    use crate::queue_snapshot::resolve_snapshot;
    use crate::queue_snapshot::tests::test_song;

    fn engine() -> QueueEngine {
        QueueEngine::new(
            Arc::new(SequentialIdGenerator::new("q")),
            Box::new(StdRng::seed_from_u64(7)),
        )
    }

    fn songs(ids: &[&str]) -> Vec<Song> {
        ids.iter().map(|id| test_song(id)).collect()
    }

    fn order(engine: &QueueEngine) -> Vec<String> {
        engine
            .songs_in_order()
            .into_iter()
            .map(|song| song.id.clone())
            .collect()
    }

    fn default_order(engine: &QueueEngine) -> Vec<String> {
        engine.default_songs().iter().map(|song| song.id.clone()).collect()
    }

    #[test]
    fn test_set_queue_then_next_until_exhausted() {
        let mut queue = engine();
        queue.set_queue(songs(&["A", "B", "C"]), 1).expect("valid start");

        assert_eq!(queue.next(), Advance::Moved);
        assert_eq!(queue.current_index(), Some(2));
        assert_eq!(queue.current().map(|song| song.id.as_str()), Some("C"));

        assert_eq!(queue.next(), Advance::Exhausted);
        assert_eq!(queue.current_index(), Some(2));
    }

    #[test]
    fn test_set_queue_rejects_out_of_range_start() {
        let mut queue = engine();
        queue.set_queue(songs(&["A"]), 0).expect("valid start");

        let error = queue.set_queue(songs(&["X", "Y"]), 2).unwrap_err();
        assert_eq!(error, QueueError::IndexOutOfRange { index: 2, len: 2 });
        assert_eq!(order(&queue), vec!["A"]);
    }

    #[test]
    fn test_empty_queue_has_no_current_song() {
        let mut queue = engine();
        queue.set_queue(Vec::new(), 5).expect("empty queue is valid");
        assert!(queue.current().is_none());
        assert_eq!(queue.next(), Advance::Exhausted);
    }

    #[test]
    fn test_duplicate_songs_get_distinct_unique_ids() {
        let mut queue = engine();
        queue.set_queue(songs(&["A", "A"]), 0).expect("valid start");
        let ids: Vec<&str> = queue
            .default_songs()
            .iter()
            .map(|song| song.unique_id.as_str())
            .collect();
        assert_eq!(ids, vec!["q-0", "q-1"]);
    }

    #[test]
    fn test_repeat_all_wraps_and_repeat_one_stays() {
        let mut queue = engine();
        queue.set_queue(songs(&["A", "B"]), 1).expect("valid start");
        queue.set_time(5000);

        queue.set_repeat(RepeatMode::All);
        assert_eq!(queue.next(), Advance::Moved);
        assert_eq!(queue.current_index(), Some(0));

        queue.set_repeat(RepeatMode::One);
        queue.set_time(1200);
        assert_eq!(queue.next(), Advance::Repeated);
        assert_eq!(queue.current_index(), Some(0));
        assert_eq!(queue.time_ms(), 0);
    }

    #[test]
    fn test_previous_at_start() {
        let mut queue = engine();
        queue.set_queue(songs(&["A", "B", "C"]), 0).expect("valid start");
        queue.set_time(800);

        assert_eq!(queue.previous(), Advance::Repeated);
        assert_eq!(queue.current_index(), Some(0));
        assert_eq!(queue.time_ms(), 0);

        queue.set_repeat(RepeatMode::All);
        assert_eq!(queue.previous(), Advance::Moved);
        assert_eq!(queue.current_index(), Some(2));
    }

    #[test]
    fn test_repeat_mode_cycles() {
        assert_eq!(RepeatMode::None.cycle(), RepeatMode::All);
        assert_eq!(RepeatMode::All.cycle(), RepeatMode::One);
        assert_eq!(RepeatMode::One.cycle(), RepeatMode::None);
    }

    #[test]
    fn test_shuffle_keeps_current_song_first() {
        let mut queue = engine();
        queue
            .set_queue(songs(&["A", "B", "C", "D", "E", "F"]), 3)
            .expect("valid start");
        let playing = queue.current().map(|song| song.unique_id.clone());

        queue.shuffle();

        assert!(queue.is_shuffled());
        assert_eq!(queue.current_index(), Some(0));
        assert_eq!(queue.current().map(|song| song.unique_id.clone()), playing);
        let mut shuffled = order(&queue);
        shuffled.sort();
        assert_eq!(shuffled, vec!["A", "B", "C", "D", "E", "F"]);
    }

    #[test]
    fn test_shuffle_then_unshuffle_restores_state() {
        let mut queue = engine();
        queue
            .set_queue(songs(&["A", "B", "C", "D", "E"]), 2)
            .expect("valid start");
        let before = default_order(&queue);

        queue.shuffle();
        queue.unshuffle();

        assert!(!queue.is_shuffled());
        assert_eq!(default_order(&queue), before);
        assert_eq!(queue.current_index(), Some(2));
        assert_eq!(queue.current().map(|song| song.id.as_str()), Some("C"));
    }

    #[test]
    fn test_add_after_current_inserts_in_default_order() {
        let mut queue = engine();
        queue.set_queue(songs(&["A", "B", "C"]), 1).expect("valid start");

        queue.add_to_queue(songs(&["D"]), AddPosition::AfterCurrent);

        assert_eq!(order(&queue), vec!["A", "B", "D", "C"]);
        assert_eq!(queue.current_index(), Some(1));
    }

    #[test]
    fn test_add_to_start_shifts_current_index() {
        let mut queue = engine();
        queue.set_queue(songs(&["A", "B"]), 1).expect("valid start");

        queue.add_to_queue(songs(&["X", "Y"]), AddPosition::Start);

        assert_eq!(queue.current_index(), Some(3));
        assert_eq!(queue.current().map(|song| song.id.as_str()), Some("B"));
    }

    #[test]
    fn test_add_while_shuffled_appends_to_shuffled_order() {
        let mut queue = engine();
        queue.set_queue(songs(&["A", "B", "C"]), 1).expect("valid start");
        queue.shuffle();
        let shuffled_before: Vec<String> =
            queue.shuffled_ids().expect("shuffled").to_vec();

        let added = queue.add_to_queue(songs(&["D"]), AddPosition::AfterCurrent);

        assert_eq!(default_order(&queue), vec!["A", "B", "D", "C"]);
        let shuffled_after = queue.shuffled_ids().expect("shuffled");
        assert_eq!(&shuffled_after[..3], shuffled_before.as_slice());
        assert_eq!(shuffled_after[3], added[0]);
        assert_eq!(queue.current_index(), Some(0));
    }

    #[test]
    fn test_move_while_shuffled_leaves_default_order() {
        let mut queue = engine();
        queue.set_queue(songs(&["A", "B", "C", "D"]), 0).expect("valid start");
        queue.shuffle();
        let last = queue.song_at(3).map(|song| song.unique_id.clone()).expect("last");

        queue.move_item(&last, 1).expect("known id");

        assert_eq!(queue.song_at(1).map(|song| song.unique_id.clone()), Some(last));
        assert_eq!(default_order(&queue), vec!["A", "B", "C", "D"]);
        assert_eq!(queue.current_index(), Some(0));
    }

    #[test]
    fn test_move_follows_current_item() {
        let mut queue = engine();
        queue.set_queue(songs(&["A", "B", "C"]), 0).expect("valid start");
        let first = queue.default_songs()[0].unique_id.clone();

        queue.move_item(&first, 2).expect("known id");

        assert_eq!(order(&queue), vec!["B", "C", "A"]);
        assert_eq!(queue.current_index(), Some(2));
    }

    #[test]
    fn test_move_and_remove_reject_unknown_ids() {
        let mut queue = engine();
        queue.set_queue(songs(&["A", "B"]), 0).expect("valid start");

        assert_eq!(
            queue.move_item("missing", 0),
            Err(QueueError::UnknownUniqueId("missing".to_string()))
        );
        let known = queue.default_songs()[1].unique_id.clone();
        assert_eq!(
            queue.move_item(&known, 2),
            Err(QueueError::IndexOutOfRange { index: 2, len: 2 })
        );
        assert!(queue.remove_item("missing").is_err());
        assert_eq!(order(&queue), vec!["A", "B"]);
    }

    #[test]
    fn test_remove_current_advances_to_following_item() {
        let mut queue = engine();
        queue.set_queue(songs(&["A", "B", "C"]), 1).expect("valid start");
        let current = queue.current().map(|song| song.unique_id.clone()).expect("current");

        queue.remove_item(&current).expect("known id");

        assert_eq!(queue.current().map(|song| song.id.as_str()), Some("C"));
        assert_eq!(queue.current_index(), Some(1));
    }

    #[test]
    fn test_remove_last_current_item_respects_repeat() {
        let mut queue = engine();
        queue.set_queue(songs(&["A", "B"]), 1).expect("valid start");
        let last = queue.default_songs()[1].unique_id.clone();
        queue.remove_item(&last).expect("known id");
        assert_eq!(queue.current_index(), None);

        queue.set_queue(songs(&["A", "B"]), 1).expect("valid start");
        queue.set_repeat(RepeatMode::All);
        let last = queue.default_songs()[1].unique_id.clone();
        queue.remove_item(&last).expect("known id");
        assert_eq!(queue.current().map(|song| song.id.as_str()), Some("A"));
    }

    #[test]
    fn test_queue_stays_exhausted_after_removing_last_current_item() {
        let mut queue = engine();
        queue.set_queue(songs(&["A", "B"]), 1).expect("valid start");
        let last = queue.default_songs()[1].unique_id.clone();
        queue.remove_item(&last).expect("known id");

        assert_eq!(queue.next(), Advance::Exhausted);
        assert_eq!(queue.current_index(), None);
        assert!(queue.next_song().is_none());

        assert_eq!(queue.previous(), Advance::Moved);
        assert_eq!(queue.current().map(|song| song.id.as_str()), Some("A"));
    }

    #[test]
    fn test_cleared_queue_starts_from_first_item_again() {
        let mut queue = engine();
        queue.set_queue(songs(&["A"]), 0).expect("valid start");
        let only = queue.default_songs()[0].unique_id.clone();
        queue.remove_item(&only).expect("known id");
        queue.clear();
        queue.add_to_queue(songs(&["B", "C"]), AddPosition::End);

        assert_eq!(queue.next(), Advance::Moved);
        assert_eq!(queue.current().map(|song| song.id.as_str()), Some("B"));
    }

    #[test]
    fn test_remove_before_current_shifts_index() {
        let mut queue = engine();
        queue.set_queue(songs(&["A", "B", "C"]), 2).expect("valid start");
        let first = queue.default_songs()[0].unique_id.clone();

        queue.remove_item(&first).expect("known id");

        assert_eq!(queue.current_index(), Some(1));
        assert_eq!(queue.current().map(|song| song.id.as_str()), Some("C"));
    }

    #[test]
    fn test_remove_while_shuffled_updates_both_orders() {
        let mut queue = engine();
        queue.set_queue(songs(&["A", "B", "C"]), 0).expect("valid start");
        queue.shuffle();
        let victim = queue.song_at(2).map(|song| song.unique_id.clone()).expect("victim");

        queue.remove_item(&victim).expect("known id");

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.shuffled_ids().map(<[String]>::len), Some(2));
        assert!(queue.default_songs().iter().all(|song| song.unique_id != victim));
    }

    #[test]
    fn test_next_song_previews_without_moving() {
        let mut queue = engine();
        queue.set_queue(songs(&["A", "B"]), 0).expect("valid start");
        assert_eq!(queue.next_song().map(|song| song.id.as_str()), Some("B"));
        assert_eq!(queue.current_index(), Some(0));

        queue.next();
        assert!(queue.next_song().is_none());
    }

    #[test]
    fn test_apply_user_state_updates_every_copy() {
        let mut queue = engine();
        queue.set_queue(songs(&["A", "B", "A"]), 0).expect("valid start");

        let updated = queue.apply_user_state(
            "srv",
            &["A".to_string()],
            UserStateUpdate::Favorite(true),
        );

        assert_eq!(updated, 2);
        assert!(queue.default_songs()[2].user_favorite);
        assert!(!queue.default_songs()[1].user_favorite);
        assert_eq!(
            queue.apply_user_state("other", &["A".to_string()], UserStateUpdate::Rating(Some(3))),
            0
        );
    }

    #[test]
    fn test_serialize_then_restore_round_trips() {
        let mut queue = engine();
        queue.set_queue(songs(&["A", "B", "C"]), 1).expect("valid start");
        queue.set_time(4321);

        let snapshot = queue.serialize();
        let outcome = resolve_snapshot(&snapshot, |id| Ok(test_song(id)));
        let mut restored = engine();
        restored.restore(outcome).expect("valid outcome");

        assert_eq!(order(&restored), vec!["A", "B", "C"]);
        assert_eq!(restored.current_index(), Some(1));
        assert_eq!(restored.time_ms(), 4321);
    }

    #[test]
    fn test_serialize_uses_active_ordering() {
        let mut queue = engine();
        queue.set_queue(songs(&["A", "B", "C", "D"]), 2).expect("valid start");
        queue.shuffle();

        let snapshot = queue.serialize();

        assert_eq!(snapshot.current_index, Some(0));
        assert_eq!(snapshot.current_song_id(), Some("C"));
    }

    #[test]
    fn test_songs_in_order_follows_shuffled_ids_with_duplicates() {
        let mut queue = engine();
        queue
            .set_queue(songs(&["A", "B", "A", "C", "B"]), 0)
            .expect("valid start");
        queue.shuffle();

        let by_index: Vec<String> = (0..queue.len())
            .filter_map(|index| queue.song_at(index))
            .map(|song| song.unique_id.clone())
            .collect();
        let in_order: Vec<String> = queue
            .songs_in_order()
            .into_iter()
            .map(|song| song.unique_id.clone())
            .collect();

        assert_eq!(in_order, by_index);
        assert_eq!(Some(in_order.as_slice()), queue.shuffled_ids());
    }
}
