//! Single-writer queue coordinator.
//!
//! Owns the [`QueueEngine`] and is the only component that mutates it. Local
//! queue commands, remote-control requests and playback reports are all
//! serialized through this manager's bus loop. Network calls run on
//! short-lived worker threads that post their results back onto the bus.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use log::{debug, error, info, trace, warn};
use tokio::sync::broadcast::{Receiver, Sender};

use crate::api::ApiClient;
use crate::backends::ServerContext;
use crate::config::{self, Config};
use crate::model::LibraryItem;
use crate::protocol::{
    ConfigMessage, Message, PlaybackMessage, QueueMessage, RemoteAck, RemoteEvent, RemoteMessage,
    WorkerResult,
};
use crate::queue::{Advance, QueueEngine, UserStateUpdate};
use crate::queue_snapshot::resolve_snapshot;

pub struct QueueManager {
    engine: QueueEngine,
    api: Arc<ApiClient>,
    server: Option<ServerContext>,
    config: Config,
    config_path: Option<PathBuf>,
    bus_consumer: Receiver<Message>,
    bus_producer: Sender<Message>,
    restore_generation: u64,
    // Generation of the restore whose result may still be applied.
    pending_restore: Option<u64>,
}

impl QueueManager {
    pub fn new(
        mut engine: QueueEngine,
        api: Arc<ApiClient>,
        config: Config,
        config_path: Option<PathBuf>,
        bus_consumer: Receiver<Message>,
        bus_producer: Sender<Message>,
    ) -> Self {
        engine.set_repeat(config.playback.repeat_mode);
        let server = config
            .active_server()
            .map(|server| server.to_server_context());
        Self {
            engine,
            api,
            server,
            config,
            config_path,
            bus_consumer,
            bus_producer,
            restore_generation: 0,
            pending_restore: None,
        }
    }

    pub fn run(&mut self) {
        info!(
            "QueueManager: started (server: {})",
            self.server
                .as_ref()
                .map(|server| server.id.as_str())
                .unwrap_or("none")
        );
        loop {
            match self.bus_consumer.blocking_recv() {
                Ok(Message::Queue(message)) => self.handle_queue_message(message),
                Ok(Message::Remote(RemoteMessage::Request { request, event })) => {
                    self.handle_remote(request, event)
                }
                Ok(Message::Playback(message)) => self.handle_playback_report(message),
                Ok(Message::Worker(result)) => self.handle_worker_result(result),
                Ok(Message::Config(ConfigMessage::ActiveServerChanged(server))) => {
                    self.switch_server(server)
                }
                Ok(_) => trace!("QueueManager: ignoring unsupported message"),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("QueueManager: bus lagged, {} message(s) skipped", skipped);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                    info!("QueueManager: bus closed");
                    break;
                }
            }
        }
    }

    fn send(&self, message: Message) {
        if self.bus_producer.send(message).is_err() {
            debug!("QueueManager: no bus subscribers");
        }
    }

    fn ack(&self, ack: RemoteAck) {
        if let Some(error) = &ack.error {
            debug!("QueueManager: request {} failed: {}", ack.request, error);
        }
        self.send(Message::Remote(RemoteMessage::Ack(ack)));
    }

    fn current_unique_id(&self) -> Option<String> {
        self.engine.current().map(|song| song.unique_id.clone())
    }

    /// Publishes the new queue state and reloads playback if the current
    /// item changed.
    fn after_mutation(&self, previous_current: Option<String>) {
        self.send(Message::Queue(QueueMessage::QueueChanged(
            self.engine.summary(),
        )));
        if self.current_unique_id() != previous_current {
            self.load_current();
        }
    }

    fn load_current(&self) {
        match self.engine.current() {
            Some(current) => self.send(Message::Playback(PlaybackMessage::Load {
                current_stream_url: current.stream_url.clone(),
                next_stream_url: self.engine.next_song().map(|song| song.stream_url.clone()),
            })),
            None => self.send(Message::Playback(PlaybackMessage::Stop)),
        }
    }

    fn persist_config(&self) {
        if let Some(path) = &self.config_path {
            config::persist_config_file(&self.config, path);
        }
        self.send(Message::Config(ConfigMessage::ConfigChanged(
            self.config.clone(),
        )));
    }

    /// Re-applies the shuffle preference after the queue was replaced.
    fn apply_shuffle_preference(&mut self) {
        if self.config.playback.shuffle && !self.engine.is_shuffled() {
            self.engine.shuffle();
        }
    }

    fn handle_queue_message(&mut self, message: QueueMessage) {
        let previous_current = self.current_unique_id();
        let (command, result) = match message {
            QueueMessage::SetQueue { songs, start_index } => {
                let result = self.engine.set_queue(songs, start_index);
                if result.is_ok() {
                    self.apply_shuffle_preference();
                }
                ("set_queue", result)
            }
            QueueMessage::AddToQueue { songs, position } => {
                self.engine.add_to_queue(songs, position);
                ("add_to_queue", Ok(()))
            }
            QueueMessage::MoveItem {
                unique_id,
                new_position,
            } => ("move_item", self.engine.move_item(&unique_id, new_position)),
            QueueMessage::RemoveItem { unique_id } => {
                ("remove_item", self.engine.remove_item(&unique_id))
            }
            QueueMessage::SetCurrent { unique_id } => {
                let result = self.engine.set_current(&unique_id);
                if result.is_ok() {
                    // Same item selected again still restarts it.
                    self.send(Message::Queue(QueueMessage::QueueChanged(
                        self.engine.summary(),
                    )));
                    self.load_current();
                    return;
                }
                ("set_current", result)
            }
            QueueMessage::Clear => {
                self.engine.clear();
                ("clear", Ok(()))
            }
            QueueMessage::QueueChanged(_)
            | QueueMessage::CommandRejected { .. }
            | QueueMessage::Restored { .. } => return,
        };

        match result {
            Ok(()) => self.after_mutation(previous_current),
            Err(err) => {
                warn!("QueueManager: {} rejected: {}", command, err);
                self.send(Message::Queue(QueueMessage::CommandRejected {
                    command,
                    error: err.to_string(),
                }));
            }
        }
    }

    /// Checks a remote request targets the active server.
    fn server_for(&self, server_id: Option<&str>) -> Result<ServerContext, String> {
        let server = self
            .server
            .clone()
            .ok_or_else(|| "no active server".to_string())?;
        match server_id {
            Some(server_id) if server_id != server.id => Err(format!(
                "server {} is not the active server",
                server_id
            )),
            _ => Ok(server),
        }
    }

    fn handle_remote(&mut self, request: u64, event: RemoteEvent) {
        debug!("QueueManager: remote request {}: {:?}", request, event);
        match event {
            RemoteEvent::Favorite {
                ids,
                server_id,
                item,
                favorite,
            } => {
                let server = match self.server_for(Some(&server_id)) {
                    Ok(server) => server,
                    Err(err) => return self.ack(RemoteAck::failed(request, err)),
                };
                let api = Arc::clone(&self.api);
                let bus = self.bus_producer.clone();
                thread::spawn(move || {
                    let result = api
                        .set_favorite(&server, item, &ids, favorite)
                        .map_err(|err| err.to_string());
                    let update = UserStateUpdate::Favorite(favorite);
                    // Only song favorites are mirrored onto the queue.
                    let ids = if item == LibraryItem::Song { ids } else { Vec::new() };
                    let _ = bus.send(Message::Worker(WorkerResult::UserStateUpdated {
                        request,
                        server_id: server.id,
                        ids,
                        update,
                        result,
                    }));
                });
            }
            RemoteEvent::Rating {
                ids,
                server_id,
                rating,
            } => {
                let server = match self.server_for(Some(&server_id)) {
                    Ok(server) => server,
                    Err(err) => return self.ack(RemoteAck::failed(request, err)),
                };
                let rating = rating.min(5);
                let api = Arc::clone(&self.api);
                let bus = self.bus_producer.clone();
                thread::spawn(move || {
                    let result = api
                        .set_rating(&server, &ids, rating)
                        .map_err(|err| err.to_string());
                    let _ = bus.send(Message::Worker(WorkerResult::UserStateUpdated {
                        request,
                        server_id: server.id,
                        ids,
                        update: UserStateUpdate::Rating((rating > 0).then_some(rating)),
                        result,
                    }));
                });
            }
            RemoteEvent::Seek { offset_secs } => {
                let Some(duration_ms) = self.engine.current().map(|song| song.duration) else {
                    return self.ack(RemoteAck::failed(request, "nothing is playing"));
                };
                let offset_ms = (offset_secs * 1000.0).round() as i64;
                let target = (self.engine.time_ms() as i64).saturating_add(offset_ms);
                let position_ms = if duration_ms > 0 {
                    target.clamp(0, duration_ms as i64) as u64
                } else {
                    target.max(0) as u64
                };
                self.engine.set_time(position_ms);
                self.send(Message::Playback(PlaybackMessage::SeekTo { position_ms }));
                self.ack(RemoteAck::ok(request));
            }
            RemoteEvent::Volume { volume } => {
                let volume = volume.min(100);
                self.config.playback.volume = volume;
                self.send(Message::Playback(PlaybackMessage::SetVolume(volume)));
                self.ack(RemoteAck::ok(request));
            }
            RemoteEvent::SaveQueue => {
                let server = match self.server_for(None) {
                    Ok(server) => server,
                    Err(err) => return self.ack(RemoteAck::failed(request, err)),
                };
                let snapshot = self.engine.serialize();
                let api = Arc::clone(&self.api);
                let bus = self.bus_producer.clone();
                thread::spawn(move || {
                    let result = api
                        .save_play_queue(&server, &snapshot)
                        .map_err(|err| err.to_string());
                    let _ = bus.send(Message::Worker(WorkerResult::QueueSaved { request, result }));
                });
            }
            RemoteEvent::SavePosition => {
                let server = match self.server_for(None) {
                    Ok(server) => server,
                    Err(err) => return self.ack(RemoteAck::failed(request, err)),
                };
                let current_song_id = self.engine.current().map(|song| song.id.clone());
                let current_index = self.engine.current_index();
                let position_ms = self.engine.time_ms();
                let api = Arc::clone(&self.api);
                let bus = self.bus_producer.clone();
                thread::spawn(move || {
                    let result = api
                        .save_play_queue_position(
                            &server,
                            current_song_id.as_deref(),
                            current_index,
                            position_ms,
                        )
                        .map_err(|err| err.to_string());
                    let _ = bus.send(Message::Worker(WorkerResult::QueueSaved { request, result }));
                });
            }
            RemoteEvent::RestoreQueue => self.start_restore(request),
            RemoteEvent::Repeat => {
                let repeat = self.engine.repeat().cycle();
                self.engine.set_repeat(repeat);
                self.config.playback.repeat_mode = repeat;
                self.persist_config();
                self.send(Message::Queue(QueueMessage::QueueChanged(
                    self.engine.summary(),
                )));
                self.ack(RemoteAck::ok(request));
            }
            RemoteEvent::Shuffle => {
                if self.engine.is_shuffled() {
                    self.engine.unshuffle();
                } else {
                    self.engine.shuffle();
                }
                self.config.playback.shuffle = self.engine.is_shuffled();
                self.persist_config();
                self.send(Message::Queue(QueueMessage::QueueChanged(
                    self.engine.summary(),
                )));
                self.ack(RemoteAck::ok(request));
            }
            RemoteEvent::Next | RemoteEvent::Previous => {
                let previous_current = self.current_unique_id();
                let advance = if event == RemoteEvent::Next {
                    self.engine.next()
                } else {
                    self.engine.previous()
                };
                self.apply_advance(advance, previous_current);
                match advance {
                    Advance::Exhausted => self.ack(RemoteAck::failed(request, "queue exhausted")),
                    _ => self.ack(RemoteAck::ok(request)),
                }
            }
            RemoteEvent::Play => {
                if self.engine.current().is_none() {
                    return self.ack(RemoteAck::failed(request, "nothing to play"));
                }
                self.send(Message::Playback(PlaybackMessage::Play));
                self.ack(RemoteAck::ok(request));
            }
            RemoteEvent::Pause => {
                self.send(Message::Playback(PlaybackMessage::Pause));
                self.ack(RemoteAck::ok(request));
            }
        }
    }

    fn apply_advance(&self, advance: Advance, previous_current: Option<String>) {
        match advance {
            Advance::Moved => self.after_mutation(previous_current),
            Advance::Repeated => {
                self.send(Message::Queue(QueueMessage::QueueChanged(
                    self.engine.summary(),
                )));
                self.send(Message::Playback(PlaybackMessage::SeekTo { position_ms: 0 }));
            }
            Advance::Exhausted => {}
        }
    }

    /// Starts a restore, superseding any restore still in flight.
    fn start_restore(&mut self, request: u64) {
        let server = match self.server_for(None) {
            Ok(server) => server,
            Err(err) => return self.ack(RemoteAck::failed(request, err)),
        };
        self.restore_generation += 1;
        let generation = self.restore_generation;
        if let Some(previous) = self.pending_restore.replace(generation) {
            debug!(
                "QueueManager: restore generation {} superseded by {}",
                previous, generation
            );
        }

        let api = Arc::clone(&self.api);
        let bus = self.bus_producer.clone();
        thread::spawn(move || {
            let result = api
                .get_play_queue(&server)
                .map(|snapshot| {
                    snapshot.map(|snapshot| {
                        resolve_snapshot(&snapshot, |song_id| api.get_song(&server, song_id))
                    })
                })
                .map_err(|err| err.to_string());
            let _ = bus.send(Message::Worker(WorkerResult::QueueRestored {
                request,
                generation,
                server_id: server.id,
                result,
            }));
        });
    }

    fn is_active_server(&self, server_id: &str) -> bool {
        self.server
            .as_ref()
            .is_some_and(|server| server.id == server_id)
    }

    fn handle_worker_result(&mut self, result: WorkerResult) {
        match result {
            WorkerResult::UserStateUpdated {
                request,
                server_id,
                ids,
                update,
                result,
            } => match result {
                Ok(()) => {
                    if self.is_active_server(&server_id) {
                        let updated = self.engine.apply_user_state(&server_id, &ids, update);
                        trace!("QueueManager: user state mirrored onto {} queue item(s)", updated);
                    }
                    self.ack(RemoteAck::ok(request));
                }
                Err(err) => self.ack(RemoteAck::failed(request, err)),
            },
            WorkerResult::QueueSaved { request, result } => match result {
                Ok(()) => self.ack(RemoteAck::ok(request)),
                Err(err) => self.ack(RemoteAck::failed(request, err)),
            },
            WorkerResult::QueueRestored {
                request,
                generation,
                server_id,
                result,
            } => {
                if self.pending_restore != Some(generation) || !self.is_active_server(&server_id) {
                    warn!(
                        "QueueManager: discarding stale restore (generation {}, server {})",
                        generation, server_id
                    );
                    return self.ack(RemoteAck::failed(request, "restore superseded"));
                }
                self.pending_restore = None;
                match result {
                    Ok(Some(outcome)) => {
                        let previous_current = self.current_unique_id();
                        let warning = outcome.warning.clone();
                        if let Some(warning) = &warning {
                            warn!(
                                "QueueManager: restored queue without {} unresolvable song(s)",
                                warning.dropped_ids.len()
                            );
                        }
                        if let Err(err) = self.engine.restore(outcome) {
                            error!("QueueManager: restore rejected: {}", err);
                            return self.ack(RemoteAck::failed(request, err.to_string()));
                        }
                        self.apply_shuffle_preference();
                        let position_ms = self.engine.time_ms();
                        self.send(Message::Queue(QueueMessage::Restored { warning }));
                        self.after_mutation(previous_current);
                        if position_ms > 0 {
                            self.send(Message::Playback(PlaybackMessage::SeekTo { position_ms }));
                        }
                        self.ack(RemoteAck::ok(request));
                    }
                    Ok(None) => {
                        info!("QueueManager: server has no saved queue");
                        self.ack(RemoteAck::ok(request));
                    }
                    Err(err) => self.ack(RemoteAck::failed(request, err)),
                }
            }
        }
    }

    fn handle_playback_report(&mut self, message: PlaybackMessage) {
        match message {
            PlaybackMessage::PositionChanged { position_ms } => self.engine.set_time(position_ms),
            PlaybackMessage::TrackEnded => {
                self.scrobble_current();
                let previous_current = self.current_unique_id();
                match self.engine.next() {
                    Advance::Exhausted => {
                        self.engine.set_time(0);
                        self.send(Message::Playback(PlaybackMessage::Stop));
                    }
                    advance => {
                        self.apply_advance(advance, previous_current);
                        self.send(Message::Playback(PlaybackMessage::Play));
                    }
                }
            }
            _ => {}
        }
    }

    /// Reports the finished song; failures are only logged.
    fn scrobble_current(&self) {
        let Some(song_id) = self.engine.current().map(|song| song.id.clone()) else {
            return;
        };
        let Ok(server) = self.server_for(None) else {
            return;
        };
        let api = Arc::clone(&self.api);
        thread::spawn(move || {
            if let Err(err) = api.scrobble(&server, &song_id, true, None) {
                warn!("QueueManager: scrobble of {} failed: {}", song_id, err);
            }
        });
    }

    fn switch_server(&mut self, server: Option<ServerContext>) {
        info!(
            "QueueManager: active server changed to {}",
            server.as_ref().map(|server| server.id.as_str()).unwrap_or("none")
        );
        // In-flight restores computed against the old server must not apply.
        self.restore_generation += 1;
        self.pending_restore = None;
        self.config.active_server_id = server.as_ref().map(|server| server.id.clone());
        self.server = server;
        if let Some(path) = &self.config_path {
            config::persist_config_file(&self.config, path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::testing::{subsonic_ok, FakeTransport};
    use crate::config::ServerConfig;
    use crate::identity::SequentialIdGenerator;
    use crate::model::{ServerType, Song};
    use crate::queue_snapshot::tests::test_song;
    use crate::queue_snapshot::RestoreOutcome;
    use rand::{rngs::StdRng, SeedableRng};
    use serde_json::json;
    use std::time::{Duration, Instant};
    use tokio::sync::broadcast::{self, error::TryRecvError};

    fn test_config() -> Config {
        let mut config = Config::default();
        config.servers.push(ServerConfig {
            id: "srv".to_string(),
            name: "Test".to_string(),
            url: "http://music.test".to_string(),
            username: "amy".to_string(),
            server_type: ServerType::Subsonic,
            credential: Some("u=amy&s=s&t=t".to_string()),
            password: None,
            navidrome_token: None,
        });
        config.active_server_id = Some("srv".to_string());
        config
    }

    fn engine() -> QueueEngine {
        QueueEngine::new(
            Arc::new(SequentialIdGenerator::new("q")),
            Box::new(StdRng::seed_from_u64(11)),
        )
    }

    fn songs(ids: &[&str]) -> Vec<Song> {
        ids.iter().map(|id| test_song(id)).collect()
    }

    fn wait_for_message<F>(
        receiver: &mut Receiver<Message>,
        timeout: Duration,
        mut predicate: F,
    ) -> Message
    where
        F: FnMut(&Message) -> bool,
    {
        let start = Instant::now();
        loop {
            if start.elapsed() > timeout {
                panic!("timed out waiting for expected message");
            }
            match receiver.try_recv() {
                Ok(message) => {
                    if predicate(&message) {
                        return message;
                    }
                }
                Err(TryRecvError::Empty) => thread::sleep(Duration::from_millis(5)),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Closed) => panic!("bus closed while waiting for message"),
            }
        }
    }

    fn wait_for_ack(receiver: &mut Receiver<Message>, request: u64) -> RemoteAck {
        match wait_for_message(receiver, Duration::from_secs(2), |message| {
            matches!(message, Message::Remote(RemoteMessage::Ack(ack)) if ack.request == request)
        }) {
            Message::Remote(RemoteMessage::Ack(ack)) => ack,
            _ => unreachable!(),
        }
    }

    fn drain(receiver: &mut Receiver<Message>) -> Vec<Message> {
        let mut messages = Vec::new();
        loop {
            match receiver.try_recv() {
                Ok(message) => messages.push(message),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        messages
    }

    /// Manager driven directly on the test thread; worker results are read
    /// back from the bus and fed in by hand.
    struct DirectHarness {
        manager: QueueManager,
        transport: Arc<FakeTransport>,
        receiver: Receiver<Message>,
    }

    impl DirectHarness {
        fn new() -> Self {
            let (bus_sender, manager_receiver) = broadcast::channel(1024);
            let receiver = bus_sender.subscribe();
            let transport = Arc::new(FakeTransport::new());
            let api = Arc::new(ApiClient::new(transport.clone()));
            let manager = QueueManager::new(
                engine(),
                api,
                test_config(),
                None,
                manager_receiver,
                bus_sender,
            );
            Self {
                manager,
                transport,
                receiver,
            }
        }

        fn remote(&mut self, request: u64, event: RemoteEvent) {
            self.manager.handle_remote(request, event);
        }

        fn next_worker_result(&mut self) -> WorkerResult {
            match wait_for_message(&mut self.receiver, Duration::from_secs(2), |message| {
                matches!(message, Message::Worker(_))
            }) {
                Message::Worker(result) => result,
                _ => unreachable!(),
            }
        }

        fn pump_worker(&mut self) {
            let result = self.next_worker_result();
            self.manager.handle_worker_result(result);
        }
    }

    #[test]
    fn test_set_queue_publishes_summary_and_load_intent() {
        let mut harness = DirectHarness::new();
        harness.manager.handle_queue_message(QueueMessage::SetQueue {
            songs: songs(&["A", "B"]),
            start_index: 0,
        });

        let messages = drain(&mut harness.receiver);
        assert!(messages.iter().any(|message| matches!(
            message,
            Message::Queue(QueueMessage::QueueChanged(summary)) if summary.len == 2
        )));
        assert!(messages.iter().any(|message| matches!(
            message,
            Message::Playback(PlaybackMessage::Load { current_stream_url, next_stream_url })
                if current_stream_url == "stream://A"
                    && next_stream_url.as_deref() == Some("stream://B")
        )));
    }

    #[test]
    fn test_invalid_command_is_rejected_without_change() {
        let mut harness = DirectHarness::new();
        harness.manager.handle_queue_message(QueueMessage::SetQueue {
            songs: songs(&["A"]),
            start_index: 3,
        });

        let messages = drain(&mut harness.receiver);
        assert!(messages.iter().any(|message| matches!(
            message,
            Message::Queue(QueueMessage::CommandRejected { command: "set_queue", .. })
        )));
        assert!(harness.manager.engine.is_empty());
    }

    #[test]
    fn test_remote_next_acks_and_reports_exhaustion() {
        let mut harness = DirectHarness::new();
        harness.manager.handle_queue_message(QueueMessage::SetQueue {
            songs: songs(&["A", "B"]),
            start_index: 0,
        });
        drain(&mut harness.receiver);

        harness.remote(1, RemoteEvent::Next);
        assert_eq!(wait_for_ack(&mut harness.receiver, 1), RemoteAck::ok(1));
        harness.remote(2, RemoteEvent::Next);
        let ack = wait_for_ack(&mut harness.receiver, 2);
        assert!(!ack.success);
        assert_eq!(ack.error.as_deref(), Some("queue exhausted"));
        assert_eq!(harness.manager.engine.current_index(), Some(1));
    }

    #[test]
    fn test_remote_seek_is_relative_and_clamped() {
        let mut harness = DirectHarness::new();
        harness.manager.handle_queue_message(QueueMessage::SetQueue {
            songs: songs(&["A"]),
            start_index: 0,
        });
        harness
            .manager
            .handle_playback_report(PlaybackMessage::PositionChanged { position_ms: 400 });
        drain(&mut harness.receiver);

        harness.remote(5, RemoteEvent::Seek { offset_secs: -2.0 });

        assert!(wait_for_ack(&mut harness.receiver, 5).success);
        assert_eq!(harness.manager.engine.time_ms(), 0);
        harness.remote(6, RemoteEvent::Seek { offset_secs: 30.0 });
        assert_eq!(harness.manager.engine.time_ms(), 1000);
    }

    #[test]
    fn test_remote_repeat_cycles_mode() {
        let mut harness = DirectHarness::new();
        harness.remote(3, RemoteEvent::Repeat);
        assert!(wait_for_ack(&mut harness.receiver, 3).success);
        assert_eq!(harness.manager.engine.repeat(), crate::queue::RepeatMode::All);
        assert_eq!(
            harness.manager.config.playback.repeat_mode,
            crate::queue::RepeatMode::All
        );
    }

    #[test]
    fn test_remote_favorite_mirrors_onto_queue_after_success() {
        let mut harness = DirectHarness::new();
        harness.transport.respond("star", subsonic_ok("", json!(null)));
        harness.manager.handle_queue_message(QueueMessage::SetQueue {
            songs: songs(&["A", "B"]),
            start_index: 0,
        });
        drain(&mut harness.receiver);

        harness.remote(
            7,
            RemoteEvent::Favorite {
                ids: vec!["B".to_string()],
                server_id: "srv".to_string(),
                item: LibraryItem::Song,
                favorite: true,
            },
        );
        harness.pump_worker();

        assert!(wait_for_ack(&mut harness.receiver, 7).success);
        assert!(harness.manager.engine.default_songs()[1].user_favorite);
        assert!(!harness.manager.engine.default_songs()[0].user_favorite);
    }

    #[test]
    fn test_remote_rating_for_other_server_is_refused() {
        let mut harness = DirectHarness::new();
        harness.remote(
            8,
            RemoteEvent::Rating {
                ids: vec!["A".to_string()],
                server_id: "elsewhere".to_string(),
                rating: 3,
            },
        );

        let ack = wait_for_ack(&mut harness.receiver, 8);
        assert!(!ack.success);
        assert!(harness.transport.requests().is_empty());
    }

    #[test]
    fn test_restore_rebuilds_queue_and_reports_dropped_ids() {
        let mut harness = DirectHarness::new();
        harness
            .transport
            .respond(
                "getPlayQueue",
                subsonic_ok(
                    "playQueue",
                    json!({
                        "current": "b", "position": 1500,
                        "entry": [{ "id": "a", "title": "A" }, { "id": "b", "title": "B" }]
                    }),
                ),
            )
            .respond(
                "getSong:b",
                subsonic_ok("song", json!({ "id": "b", "title": "B", "duration": 60 })),
            );

        harness.remote(9, RemoteEvent::RestoreQueue);
        harness.pump_worker();

        assert!(wait_for_ack(&mut harness.receiver, 9).success);
        let engine = &harness.manager.engine;
        assert_eq!(engine.len(), 1);
        assert_eq!(engine.current().map(|song| song.id.as_str()), Some("b"));
        assert_eq!(engine.time_ms(), 1500);
    }

    #[test]
    fn test_save_position_sends_current_index_for_duplicate_songs() {
        let mut harness = DirectHarness::new();
        harness
            .transport
            .respond("savePlayQueue2", subsonic_ok("", json!(null)));
        harness.manager.handle_queue_message(QueueMessage::SetQueue {
            songs: songs(&["A", "B", "A"]),
            start_index: 2,
        });
        harness
            .manager
            .handle_playback_report(PlaybackMessage::PositionChanged { position_ms: 640 });
        drain(&mut harness.receiver);

        harness.remote(13, RemoteEvent::SavePosition);
        harness.pump_worker();

        assert!(wait_for_ack(&mut harness.receiver, 13).success);
        let request = &harness.transport.requests()[0];
        assert!(request.form);
        assert_eq!(
            request.params,
            vec![
                ("current".to_string(), "A".to_string()),
                ("currentIndex".to_string(), "2".to_string()),
                ("positionMs".to_string(), "640".to_string())
            ]
        );
    }

    #[test]
    fn test_newer_restore_supersedes_older_one() {
        let mut harness = DirectHarness::new();
        harness.transport.respond(
            "getPlayQueue",
            subsonic_ok("playQueue", json!({ "entry": [] })),
        );

        harness.remote(10, RemoteEvent::RestoreQueue);
        let first = harness.next_worker_result();
        harness.remote(11, RemoteEvent::RestoreQueue);
        let second = harness.next_worker_result();

        harness.manager.handle_worker_result(first);
        let stale = wait_for_ack(&mut harness.receiver, 10);
        assert!(!stale.success);
        assert_eq!(stale.error.as_deref(), Some("restore superseded"));

        harness.manager.handle_worker_result(second);
        assert!(wait_for_ack(&mut harness.receiver, 11).success);
    }

    #[test]
    fn test_server_switch_discards_in_flight_restore() {
        let mut harness = DirectHarness::new();
        harness.manager.handle_queue_message(QueueMessage::SetQueue {
            songs: songs(&["keep"]),
            start_index: 0,
        });
        drain(&mut harness.receiver);
        harness.manager.pending_restore = Some(1);
        harness.manager.restore_generation = 1;

        harness.manager.switch_server(None);
        harness.manager.handle_worker_result(WorkerResult::QueueRestored {
            request: 12,
            generation: 1,
            server_id: "srv".to_string(),
            result: Ok(Some(RestoreOutcome {
                songs: songs(&["x", "y"]),
                current_index: Some(0),
                position_ms: 0,
                warning: None,
            })),
        });

        assert!(!wait_for_ack(&mut harness.receiver, 12).success);
        assert_eq!(
            harness.manager.engine.current().map(|song| song.id.as_str()),
            Some("keep")
        );
    }

    #[test]
    fn test_track_end_advances_and_stops_when_exhausted() {
        let mut harness = DirectHarness::new();
        harness.transport.respond("scrobble", subsonic_ok("", json!(null)));
        harness.manager.handle_queue_message(QueueMessage::SetQueue {
            songs: songs(&["A", "B"]),
            start_index: 0,
        });
        drain(&mut harness.receiver);

        harness.manager.handle_playback_report(PlaybackMessage::TrackEnded);
        let _ = wait_for_message(&mut harness.receiver, Duration::from_secs(1), |message| {
            matches!(
                message,
                Message::Playback(PlaybackMessage::Load { current_stream_url, .. })
                    if current_stream_url == "stream://B"
            )
        });

        harness.manager.handle_playback_report(PlaybackMessage::TrackEnded);
        let _ = wait_for_message(&mut harness.receiver, Duration::from_secs(1), |message| {
            matches!(message, Message::Playback(PlaybackMessage::Stop))
        });
        assert_eq!(harness.manager.engine.current_index(), Some(1));
    }

    #[test]
    fn test_manager_thread_answers_remote_requests_over_bus() {
        let (bus_sender, _) = broadcast::channel(1024);
        let manager_receiver = bus_sender.subscribe();
        let manager_sender = bus_sender.clone();
        let mut receiver = bus_sender.subscribe();
        let transport = Arc::new(FakeTransport::new());
        let api = Arc::new(ApiClient::new(transport));

        thread::spawn(move || {
            let mut manager = QueueManager::new(
                engine(),
                api,
                test_config(),
                None,
                manager_receiver,
                manager_sender,
            );
            manager.run();
        });

        bus_sender
            .send(Message::Queue(QueueMessage::SetQueue {
                songs: songs(&["A", "B", "C"]),
                start_index: 0,
            }))
            .expect("bus send");
        bus_sender
            .send(Message::Remote(RemoteMessage::Request {
                request: 42,
                event: RemoteEvent::Shuffle,
            }))
            .expect("bus send");

        let summary = match wait_for_message(&mut receiver, Duration::from_secs(1), |message| {
            matches!(message, Message::Queue(QueueMessage::QueueChanged(summary)) if summary.shuffled)
        }) {
            Message::Queue(QueueMessage::QueueChanged(summary)) => summary,
            _ => unreachable!(),
        };
        assert_eq!(summary.current_song_id.as_deref(), Some("A"));
        assert_eq!(summary.current_index, Some(0));
        assert!(wait_for_ack(&mut receiver, 42).success);
    }
}
