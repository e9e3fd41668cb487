use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use log::{error, info, warn};
use sonance::api::ApiClient;
use sonance::backends::http::UreqTransport;
use sonance::config;
use sonance::identity::UuidGenerator;
use sonance::protocol::{Message, QueueMessage, RemoteEvent, RemoteMessage};
use sonance::queue::QueueEngine;
use sonance::queue_manager::QueueManager;
use tokio::sync::broadcast;

const BUS_CAPACITY: usize = 1024;
const STARTUP_RESTORE_REQUEST: u64 = 1;

fn panic_payload_to_string(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        return (*s).to_string();
    }
    if let Some(s) = payload.downcast_ref::<String>() {
        return s.clone();
    }
    "non-string panic payload".to_string()
}

fn resolve_config_path() -> Option<PathBuf> {
    std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(config::default_config_path)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut clog = colog::default_builder();
    clog.filter(None, log::LevelFilter::Debug);
    clog.init();

    std::panic::set_hook(Box::new(|panic_info| {
        let current_thread = std::thread::current();
        let thread_name = current_thread.name().unwrap_or("unnamed");
        log::error!("panic in thread '{}': {}", thread_name, panic_info);
    }));

    let config_path = resolve_config_path();
    let config = match &config_path {
        Some(path) => {
            info!("Loading config from {}", path.display());
            config::load_config_file(path)
        }
        None => {
            warn!("No config directory available. Using defaults");
            config::sanitize_config(config::Config::default())
        }
    };

    let transport = UreqTransport::new(config.connect_timeout(), config.read_timeout());
    let api = Arc::new(ApiClient::new(Arc::new(transport)).with_image_sizes(config.image_sizes()));

    let (bus_sender, _) = broadcast::channel::<Message>(BUS_CAPACITY);
    let mut bus_receiver = bus_sender.subscribe();

    // Setup queue manager
    let queue_bus_receiver = bus_sender.subscribe();
    let queue_bus_sender = bus_sender.clone();
    let queue_config = config.clone();
    let queue_thread = thread::Builder::new()
        .name("queue-manager".to_string())
        .spawn(move || {
            let run_result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                let mut queue_manager = QueueManager::new(
                    QueueEngine::with_entropy(Arc::new(UuidGenerator)),
                    api,
                    queue_config,
                    config_path,
                    queue_bus_receiver,
                    queue_bus_sender,
                );
                queue_manager.run();
            }));
            if let Err(payload) = run_result {
                log::error!(
                    "QueueManager thread terminated due to panic: {}",
                    panic_payload_to_string(payload.as_ref())
                );
            }
        })?;

    let Some(server) = config.active_server() else {
        info!("No active server configured. Nothing to restore");
        return Ok(());
    };
    info!("Restoring play queue from {} ({})", server.name, server.url);

    let _ = bus_sender.send(Message::Remote(RemoteMessage::Request {
        request: STARTUP_RESTORE_REQUEST,
        event: RemoteEvent::RestoreQueue,
    }));

    loop {
        match bus_receiver.blocking_recv() {
            Ok(Message::Queue(QueueMessage::Restored { warning })) => {
                if let Some(warning) = warning {
                    warn!("Restored queue without: {}", warning.dropped_ids.join(", "));
                }
            }
            Ok(Message::Queue(QueueMessage::QueueChanged(summary))) => {
                info!(
                    "Queue: {} song(s), current {:?} at {} ms",
                    summary.len, summary.current_song_id, summary.position_ms
                );
            }
            Ok(Message::Remote(RemoteMessage::Ack(ack)))
                if ack.request == STARTUP_RESTORE_REQUEST =>
            {
                match ack.error {
                    None => info!("Play queue restore finished"),
                    Some(err) => error!("Play queue restore failed: {}", err),
                }
                break;
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Bus lagged, {} message(s) skipped", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }

    if queue_thread.is_finished() {
        warn!("QueueManager thread has already stopped");
    }

    info!("Application exiting");
    Ok(())
}
