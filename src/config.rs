//! Persistent application configuration model, defaults and file I/O.

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{error, warn};

use crate::api::ImageSizes;
use crate::backends::media::token_credential;
use crate::backends::ServerContext;
use crate::model::ServerType;
use crate::queue::RepeatMode;

const CONFIG_DIR_NAME: &str = "sonance";
const CONFIG_FILE_NAME: &str = "config.toml";
const MAX_IMAGE_SIZE: u32 = 4096;

/// Root configuration persisted to `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Config {
    #[serde(default)]
    pub active_server_id: Option<String>,
    #[serde(default)]
    pub servers: Vec<ServerConfig>,
    #[serde(default)]
    /// Queue and playback preferences.
    pub playback: PlaybackConfig,
    #[serde(default)]
    /// HTTP transport timeouts.
    pub transport: TransportConfig,
}

/// One configured music server.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct ServerConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub username: String,
    pub server_type: ServerType,
    /// Pre-computed Subsonic credential fragment (`u=..&s=..&t=..`).
    #[serde(default)]
    pub credential: Option<String>,
    /// Used to derive a token credential when `credential` is absent.
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub navidrome_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct PlaybackConfig {
    #[serde(default)]
    pub repeat_mode: RepeatMode,
    #[serde(default)]
    pub shuffle: bool,
    /// Zero means "backend default".
    #[serde(default)]
    pub song_image_size: u32,
    #[serde(default)]
    pub album_image_size: u32,
    #[serde(default)]
    pub artist_image_size: u32,
    #[serde(default = "default_volume")]
    pub volume: u8,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct TransportConfig {
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            repeat_mode: RepeatMode::None,
            shuffle: false,
            song_image_size: 0,
            album_image_size: 0,
            artist_image_size: 0,
            volume: default_volume(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            read_timeout_secs: default_read_timeout_secs(),
        }
    }
}

fn default_volume() -> u8 {
    100
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_read_timeout_secs() -> u64 {
    15
}

impl ServerConfig {
    /// Builds the context backend calls are made against.
    pub fn to_server_context(&self) -> ServerContext {
        let credential = match (&self.credential, &self.password) {
            (Some(credential), _) if !credential.is_empty() => credential.clone(),
            (_, Some(password)) => token_credential(&self.username, password),
            _ => {
                warn!(
                    "Config: server {} has neither credential nor password",
                    self.id
                );
                String::new()
            }
        };
        let mut context = ServerContext::new(&self.id, &self.url, self.server_type, credential);
        context.name = self.name.clone();
        context.username = self.username.clone();
        context.navidrome_token = self.navidrome_token.clone();
        context
    }
}

impl Config {
    pub fn active_server(&self) -> Option<&ServerConfig> {
        let active_id = self.active_server_id.as_deref()?;
        self.servers.iter().find(|server| server.id == active_id)
    }

    pub fn image_sizes(&self) -> ImageSizes {
        let requested = |size: u32| (size > 0).then_some(size);
        ImageSizes {
            song: requested(self.playback.song_image_size),
            album: requested(self.playback.album_image_size),
            artist: requested(self.playback.artist_image_size),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.transport.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.transport.read_timeout_secs)
    }
}

/// Clamps out-of-range values and drops a dangling active server id.
pub fn sanitize_config(mut config: Config) -> Config {
    for size in [
        &mut config.playback.song_image_size,
        &mut config.playback.album_image_size,
        &mut config.playback.artist_image_size,
    ] {
        *size = (*size).min(MAX_IMAGE_SIZE);
    }
    config.playback.volume = config.playback.volume.min(100);
    config.transport.connect_timeout_secs = config.transport.connect_timeout_secs.max(1);
    config.transport.read_timeout_secs = config.transport.read_timeout_secs.max(1);

    if config.active_server().is_none() {
        if let Some(active_id) = config.active_server_id.take() {
            warn!("Config: active server {} is not configured", active_id);
        }
        config.active_server_id = config.servers.first().map(|server| server.id.clone());
    }
    config
}

/// `<config dir>/sonance/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|root| root.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Reads the config file, falling back to defaults when it is missing or
/// cannot be parsed.
pub fn load_config_file(path: &Path) -> Config {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return sanitize_config(Config::default());
        }
        Err(err) => {
            error!("Failed to read config {}: {}", path.display(), err);
            return sanitize_config(Config::default());
        }
    };
    match toml::from_str::<Config>(&text) {
        Ok(config) => sanitize_config(config),
        Err(err) => {
            error!("Failed to parse config {}: {}. Using defaults.", path.display(), err);
            sanitize_config(Config::default())
        }
    }
}

pub fn persist_config_file(config: &Config, path: &Path) {
    let config_text = match toml::to_string_pretty(config) {
        Ok(text) => text,
        Err(err) => {
            error!("Failed to serialize config for {}: {}", path.display(), err);
            return;
        }
    };
    if let Some(parent) = path.parent() {
        if let Err(err) = std::fs::create_dir_all(parent) {
            error!("Failed to create config dir {}: {}", parent.display(), err);
            return;
        }
    }
    if let Err(err) = std::fs::write(path, config_text) {
        error!("Failed to persist config to {}: {}", path.display(), err);
    }
}
