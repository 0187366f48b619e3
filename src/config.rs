//! Bridge configuration, persisted as TOML.
//!
//! Loaded once at startup from `<config dir>/cabinet-bridge/bridge.toml`
//! unless an explicit path is given. A missing file is created with defaults
//! so the next start has something to edit.

use crate::input::KeyBindings;
use crate::overlay::DEFAULT_STARTUP_DELAY;
use crate::rpc::DEFAULT_CALL_TIMEOUT;
use crate::transport::TransportSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

const CONFIG_DIR: &str = "cabinet-bridge";
const CONFIG_FILE: &str = "bridge.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct BridgeConfig {
    pub host: HostConfig,
    pub input: InputConfig,
    pub gamepad: GamepadConfig,
    pub overlay: OverlayConfig,
    pub assets: AssetsConfig,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct HostConfig {
    /// WebSocket endpoint of the host, without the window query
    pub url: String,
    /// Name this window announces in the `window` query parameter
    pub window: String,
    pub reconnect_delay_ms: u64,
    pub call_timeout_ms: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8002".to_string(),
            window: "table".to_string(),
            reconnect_delay_ms: 2000,
            call_timeout_ms: DEFAULT_CALL_TIMEOUT.as_millis() as u64,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct InputConfig {
    /// The one window that owns keyboard and gamepad input
    pub primary_window: String,
    pub keys: KeyBindings,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            primary_window: "table".to_string(),
            keys: KeyBindings::default(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct GamepadConfig {
    pub enabled: bool,
    pub frame_interval_ms: u64,
}

impl Default for GamepadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            frame_interval_ms: 16,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct OverlayConfig {
    pub startup_delay_ms: u64,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            startup_delay_ms: DEFAULT_STARTUP_DELAY.as_millis() as u64,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct AssetsConfig {
    /// Used until the host reports its asset server port
    pub fallback_port: u16,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            fallback_port: 8000,
        }
    }
}

impl BridgeConfig {
    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| {
            warn!("Could not determine config directory, using current directory");
            PathBuf::from(".")
        });
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        path
    }

    /// Reads `path`, or writes and returns defaults when it does not exist
    pub async fn load_or_create(path: &Path) -> Result<Self, ConfigError> {
        let exists = tokio::fs::try_exists(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        if !exists {
            info!("No config at {}, writing defaults", path.display());
            let config = Self::default();
            config.save(path).await?;
            return Ok(config);
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| ConfigError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        let content = toml::to_string_pretty(self)?;
        tokio::fs::write(path, content)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
    }

    pub fn transport_settings(&self) -> TransportSettings {
        TransportSettings {
            url: self.host.url.clone(),
            window: self.host.window.clone(),
            reconnect_delay: Duration::from_millis(self.host.reconnect_delay_ms),
        }
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.host.call_timeout_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.gamepad.frame_interval_ms)
    }

    pub fn overlay_startup_delay(&self) -> Duration {
        Duration::from_millis(self.overlay.startup_delay_ms)
    }
}
