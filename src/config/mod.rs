//! Configuration module for multicam-rs
//!
//! Configuration lives in a TOML file. Every section is optional and falls
//! back to defaults, so an empty file is a valid configuration.
//!
//! # Config Location
//!
//! - **Linux**: `~/.config/multicam-rs/config.toml`
//! - **macOS**: `~/Library/Application Support/multicam-rs/config.toml`
//! - **Windows**: `%APPDATA%\multicam-rs\config.toml`
//!
//! # Example
//!
//! ```toml
//! [channel]
//! capacity = 4
//! drop_policy = "drop_oldest"
//!
//! [camera]
//! preview_width = 300
//! preview_height = 300
//! stream_name = "rgb"
//!
//! [mock]
//! devices = 2
//! frame_interval_ms = 33
//! ```

use crate::error::{MulticamError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Application identifier for config directories
pub const APP_ID: &str = "multicam-rs";

/// Config filename
pub const CONFIG_FILE: &str = "config.toml";

/// Default frame channel capacity
pub const DEFAULT_CHANNEL_CAPACITY: usize = 4;

/// Default name of the color preview output stream
pub const DEFAULT_STREAM_NAME: &str = "rgb";

/// Default preview edge length in pixels
pub const DEFAULT_PREVIEW_SIZE: u32 = 300;

/// Default frame rate in Hz
pub const DEFAULT_FPS: u32 = 30;

/// Get the default config file path
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID).join(CONFIG_FILE))
}

// ==================== Channel ====================

/// What a full frame channel does with a new frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DropPolicy {
    /// Evict the oldest buffered frame to make room
    #[default]
    DropOldest,
    /// Discard the incoming frame
    DropNewest,
}

impl fmt::Display for DropPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropPolicy::DropOldest => write!(f, "drop_oldest"),
            DropPolicy::DropNewest => write!(f, "drop_newest"),
        }
    }
}

impl FromStr for DropPolicy {
    type Err = MulticamError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "drop_oldest" | "oldest" => Ok(DropPolicy::DropOldest),
            "drop_newest" | "newest" => Ok(DropPolicy::DropNewest),
            other => Err(MulticamError::Config(format!("Unknown drop policy: {}", other))),
        }
    }
}

/// Frame channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Maximum number of buffered frames per output stream
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Overflow behaviour
    #[serde(default)]
    pub drop_policy: DropPolicy,
}

fn default_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CHANNEL_CAPACITY,
            drop_policy: DropPolicy::DropOldest,
        }
    }
}

// ==================== Camera ====================

/// Sensor resolution of the color camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SensorResolution {
    #[serde(rename = "720p")]
    P720,
    #[default]
    #[serde(rename = "1080p")]
    P1080,
    #[serde(rename = "4k")]
    P4k,
}

impl SensorResolution {
    /// Native sensor dimensions
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            SensorResolution::P720 => (1280, 720),
            SensorResolution::P1080 => (1920, 1080),
            SensorResolution::P4k => (3840, 2160),
        }
    }
}

/// Physical socket the camera node binds to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BoardSocket {
    #[default]
    Rgb,
    Left,
    Right,
}

/// Color camera node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Preview output width in pixels
    #[serde(default = "default_preview_size")]
    pub preview_width: u32,

    /// Preview output height in pixels
    #[serde(default = "default_preview_size")]
    pub preview_height: u32,

    /// Sensor resolution
    #[serde(default)]
    pub resolution: SensorResolution,

    /// Board socket
    #[serde(default)]
    pub socket: BoardSocket,

    /// Interleaved (HWC) output instead of planar (CHW)
    #[serde(default)]
    pub interleaved: bool,

    /// Frame rate in Hz
    #[serde(default = "default_fps")]
    pub fps: u32,

    /// Output stream name
    #[serde(default = "default_stream_name")]
    pub stream_name: String,
}

fn default_preview_size() -> u32 {
    DEFAULT_PREVIEW_SIZE
}

fn default_fps() -> u32 {
    DEFAULT_FPS
}

fn default_stream_name() -> String {
    DEFAULT_STREAM_NAME.to_string()
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            preview_width: DEFAULT_PREVIEW_SIZE,
            preview_height: DEFAULT_PREVIEW_SIZE,
            resolution: SensorResolution::P1080,
            socket: BoardSocket::Rgb,
            interleaved: false,
            fps: DEFAULT_FPS,
            stream_name: DEFAULT_STREAM_NAME.to_string(),
        }
    }
}

// ==================== Mock Devices ====================

/// Synthetic device configuration used by the mock backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockConfig {
    /// Number of synthetic devices to enumerate
    #[serde(default = "default_mock_devices")]
    pub devices: usize,

    /// Delay between produced frames in milliseconds
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,

    /// Frames each device produces before stalling (None = unlimited)
    #[serde(default)]
    pub frames_per_device: Option<u64>,

    /// End the stream after `frames_per_device` instead of stalling
    #[serde(default)]
    pub end_of_stream: bool,

    /// Device ids whose start should fail
    #[serde(default)]
    pub fail_start: Vec<String>,
}

fn default_mock_devices() -> usize {
    2
}

fn default_frame_interval_ms() -> u64 {
    33
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            devices: default_mock_devices(),
            frame_interval_ms: default_frame_interval_ms(),
            frames_per_device: None,
            end_of_stream: false,
            fail_start: Vec::new(),
        }
    }
}

// ==================== Logging ====================

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub filter: String,

    /// Directory for a daily rolling log file (disabled when unset)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_log_filter() -> String {
    "info,multicam_rs=debug".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            file: None,
        }
    }
}

// ==================== App Config ====================

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Frame channel settings
    #[serde(default)]
    pub channel: ChannelConfig,

    /// Camera node settings
    #[serde(default)]
    pub camera: CameraConfig,

    /// Mock backend settings
    #[serde(default)]
    pub mock: MockConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load a config file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            MulticamError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| {
            MulticamError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load the config at the default location, returning defaults on any error
    pub fn load_or_default() -> Self {
        let Some(path) = default_config_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save the config as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                MulticamError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| MulticamError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content).map_err(|e| {
            MulticamError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }

    /// Reject values the runtime cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.channel.capacity == 0 {
            return Err(MulticamError::Config(
                "channel.capacity must be at least 1".to_string(),
            ));
        }
        if self.camera.preview_width == 0 || self.camera.preview_height == 0 {
            return Err(MulticamError::Config(
                "camera preview size must be non-zero".to_string(),
            ));
        }
        if self.camera.stream_name.is_empty() {
            return Err(MulticamError::Config(
                "camera.stream_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
