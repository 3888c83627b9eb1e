//! Configuration loading from TOML files and environment variables.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub overlay: OverlayConfig,
    #[serde(default)]
    pub gallery: GalleryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Idle overlay behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayConfig {
    /// Seconds of inactivity before the overlay appears.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Idle check interval in milliseconds.
    #[serde(default = "default_check_interval_ms")]
    pub check_interval_ms: u64,
    /// Debounce delay for window resizes in milliseconds.
    #[serde(default = "default_resize_debounce_ms")]
    pub resize_debounce_ms: u64,
    /// Whether the screensaver is armed at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
            check_interval_ms: default_check_interval_ms(),
            resize_debounce_ms: default_resize_debounce_ms(),
            enabled: default_enabled(),
        }
    }
}

impl OverlayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }

    pub fn resize_debounce(&self) -> Duration {
        Duration::from_millis(self.resize_debounce_ms)
    }
}

/// Image gallery endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GalleryConfig {
    /// HTTP endpoint returning `{ "images": ["url", ...] }`.
    #[serde(default = "default_endpoint_url")]
    pub endpoint_url: String,
    /// Request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Gaussian blur sigma applied to the backdrop image.
    #[serde(default = "default_backdrop_blur_sigma")]
    pub backdrop_blur_sigma: f32,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            endpoint_url: default_endpoint_url(),
            request_timeout_seconds: default_request_timeout(),
            backdrop_blur_sigma: default_backdrop_blur_sigma(),
        }
    }
}

impl GalleryConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Data directory for session logs.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            level: default_log_level(),
        }
    }
}

impl LoggingConfig {
    /// Returns the session logs directory path.
    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

// Default value functions
fn default_timeout_seconds() -> u64 {
    300
}

fn default_check_interval_ms() -> u64 {
    250
}

fn default_resize_debounce_ms() -> u64 {
    250
}

fn default_enabled() -> bool {
    true
}

fn default_endpoint_url() -> String {
    "http://127.0.0.1:8080/api/idle-images".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_backdrop_blur_sigma() -> f32 {
    8.0
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".driftscreen"))
        .unwrap_or_else(|| PathBuf::from(".driftscreen"))
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            overlay: OverlayConfig::default(),
            gallery: GalleryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse config file")?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = config_path {
            Self::from_file(path)?
        } else {
            // Try default config locations
            let default_paths = [
                PathBuf::from("config/default.toml"),
                dirs::config_dir()
                    .map(|d| d.join("driftscreen/config.toml"))
                    .unwrap_or_default(),
            ];

            let mut loaded = None;
            for path in &default_paths {
                if path.exists() {
                    loaded = Some(Self::from_file(path)?);
                    break;
                }
            }
            loaded.unwrap_or_default()
        };

        // Apply environment variable overrides
        config.apply_env_overrides();

        // Expand home directory in data_dir
        config.logging.data_dir = expand_tilde(&config.logging.data_dir);

        Ok(config)
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("DRIFTSCREEN_IDLE_TIMEOUT") {
            if let Ok(v) = val.parse() {
                self.overlay.timeout_seconds = v;
            }
        }
        if let Ok(val) = std::env::var("DRIFTSCREEN_RESIZE_DEBOUNCE_MS") {
            if let Ok(v) = val.parse() {
                self.overlay.resize_debounce_ms = v;
            }
        }
        if let Ok(val) = std::env::var("DRIFTSCREEN_ENABLED") {
            if let Ok(v) = val.parse() {
                self.overlay.enabled = v;
            }
        }
        if let Ok(val) = std::env::var("DRIFTSCREEN_ENDPOINT_URL") {
            self.gallery.endpoint_url = val;
        }
        if let Ok(val) = std::env::var("DRIFTSCREEN_DATA_DIR") {
            self.logging.data_dir = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("DRIFTSCREEN_LOG_LEVEL") {
            self.logging.level = val;
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.overlay.timeout_seconds == 0 {
            anyhow::bail!("Idle timeout must be greater than 0");
        }
        if self.overlay.check_interval_ms == 0 {
            anyhow::bail!("Idle check interval must be greater than 0");
        }
        if self.overlay.resize_debounce_ms == 0 {
            anyhow::bail!("Resize debounce must be greater than 0");
        }
        if self.gallery.endpoint_url.is_empty() {
            anyhow::bail!("Gallery endpoint URL cannot be empty");
        }
        if !self.gallery.backdrop_blur_sigma.is_finite() || self.gallery.backdrop_blur_sigma < 0.0 {
            anyhow::bail!("Backdrop blur sigma must be a non-negative number");
        }
        Ok(())
    }
}

/// Expand a leading ~ to the home directory. Paths like `~foo` are not
/// home-relative and pass through untouched.
fn expand_tilde(path: &Path) -> PathBuf {
    if let (Some(path_str), Some(home)) = (path.to_str(), dirs::home_dir()) {
        if path_str == "~" {
            return home;
        }
        if let Some(rest) = path_str.strip_prefix("~/") {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}
