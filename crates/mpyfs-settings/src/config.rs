//! Configuration management for mpyfs
//!
//! Settings live in a JSON or TOML file with two sections:
//! - `[connection]`: port, baud rate, read timeout
//! - `[timing]`: raw REPL settle delays, marker deadline, polling
//!
//! Every field is optional in the file; missing fields keep their defaults.

use crate::error::{SettingsError, SettingsResult};
use mpyfs_core::constants::{DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT_MS};
use mpyfs_core::ProtocolTiming;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the default configuration file
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Serial port of the board
    pub port: Option<String>,
    /// Baud rate
    pub baud_rate: u32,
    /// Read timeout of a single port read in milliseconds
    pub read_timeout_ms: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
        }
    }
}

/// Raw REPL timing, in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSettings {
    pub interrupt_settle_ms: u64,
    pub enter_settle_ms: u64,
    pub exit_settle_ms: u64,
    /// Settle delays of the three warmup steps
    pub warmup_settle_ms: [u64; 3],
    /// How long to wait for a marker frame
    pub marker_deadline_ms: u64,
    pub poll_interval_ms: u64,
    /// Output window for programs run without markers
    pub fixed_delay_ms: u64,
    pub reset_settle_ms: u64,
    /// Bytes requested per read
    pub read_chunk_size: usize,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self::from(&ProtocolTiming::default())
    }
}

fn millis(d: Duration) -> u64 {
    d.as_millis() as u64
}

impl From<&ProtocolTiming> for TimingSettings {
    fn from(timing: &ProtocolTiming) -> Self {
        Self {
            interrupt_settle_ms: millis(timing.interrupt_settle),
            enter_settle_ms: millis(timing.enter_settle),
            exit_settle_ms: millis(timing.exit_settle),
            warmup_settle_ms: timing.warmup_settle.map(millis),
            marker_deadline_ms: millis(timing.marker_deadline),
            poll_interval_ms: millis(timing.poll_interval),
            fixed_delay_ms: millis(timing.fixed_delay),
            reset_settle_ms: millis(timing.reset_settle),
            read_chunk_size: timing.read_chunk_size,
        }
    }
}

impl TimingSettings {
    /// Convert to the protocol timing value
    pub fn to_timing(&self) -> ProtocolTiming {
        ProtocolTiming {
            interrupt_settle: Duration::from_millis(self.interrupt_settle_ms),
            enter_settle: Duration::from_millis(self.enter_settle_ms),
            exit_settle: Duration::from_millis(self.exit_settle_ms),
            warmup_settle: self.warmup_settle_ms.map(Duration::from_millis),
            marker_deadline: Duration::from_millis(self.marker_deadline_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            fixed_delay: Duration::from_millis(self.fixed_delay_ms),
            reset_settle: Duration::from_millis(self.reset_settle_ms),
            read_chunk_size: self.read_chunk_size,
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Connection settings
    pub connection: ConnectionSettings,
    /// Protocol timing
    pub timing: TimingSettings,
}

enum Format {
    Json,
    Toml,
}

fn format_of(path: &Path) -> SettingsResult<Format> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Ok(Format::Json),
        Some("toml") => Ok(Format::Toml),
        other => Err(SettingsError::UnsupportedFormat(
            other.unwrap_or("<none>").to_string(),
        )),
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// `<config_dir>/mpyfs/config.toml`, when the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("mpyfs").join(CONFIG_FILE_NAME))
    }

    /// Load the explicit file if given, else the default file if it exists
    ///
    /// An explicit file must exist; a missing default file means defaults.
    pub fn load(explicit: Option<&Path>) -> SettingsResult<Self> {
        if let Some(path) = explicit {
            return Self::load_from_file(path);
        }

        match Self::default_path() {
            Some(path) if path.exists() => {
                tracing::debug!("Loading settings from {}", path.display());
                Self::load_from_file(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let format = format_of(path)?;
        let content = std::fs::read_to_string(path).map_err(|e| SettingsError::LoadError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let config: Self = match format {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match format_of(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)
                .map_err(|e| SettingsError::SaveError(e.to_string()))?,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> SettingsResult<()> {
        if self.connection.baud_rate == 0 {
            return Err(SettingsError::invalid("connection.baud_rate", "must be > 0"));
        }

        if self.connection.read_timeout_ms == 0 {
            return Err(SettingsError::invalid(
                "connection.read_timeout_ms",
                "must be > 0",
            ));
        }

        if let Some(port) = &self.connection.port {
            if port.trim().is_empty() {
                return Err(SettingsError::invalid("connection.port", "must not be empty"));
            }
        }

        if self.timing.marker_deadline_ms == 0 {
            return Err(SettingsError::invalid(
                "timing.marker_deadline_ms",
                "must be > 0",
            ));
        }

        if self.timing.poll_interval_ms == 0 {
            return Err(SettingsError::invalid("timing.poll_interval_ms", "must be > 0"));
        }

        if self.timing.read_chunk_size == 0 {
            return Err(SettingsError::invalid("timing.read_chunk_size", "must be > 0"));
        }

        Ok(())
    }

    /// Apply values given on the command line or through the environment
    pub fn with_overrides(mut self, port: Option<String>, baud_rate: Option<u32>) -> Self {
        if port.is_some() {
            self.connection.port = port;
        }
        if let Some(baud_rate) = baud_rate {
            self.connection.baud_rate = baud_rate;
        }
        self
    }

    /// Read timeout as a duration
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.connection.read_timeout_ms)
    }

    /// Protocol timing value
    pub fn timing(&self) -> ProtocolTiming {
        self.timing.to_timing()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_protocol() {
        let config = Config::default();
        assert_eq!(config.connection.baud_rate, 115_200);
        assert_eq!(config.connection.read_timeout_ms, 10);
        assert_eq!(config.timing(), ProtocolTiming::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            "[connection]\nport = \"/dev/ttyUSB0\"\n\n[timing]\nmarker_deadline_ms = 3000\n",
        )
        .unwrap();

        assert_eq!(config.connection.port.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(config.connection.baud_rate, 115_200);
        assert_eq!(config.timing().marker_deadline, Duration::from_secs(3));
        assert_eq!(config.timing.poll_interval_ms, 20);
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.connection.baud_rate = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.timing.read_chunk_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.timing.poll_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.connection.port = Some("  ".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::default();
        config.connection.port = Some("/dev/ttyUSB0".to_string());

        let config = config.with_overrides(None, Some(230_400));
        assert_eq!(config.connection.port.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(config.connection.baud_rate, 230_400);

        let config = config.with_overrides(Some("COM3".to_string()), None);
        assert_eq!(config.connection.port.as_deref(), Some("COM3"));
    }

    #[test]
    fn test_unsupported_extension() {
        let err = Config::load_from_file(Path::new("settings.yaml")).unwrap_err();
        assert!(matches!(err, SettingsError::UnsupportedFormat(_)));
    }
}
