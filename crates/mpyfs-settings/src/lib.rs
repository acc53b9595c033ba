//! mpyfs Settings Crate
//!
//! Loads and validates the configuration file holding connection and
//! protocol timing settings.

pub mod config;
pub mod error;

pub use config::{Config, ConnectionSettings, TimingSettings, CONFIG_FILE_NAME};
pub use error::{SettingsError, SettingsResult};
