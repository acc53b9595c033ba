//! # mpyfs
//!
//! Remote filesystem access for MicroPython boards over a serial link:
//! - List, create, remove and rename files and directories
//! - Copy files to and from the board, with staged replacement
//! - Bulk deletion with per-entry error reports
//! - Run a program and capture its output
//!
//! Nothing needs to be installed on the board. Every operation enters the
//! raw REPL, submits a short program and scrapes its marker-delimited
//! result.
//!
//! ## Architecture
//!
//! mpyfs is organized as a workspace with multiple crates:
//!
//! 1. **mpyfs-core** - Errors, wire constants, protocol timing, decoded records
//! 2. **mpyfs-communication** - Serial transport, raw REPL client, filesystem operations
//! 3. **mpyfs-settings** - Configuration file handling
//! 4. **mpyfs** - Command-line binary that integrates all crates

pub mod cli;
pub mod commands;

pub use mpyfs_core::{
    BulkOutcome, ConnectionError, DeleteAllReport, DeleteAnyReport, DirEntry, Error, FileInfo,
    ProtocolError, ProtocolTiming, Result, StatOutcome, TransportError, TreeEntry, WipeReport,
};

pub use mpyfs_communication::{
    list_ports, BoardFs, ConnectionParams, DeviceClient, MarkerCodec, SerialPortInfo,
    SimulatedDevice, Snippet, SnippetBuilder,
};

pub use mpyfs_settings::{Config, SettingsError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging
///
/// Sets up structured logging with:
/// - Output on stderr, so stdout stays machine-readable
/// - RUST_LOG environment variable support
/// - `warn` by default, `debug` when `verbose` is set
pub fn init_logging(verbose: bool) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let default_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    let env_filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .with_level(true)
        .with_line_number(verbose);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
