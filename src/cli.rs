//! Command-line surface
//!
//! Command names use dashes; the underscore spellings are accepted as
//! aliases.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

const LONG_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (built ", env!("BUILD_DATE"), ")");

/// Remote filesystem access for MicroPython boards
#[derive(Debug, Parser)]
#[command(name = "mpyfs", version, long_version = LONG_VERSION, about)]
pub struct Cli {
    /// Serial port of the board
    #[arg(long, global = true, env = "MPY_WORKBENCH_PORT")]
    pub port: Option<String>,

    /// Baud rate (default: 115200; may be ignored on USB CDC)
    #[arg(long, global = true, env = "MPY_WORKBENCH_BAUD")]
    pub baud: Option<u32>,

    /// Configuration file (.toml or .json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log protocol steps to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// One device operation
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// List serial ports
    Devs {
        /// Only ports that look like USB/UART adapters
        #[arg(long)]
        boards: bool,
        /// Print description, manufacturer, serial number and USB IDs as JSON
        #[arg(long)]
        json: bool,
    },

    /// List names in a directory, one per line
    Ls {
        #[arg(long)]
        path: String,
    },

    /// List a directory as JSON with directory flags
    #[command(alias = "ls_typed")]
    LsTyped {
        #[arg(long)]
        path: String,
    },

    /// Create a directory
    Mkdir {
        #[arg(long)]
        path: String,
    },

    /// Remove a file
    Rm {
        #[arg(long)]
        path: String,
    },

    /// Remove everything inside a directory
    Rmrf {
        #[arg(long)]
        path: String,
    },

    /// Remove a file and verify it is gone
    #[command(alias = "delete_file")]
    DeleteFile {
        #[arg(long)]
        path: String,
    },

    /// Remove a directory with its content
    #[command(alias = "delete_folder_recursive")]
    DeleteFolderRecursive {
        #[arg(long)]
        path: String,
    },

    /// Print `exists` or `not_exists`
    #[command(alias = "file_exists")]
    FileExists {
        #[arg(long)]
        path: String,
    },

    /// Print `mode|size|kind|access`
    #[command(alias = "file_info")]
    FileInfo {
        #[arg(long)]
        path: String,
    },

    /// Copy a file from the board
    #[command(alias = "cp_from")]
    CpFrom {
        /// Device path
        #[arg(long)]
        src: String,
        /// Local path
        #[arg(long)]
        dst: PathBuf,
    },

    /// Copy a file to the board
    #[command(alias = "cp_to")]
    CpTo {
        /// Local path
        #[arg(long)]
        src: PathBuf,
        /// Device path
        #[arg(long)]
        dst: String,
    },

    /// Upload through a staging file, then replace the target
    #[command(alias = "upload_replacing")]
    UploadReplacing {
        /// Local path
        #[arg(long)]
        src: PathBuf,
        /// Device path
        #[arg(long)]
        dst: String,
    },

    /// Run a local program on the board and print its output
    #[command(alias = "run_file")]
    RunFile {
        /// Local path
        #[arg(long)]
        src: PathBuf,
    },

    /// Soft-reset the board
    Reset,

    /// Recursive listing with sizes, as JSON
    #[command(alias = "tree_stats")]
    TreeStats {
        #[arg(long)]
        path: String,
    },

    /// Delete everything below a path, one entry at a time
    #[command(alias = "delete_all_in_path")]
    DeleteAllInPath {
        #[arg(long)]
        path: String,
    },

    /// Delete a file or directory in one round trip
    #[command(alias = "delete_any")]
    DeleteAny {
        #[arg(long)]
        path: String,
    },

    /// Delete all children of a directory in one round trip
    #[command(alias = "wipe_path")]
    WipePath {
        #[arg(long)]
        path: String,
    },

    /// Rename or move a file or directory
    Mv {
        #[arg(long)]
        src: String,
        #[arg(long)]
        dst: String,
    },
}
