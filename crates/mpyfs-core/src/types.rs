//! Records decoded from device payloads

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// Entry name, without the parent path
    pub name: String,
    /// Whether the entry is a directory
    #[serde(rename = "isDir")]
    pub is_dir: bool,
}

impl DirEntry {
    /// Create a new entry
    pub fn new(name: impl Into<String>, is_dir: bool) -> Self {
        Self {
            name: name.into(),
            is_dir,
        }
    }
}

/// One entry of a recursive subtree walk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    /// Absolute device path
    pub path: String,
    /// Whether the entry is a directory
    #[serde(rename = "isDir")]
    pub is_dir: bool,
    /// Size in bytes (0 when the port does not report it)
    #[serde(default)]
    pub size: u64,
    /// Modification time in device epoch seconds (0 when unknown)
    #[serde(default)]
    pub mtime: i64,
}

impl TreeEntry {
    /// Number of path separators, used to order directory deletion
    pub fn depth(&self) -> usize {
        self.path.matches('/').count()
    }
}

/// Result of a stat call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Raw stat mode
    pub mode: u32,
    /// Size in bytes
    pub size: u64,
    /// Whether the path is a directory
    pub is_dir: bool,
    /// Whether the owner write bit is clear
    pub read_only: bool,
}

impl fmt::Display for FileInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}",
            self.mode,
            self.size,
            if self.is_dir { "dir" } else { "file" },
            if self.read_only { "ro" } else { "rw" }
        )
    }
}

impl FromStr for FileInfo {
    type Err = String;

    /// Parse the `mode|size|dir|ro` form printed by the stat snippet
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('|').collect();
        if parts.len() != 4 {
            return Err(format!("expected 4 fields, got {}", parts.len()));
        }

        let mode = parts[0]
            .parse::<u32>()
            .map_err(|e| format!("invalid mode '{}': {}", parts[0], e))?;
        let size = parts[1]
            .parse::<u64>()
            .map_err(|e| format!("invalid size '{}': {}", parts[1], e))?;
        let is_dir = match parts[2] {
            "dir" => true,
            "file" => false,
            other => return Err(format!("invalid kind '{}'", other)),
        };
        let read_only = match parts[3] {
            "ro" => true,
            "rw" => false,
            other => return Err(format!("invalid access '{}'", other)),
        };

        Ok(Self {
            mode,
            size,
            is_dir,
            read_only,
        })
    }
}

/// Outcome of a stat on a path that may not exist
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatOutcome {
    /// The path exists
    Found(FileInfo),
    /// The device could not stat the path; carries its message
    Missing(String),
}

/// Outcome of a multi-entry operation that keeps going past failures
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkOutcome {
    /// One description per entry that failed
    pub errors: Vec<String>,
}

impl BulkOutcome {
    /// True when no entry failed
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of failed entries
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }
}

/// Report of a single-round-trip wipe of a directory's children
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WipeReport {
    /// Entries removed
    pub deleted_count: u64,
    /// Entries that could not be removed
    pub error_count: u64,
    /// Per-entry failure descriptions
    #[serde(default)]
    pub errors: Vec<String>,
}

impl WipeReport {
    /// Report used when the device never answered
    pub fn failed() -> Self {
        Self {
            deleted_count: 0,
            error_count: 1,
            errors: vec!["wipe_failed".to_string()],
        }
    }
}

/// Report of deleting a file or a whole folder in one round trip
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteAnyReport {
    /// True when nothing failed
    pub ok: bool,
    /// Whether the target was a directory
    pub is_dir: bool,
    /// Entries removed, including the target itself
    pub deleted: u64,
    /// Per-entry failure descriptions
    #[serde(default)]
    pub errors: Vec<String>,
}

impl DeleteAnyReport {
    /// Report used when the device never answered
    pub fn failed() -> Self {
        Self {
            ok: false,
            is_dir: false,
            deleted: 0,
            errors: vec!["delete_any_failed".to_string()],
        }
    }
}

/// Report of a host-driven delete of everything below a path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteAllReport {
    /// Paths removed
    pub deleted: Vec<String>,
    /// Per-path failure descriptions
    pub errors: Vec<String>,
    /// Number of paths removed
    pub deleted_count: usize,
    /// Number of failures
    pub error_count: usize,
}

impl DeleteAllReport {
    /// Record a removed path
    pub fn record_deleted(&mut self, path: impl Into<String>) {
        self.deleted.push(path.into());
        self.deleted_count = self.deleted.len();
    }

    /// Record a failure
    pub fn record_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
        self.error_count = self.errors.len();
    }
}
