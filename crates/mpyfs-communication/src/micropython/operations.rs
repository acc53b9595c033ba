//! Typed filesystem operations
//!
//! Every call is one complete device operation through [`DeviceClient`].
//! Best-effort operations treat a missing payload as an empty or default
//! result; operations whose result is mandatory turn it into an error.

use super::snippets::SnippetBuilder;
use crate::communication::serial::{list_ports, SerialPortInfo};
use crate::raw_repl::{Decoded, DeviceClient, Snippet};
use mpyfs_core::{
    BulkOutcome, DeleteAllReport, DeleteAnyReport, DirEntry, Error, FileInfo, ProtocolError,
    Result, StatOutcome, TreeEntry, WipeReport,
};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

/// Suffix of the staging file used by [`BoardFs::upload_replacing`]
pub const STAGING_SUFFIX: &str = ".new";

fn corrupt(reason: impl Into<String>) -> Error {
    ProtocolError::CorruptPayload {
        reason: reason.into(),
    }
    .into()
}

fn unexpected(decoded: &Decoded) -> Error {
    corrupt(format!("unexpected payload shape: {:?}", decoded))
}

/// Split a device status into success or its `error:` message
fn device_status(operation: &str, status: String) -> Result<String> {
    match status.strip_prefix("error:") {
        Some(message) => Err(ProtocolError::DeviceReported {
            operation: operation.to_string(),
            message: message.to_string(),
        }
        .into()),
        None => Ok(status),
    }
}

/// Filesystem of one board, reached through a [`DeviceClient`]
#[derive(Clone)]
pub struct BoardFs {
    client: DeviceClient,
    snippets: SnippetBuilder,
}

impl BoardFs {
    /// Create a filesystem handle over `client`
    pub fn new(client: DeviceClient) -> Self {
        let snippets = SnippetBuilder::new(client.codec());
        Self { client, snippets }
    }

    /// Underlying device client
    pub fn client(&self) -> &DeviceClient {
        &self.client
    }

    /// Serial ports present on the host
    pub fn list_ports(all: bool) -> Result<Vec<SerialPortInfo>> {
        list_ports(all)
    }

    fn marker_timeout(&self) -> Error {
        ProtocolError::Timeout {
            timeout_ms: self.client.timing().marker_deadline.as_millis() as u64,
        }
        .into()
    }

    fn missing_confirmation(operation: &str) -> Error {
        ProtocolError::MissingConfirmation {
            operation: operation.to_string(),
        }
        .into()
    }

    /// Status token, or `None` when the device printed no frame
    fn status(&self, snippet: &Snippet) -> Result<Option<String>> {
        match self.client.run(snippet)? {
            Decoded::Status(status) => Ok(Some(status)),
            Decoded::NoPayload => Ok(None),
            other => Err(unexpected(&other)),
        }
    }

    /// Status token that must be present
    fn confirmed(&self, operation: &str, snippet: &Snippet) -> Result<String> {
        let status = self
            .status(snippet)?
            .ok_or_else(|| Self::missing_confirmation(operation))?;
        device_status(operation, status)
    }

    /// Best-effort status: a missing frame is logged and ignored
    fn best_effort(&self, operation: &str, path: &str, snippet: &Snippet) -> Result<()> {
        if self.status(snippet)?.is_none() {
            tracing::warn!("No confirmation for {} {}", operation, path);
        }
        Ok(())
    }

    /// JSON document deserialized into `T`, or `None` without a frame
    fn json<T: DeserializeOwned>(&self, snippet: &Snippet) -> Result<Option<T>> {
        match self.client.run(snippet)? {
            Decoded::Json(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| corrupt(format!("unexpected JSON document: {}", e))),
            Decoded::NoPayload => Ok(None),
            other => Err(unexpected(&other)),
        }
    }

    /// Names in a directory; empty when the directory cannot be listed
    pub fn list_names(&self, path: &str) -> Result<Vec<String>> {
        Ok(self
            .json(&self.snippets.list_names(path))?
            .unwrap_or_default())
    }

    /// Names with directory flags; empty when the directory cannot be listed
    pub fn list_entries(&self, path: &str) -> Result<Vec<DirEntry>> {
        match self.client.run(&self.snippets.list_entries(path))? {
            Decoded::Entries(entries) => Ok(entries),
            Decoded::NoPayload => Ok(Vec::new()),
            other => Err(unexpected(&other)),
        }
    }

    /// Create a directory; existing directories are not an error
    pub fn mkdir(&self, path: &str) -> Result<()> {
        self.best_effort("mkdir", path, &self.snippets.mkdir(path))
    }

    /// Remove a file; missing files are not an error
    pub fn remove(&self, path: &str) -> Result<()> {
        self.best_effort("remove", path, &self.snippets.remove(path))
    }

    /// Remove everything below `path`, keeping `path` itself
    pub fn clear_tree(&self, path: &str) -> Result<()> {
        self.best_effort("clear", path, &self.snippets.clear_tree(path))
    }

    /// Remove a file and verify it is gone
    pub fn delete_file(&self, path: &str) -> Result<()> {
        self.confirmed("delete file", &self.snippets.delete_file(path))?;
        Ok(())
    }

    /// Remove a directory and its content
    ///
    /// Per-entry failures are collected rather than aborting the walk.
    pub fn delete_folder_recursive(&self, path: &str) -> Result<BulkOutcome> {
        let status = self.confirmed(
            "delete folder",
            &self.snippets.delete_folder_recursive(path),
        )?;

        match status.strip_prefix("errors:") {
            Some(list) => Ok(BulkOutcome {
                errors: list
                    .split(';')
                    .filter(|e| !e.is_empty())
                    .map(str::to_string)
                    .collect(),
            }),
            None => Ok(BulkOutcome::default()),
        }
    }

    /// File content from the device
    pub fn download(&self, path: &str) -> Result<Vec<u8>> {
        match self.client.run(&self.snippets.download(path)) {
            Ok(Decoded::Binary(data)) => Ok(data),
            Ok(Decoded::NoPayload) => Err(self.marker_timeout()),
            Ok(other) => Err(unexpected(&other)),
            Err(Error::Protocol(ProtocolError::DeviceReported { message, .. })) => {
                Err(ProtocolError::DeviceReported {
                    operation: "download".to_string(),
                    message,
                }
                .into())
            }
            Err(e) => Err(e),
        }
    }

    /// Copy a device file to a local path, returning the byte count
    pub fn download_to(&self, path: &str, local: &Path) -> Result<usize> {
        let data = self.download(path)?;
        fs::write(local, &data)?;
        tracing::info!("Copied {} ({} bytes) to {}", path, data.len(), local.display());
        Ok(data.len())
    }

    /// Write `data` to `dst`, creating missing parent directories
    pub fn upload(&self, data: &[u8], dst: &str) -> Result<()> {
        self.confirmed("upload", &self.snippets.upload(data, dst))?;
        Ok(())
    }

    /// Copy a local file to the device
    pub fn upload_file(&self, local: &Path, dst: &str) -> Result<usize> {
        let data = fs::read(local)?;
        self.upload(&data, dst)?;
        Ok(data.len())
    }

    /// Upload to a staging file, then move it over `dst`
    ///
    /// `dst` keeps its old content if the transfer itself fails.
    pub fn upload_replacing(&self, data: &[u8], dst: &str) -> Result<()> {
        let staging = format!("{}{}", dst, STAGING_SUFFIX);
        self.upload(data, &staging)?;
        self.confirmed("replace", &self.snippets.replace(&staging, dst))?;
        Ok(())
    }

    /// Rename or move a file or directory
    pub fn rename(&self, src: &str, dst: &str) -> Result<()> {
        self.confirmed("rename", &self.snippets.rename(src, dst))?;
        Ok(())
    }

    /// Stat a path; a path the device cannot stat is `Missing`
    pub fn stat(&self, path: &str) -> Result<StatOutcome> {
        let status = self
            .status(&self.snippets.stat(path))?
            .ok_or_else(|| self.marker_timeout())?;

        if let Some(message) = status.strip_prefix("error:") {
            return Ok(StatOutcome::Missing(message.to_string()));
        }
        status
            .parse::<FileInfo>()
            .map(StatOutcome::Found)
            .map_err(corrupt)
    }

    /// Whether a path exists; `false` when the device does not answer
    pub fn exists(&self, path: &str) -> Result<bool> {
        match self.status(&self.snippets.exists(path))? {
            Some(status) => match status.as_str() {
                "exists" => Ok(true),
                "not_exists" => Ok(false),
                other => Err(corrupt(format!("unexpected existence status '{}'", other))),
            },
            None => {
                tracing::warn!("No existence answer for {}", path);
                Ok(false)
            }
        }
    }

    /// Every entry below `path`, parents before children
    pub fn tree(&self, path: &str) -> Result<Vec<TreeEntry>> {
        Ok(self.json(&self.snippets.tree(path))?.unwrap_or_default())
    }

    /// Delete all children of `root` in one round trip
    pub fn wipe_path(&self, root: &str) -> Result<WipeReport> {
        match self.json(&self.snippets.wipe_path(root))? {
            Some(report) => Ok(report),
            None => {
                tracing::warn!("No wipe report for {}", root);
                Ok(WipeReport::failed())
            }
        }
    }

    /// Delete a file, or a directory with everything in it
    pub fn delete_any(&self, path: &str) -> Result<DeleteAnyReport> {
        match self.json(&self.snippets.delete_any(path))? {
            Some(report) => Ok(report),
            None => {
                tracing::warn!("No delete report for {}", path);
                Ok(DeleteAnyReport::failed())
            }
        }
    }

    /// Delete everything below `root`, one device operation per entry
    ///
    /// Files go first, then directories deepest-first. Per-entry failures
    /// are recorded and the walk continues; losing the port aborts it.
    pub fn delete_all_in_path(&self, root: &str) -> Result<DeleteAllReport> {
        let entries = self.tree(root)?;
        let mut report = DeleteAllReport::default();

        let (mut dirs, files): (Vec<TreeEntry>, Vec<TreeEntry>) =
            entries.into_iter().partition(|e| e.is_dir);
        dirs.sort_by_key(|e| std::cmp::Reverse(e.depth()));

        for file in &files {
            match self.delete_file(&file.path) {
                Ok(()) => report.record_deleted(&file.path),
                Err(e) if e.is_connection_error() || e.is_transient() => return Err(e),
                Err(e) => report.record_error(format!("File {}: {}", file.path, e)),
            }
        }

        for dir in &dirs {
            match self.delete_folder_recursive(&dir.path) {
                Ok(outcome) if outcome.is_clean() => report.record_deleted(&dir.path),
                Ok(outcome) => report.record_error(format!(
                    "Directory {}: {}",
                    dir.path,
                    outcome.errors.join("; ")
                )),
                Err(e) if e.is_connection_error() || e.is_transient() => return Err(e),
                Err(e) => report.record_error(format!("Directory {}: {}", dir.path, e)),
            }
        }

        tracing::info!(
            "Deleted {} entries below {} with {} errors",
            report.deleted_count,
            root,
            report.error_count
        );
        Ok(report)
    }

    /// Run a program and return whatever it printed in the output window
    pub fn run_program(&self, code: &str) -> Result<Vec<u8>> {
        match self.client.run(&self.snippets.program(code))? {
            Decoded::Output(bytes) => Ok(bytes),
            other => Err(unexpected(&other)),
        }
    }

    /// Soft-reset the board
    pub fn soft_reset(&self) -> Result<()> {
        self.client.soft_reset()
    }
}
