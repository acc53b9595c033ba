//! MicroPython filesystem support
//!
//! [`SnippetBuilder`] produces the device-side programs; [`BoardFs`] runs
//! them through a [`crate::DeviceClient`] and turns payloads into typed
//! results.

pub mod operations;
pub mod snippets;

pub use operations::{BoardFs, STAGING_SUFFIX};
pub use snippets::{py_str, SnippetBuilder};
