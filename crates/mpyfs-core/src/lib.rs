//! # mpyfs Core
//!
//! Core types, protocol constants, and error taxonomy shared by the
//! mpyfs crates.

pub mod constants;
pub mod error;
pub mod timing;
pub mod types;

pub use error::{ConnectionError, Error, ProtocolError, Result, TransportError};
pub use timing::ProtocolTiming;
pub use types::{
    BulkOutcome, DeleteAllReport, DeleteAnyReport, DirEntry, FileInfo, StatOutcome, TreeEntry,
    WipeReport,
};
