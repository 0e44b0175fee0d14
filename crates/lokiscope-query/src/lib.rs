//! Log backend client for lokiscope
//!
//! This crate is the query-execution side of the viewer: it turns a LogQL
//! selector into per-stream batches, and knows the backend's URL layout.

mod client;
mod download;
mod error;
mod source;

pub use client::{LokiClient, decode_streams};
pub use download::download_url;
pub use error::QueryError;
pub use source::{LogQuery, LogSource};

// Re-export types that are used in our public API
pub use lokiscope_types::{LogBatch, LogEntry, LogStreamLabels, Timestamp};
