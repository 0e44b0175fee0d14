//! Log processing for lokiscope
//!
//! This crate provides level classification, query building, stream merging,
//! backward pagination and the live tail state behind the viewer.

mod cursor;
mod dispatch;
mod level;
mod merge;
mod query;
mod session;
mod store;
mod tail;

pub use cursor::{PaginationCursor, Viewport};
pub use dispatch::FetchDispatcher;
pub use level::classify;
pub use merge::{StreamMerger, merge_streams};
pub use query::{
    LabelFilter, NAMESPACE_LABEL, SavedFilter, SelectorError, build_query, is_label_name,
    parse_selector,
};
pub use session::{
    ApplyOutcome, FetchKind, FetchRequest, FetchResponse, LogSession, SessionConfig,
};
pub use store::{LevelCounts, StreamStore};
pub use tail::LiveTailController;

// Re-export types used in our public API
pub use lokiscope_query::{LogQuery, LogSource, QueryError};
pub use lokiscope_types::{LogBatch, LogEntry, MergedLine, Severity, TailState, Timestamp};
