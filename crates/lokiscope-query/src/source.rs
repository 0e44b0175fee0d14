use std::future::Future;

use lokiscope_types::{LogBatch, Timestamp};

use crate::QueryError;

/// One page request against the backend
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogQuery {
    /// LogQL selector, e.g. `{namespace="prod"} |~ "timeout"`
    pub query: String,
    /// Maximum entries per returned batch
    pub limit: usize,
    /// Exclusive upper bound; only entries strictly older are returned
    pub start: Option<Timestamp>,
}

impl LogQuery {
    /// Freshest page, no cursor
    pub fn latest(query: impl Into<String>, limit: usize) -> Self {
        Self {
            query: query.into(),
            limit,
            start: None,
        }
    }

    /// Page of entries older than `start`
    pub fn before(query: impl Into<String>, limit: usize, start: Timestamp) -> Self {
        Self {
            query: query.into(),
            limit,
            start: Some(start),
        }
    }
}

/// Anything that can answer a [`LogQuery`] with one batch per matched stream.
///
/// Each returned batch must be sorted newest first.
pub trait LogSource: Clone + Send + Sync + 'static {
    fn query(
        &self,
        query: &LogQuery,
    ) -> impl Future<Output = Result<Vec<LogBatch>, QueryError>> + Send;
}
