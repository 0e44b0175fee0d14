use std::time::Duration;

use tracing::{debug, warn};

use lokiscope_query::{LogQuery, QueryError};
use lokiscope_types::{LogBatch, TailState, Timestamp};

use crate::cursor::{PaginationCursor, Viewport};
use crate::merge::StreamMerger;
use crate::query::LabelFilter;
use crate::store::{LevelCounts, StreamStore};
use crate::tail::LiveTailController;

/// Tunables for one viewer session
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Live tail polling period
    pub poll_interval: Duration,
    /// Maximum entries per stream per page
    pub page_limit: usize,
    /// Rows from the bottom of the feed that trigger loading older lines
    pub scroll_margin: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            page_limit: 1000,
            scroll_margin: 5,
        }
    }
}

/// Which trigger produced a fetch
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FetchKind {
    /// First page after the session (or its filter) was created
    Initial,
    /// Older page for backward pagination
    Older,
    /// Freshest page for the live tail
    Tail,
}

/// A fetch the session wants executed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchRequest {
    pub generation: u64,
    pub kind: FetchKind,
    pub query: LogQuery,
}

impl FetchRequest {
    /// Wrap a backend result so it can be routed back to the session
    pub fn respond(&self, result: Result<Vec<LogBatch>, QueryError>) -> FetchResponse {
        FetchResponse {
            generation: self.generation,
            kind: self.kind,
            result,
        }
    }
}

/// Result of an executed [`FetchRequest`]
#[derive(Debug)]
pub struct FetchResponse {
    pub generation: u64,
    pub kind: FetchKind,
    pub result: Result<Vec<LogBatch>, QueryError>,
}

/// What [`LogSession::apply`] did with a response
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Folded into storage
    Applied { kind: FetchKind, added: usize },
    /// Older page came back empty; pagination is finished
    Exhausted,
    /// Fetch failed; storage untouched
    Failed(FetchKind),
    /// Belonged to a replaced session, a kind not in flight, or a tail page that
    /// arrived after the viewer paused
    Stale,
}

/// One viewer session: per-stream storage plus the pagination and live tail
/// state that feed it.
///
/// The session never performs I/O. Each trigger returns the [`FetchRequest`] to
/// run (if any) and results come back through [`LogSession::apply`]. At most one
/// fetch is outstanding at a time; replacing the filter starts a new generation
/// so late results from the previous one are dropped.
#[derive(Debug)]
pub struct LogSession {
    generation: u64,
    config: SessionConfig,
    filter: LabelFilter,
    query: String,
    store: StreamStore,
    cursor: PaginationCursor,
    tail: LiveTailController,
    in_flight: Option<FetchKind>,
    loaded: bool,
    pending_refresh: bool,
    scroll_to_top: bool,
    error: Option<String>,
}

impl LogSession {
    pub fn new(filter: LabelFilter, config: SessionConfig) -> Self {
        let query = filter.to_query();
        let tail = LiveTailController::new(config.poll_interval);
        Self {
            generation: 0,
            config,
            filter,
            query,
            store: StreamStore::new(),
            cursor: PaginationCursor::new(),
            tail,
            in_flight: None,
            loaded: false,
            pending_refresh: false,
            scroll_to_top: false,
            error: None,
        }
    }

    fn request(&mut self, kind: FetchKind, start: Option<Timestamp>) -> FetchRequest {
        self.in_flight = Some(kind);
        let query = LogQuery {
            query: self.query.clone(),
            limit: self.config.page_limit,
            start,
        };
        debug!(generation = self.generation, ?kind, ?start, "issuing fetch");
        FetchRequest {
            generation: self.generation,
            kind,
            query,
        }
    }

    /// The initial load, unless one is already running
    pub fn start(&mut self) -> Option<FetchRequest> {
        if self.in_flight.is_some() {
            return None;
        }
        Some(self.request(FetchKind::Initial, None))
    }

    /// Replace the target: storage, cursor and tail state start over
    pub fn set_filter(&mut self, filter: LabelFilter) -> FetchRequest {
        let generation = self.generation + 1;
        debug!(generation, query = %filter.to_query(), "starting new log session");

        let config = self.config.clone();
        *self = Self::new(filter, config);
        self.generation = generation;
        self.scroll_to_top = true;
        self.request(FetchKind::Initial, None)
    }

    /// Start over with the current filter
    pub fn refresh(&mut self) -> FetchRequest {
        self.set_filter(self.filter.clone())
    }

    /// Request the next older page, if pagination is possible right now
    pub fn load_older(&mut self) -> Option<FetchRequest> {
        if !self.loaded || self.in_flight.is_some() {
            return None;
        }
        let start = self.cursor.begin()?;
        Some(self.request(FetchKind::Older, Some(start)))
    }

    /// Poll timer fired. Skipped (not queued) while paused or busy.
    pub fn poll_tick(&mut self) -> Option<FetchRequest> {
        if !self.tail.should_poll() {
            return None;
        }
        if let Some(kind) = self.in_flight {
            debug!(?kind, "fetch outstanding, skipping poll tick");
            return None;
        }
        Some(self.freshest())
    }

    fn freshest(&mut self) -> FetchRequest {
        if self.loaded {
            self.request(FetchKind::Tail, None)
        } else {
            self.request(FetchKind::Initial, None)
        }
    }

    /// Resume the live tail and jump to the newest line.
    ///
    /// Fetches the freshest page immediately, or as soon as the outstanding
    /// fetch resolves (see [`LogSession::take_pending`]).
    pub fn return_to_top(&mut self) -> Option<FetchRequest> {
        self.tail.return_to_top();
        self.scroll_to_top = true;
        if self.in_flight.is_some() {
            self.pending_refresh = true;
            return None;
        }
        Some(self.freshest())
    }

    /// The rendered viewport moved: pause the tail when away from the newest
    /// line and page in older lines near the bottom
    pub fn on_viewport(&mut self, viewport: Viewport) -> Option<FetchRequest> {
        self.tail.on_viewport(viewport.at_top());
        if viewport.near_bottom(self.config.scroll_margin) {
            self.load_older()
        } else {
            None
        }
    }

    /// Fold a finished fetch into the session
    pub fn apply(&mut self, response: FetchResponse) -> ApplyOutcome {
        if response.generation != self.generation || self.in_flight != Some(response.kind) {
            debug!(
                generation = response.generation,
                kind = ?response.kind,
                "discarding stale fetch result"
            );
            return ApplyOutcome::Stale;
        }
        self.in_flight = None;

        let batches = match response.result {
            Ok(batches) => batches,
            Err(e) => {
                warn!(kind = ?response.kind, error = %e, "log fetch failed");
                if response.kind == FetchKind::Older {
                    self.cursor.fail();
                }
                self.error = Some(e.to_string());
                return ApplyOutcome::Failed(response.kind);
            }
        };
        self.error = None;

        match response.kind {
            FetchKind::Initial => {
                let added = self.store.replace(batches);
                self.loaded = true;
                self.cursor.observe(self.store.oldest_timestamp());
                if added == 0 {
                    self.cursor.finish();
                }
                debug!(added, streams = self.store.stream_count(), "initial page loaded");
                ApplyOutcome::Applied {
                    kind: FetchKind::Initial,
                    added,
                }
            }
            FetchKind::Older => {
                let added = self.store.append_older(batches);
                self.cursor.complete(added, self.store.oldest_timestamp());
                if added == 0 {
                    debug!("no older lines, pagination finished");
                    ApplyOutcome::Exhausted
                } else {
                    ApplyOutcome::Applied {
                        kind: FetchKind::Older,
                        added,
                    }
                }
            }
            FetchKind::Tail => {
                if !self.tail.is_live() {
                    debug!("tail page arrived after pause, dropping");
                    return ApplyOutcome::Stale;
                }
                let added = self.store.prepend_newer(batches);
                self.cursor.observe(self.store.oldest_timestamp());
                ApplyOutcome::Applied {
                    kind: FetchKind::Tail,
                    added,
                }
            }
        }
    }

    /// A deferred return-to-top fetch, once nothing else is outstanding
    pub fn take_pending(&mut self) -> Option<FetchRequest> {
        if !self.pending_refresh || self.in_flight.is_some() {
            return None;
        }
        self.pending_refresh = false;
        Some(self.freshest())
    }

    /// Whether the renderer should jump to the newest line (consumed on read)
    pub fn take_scroll_to_top(&mut self) -> bool {
        std::mem::take(&mut self.scroll_to_top)
    }

    /// Lazy newest-first view of everything loaded
    pub fn lines(&self) -> StreamMerger<'_> {
        self.store.merged()
    }

    pub fn len(&self) -> usize {
        self.store.total_len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn filter(&self) -> &LabelFilter {
        &self.filter
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn store(&self) -> &StreamStore {
        &self.store
    }

    pub fn level_counts(&self) -> LevelCounts {
        self.store.level_counts()
    }

    pub fn is_live(&self) -> bool {
        self.tail.is_live()
    }

    pub fn tail_state(&self) -> TailState {
        self.tail.state()
    }

    pub fn poll_interval(&self) -> Duration {
        self.tail.poll_interval()
    }

    /// Oldest loaded timestamp
    pub fn cursor(&self) -> Option<Timestamp> {
        self.cursor.oldest()
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor.is_done()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn in_flight(&self) -> Option<FetchKind> {
        self.in_flight
    }

    /// Last fetch failure, shown as an inline notice
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lokiscope_types::{LogEntry, LogStreamLabels};

    fn batch(pod: &str, timestamps: &[Timestamp]) -> LogBatch {
        LogBatch::new(
            LogStreamLabels::new().with("pod", pod),
            timestamps
                .iter()
                .map(|&ts| LogEntry::new(ts, format!("{pod}@{ts}")))
                .collect(),
        )
    }

    fn session() -> LogSession {
        LogSession::new(LabelFilter::new("prod"), SessionConfig::default())
    }

    fn timestamps(session: &LogSession) -> Vec<Timestamp> {
        session.lines().map(|l| l.entry.timestamp).collect()
    }

    fn failure() -> QueryError {
        QueryError::Status {
            status: 502,
            body: "bad gateway".to_string(),
        }
    }

    /// Session with the first page already loaded
    fn loaded(batches: Vec<LogBatch>) -> LogSession {
        let mut s = session();
        let req = s.start().unwrap();
        s.apply(req.respond(Ok(batches)));
        s
    }

    #[test]
    fn test_initial_load_merges_streams() {
        let mut s = session();
        let req = s.start().unwrap();
        assert_eq!(req.kind, FetchKind::Initial);
        assert_eq!(req.query.query, r#"{namespace="prod"}"#);
        assert_eq!(req.query.start, None);
        assert_eq!(req.query.limit, 1000);

        let outcome = s.apply(req.respond(Ok(vec![
            batch("a", &[100, 90, 80]),
            batch("b", &[95, 70]),
            batch("c", &[60]),
        ])));
        assert_eq!(
            outcome,
            ApplyOutcome::Applied {
                kind: FetchKind::Initial,
                added: 6
            }
        );
        assert_eq!(timestamps(&s), vec![100, 95, 90, 80, 70, 60]);
        assert_eq!(s.cursor(), Some(60));
        assert!(s.is_live());
    }

    #[test]
    fn test_initial_load_gates_other_fetches() {
        let mut s = session();
        let _initial = s.start().unwrap();
        assert!(s.load_older().is_none());
        assert!(s.poll_tick().is_none());
        assert!(s.start().is_none());
    }

    #[test]
    fn test_load_older_uses_exclusive_cursor() {
        let mut s = loaded(vec![batch("a", &[100, 90]), batch("b", &[95])]);
        let req = s.load_older().unwrap();
        assert_eq!(req.kind, FetchKind::Older);
        assert_eq!(req.query.start, Some(90));

        // second trigger while in flight is suppressed
        assert!(s.load_older().is_none());

        s.apply(req.respond(Ok(vec![batch("a", &[85, 50]), batch("b", &[60])])));
        assert_eq!(timestamps(&s), vec![100, 95, 90, 85, 60, 50]);
        assert_eq!(s.cursor(), Some(50));
        assert_eq!(s.load_older().unwrap().query.start, Some(50));
    }

    #[test]
    fn test_pagination_exhaustion_until_new_filter() {
        let mut s = loaded(vec![batch("a", &[100])]);
        let req = s.load_older().unwrap();
        assert_eq!(s.apply(req.respond(Ok(vec![]))), ApplyOutcome::Exhausted);
        assert!(s.is_exhausted());

        assert!(s.load_older().is_none());
        assert!(s.on_viewport(Viewport::new(0, 10, 1)).is_none());

        let initial = s.set_filter(LabelFilter::new("prod").with_label("pod", "a"));
        s.apply(initial.respond(Ok(vec![batch("a", &[100, 40])])));
        assert!(!s.is_exhausted());
        assert_eq!(s.load_older().unwrap().query.start, Some(40));
    }

    #[test]
    fn test_failed_page_leaves_state_and_retries() {
        let mut s = loaded(vec![batch("a", &[100, 90])]);
        let req = s.load_older().unwrap();
        assert_eq!(
            s.apply(req.respond(Err(failure()))),
            ApplyOutcome::Failed(FetchKind::Older)
        );

        assert_eq!(timestamps(&s), vec![100, 90]);
        assert!(!s.is_exhausted());
        assert!(s.error().is_some());

        let retry = s.load_older().unwrap();
        assert_eq!(retry.query.start, Some(90));
        s.apply(retry.respond(Ok(vec![batch("a", &[80])])));
        assert!(s.error().is_none());
    }

    #[test]
    fn test_empty_initial_load_is_exhausted() {
        let mut s = loaded(vec![]);
        assert!(s.is_loaded());
        assert!(s.is_exhausted());
        assert!(s.load_older().is_none());
        assert!(s.is_empty());
    }

    #[test]
    fn test_poll_prepends_new_lines() {
        let mut s = loaded(vec![batch("a", &[100, 90])]);
        let tick = s.poll_tick().unwrap();
        assert_eq!(tick.kind, FetchKind::Tail);
        assert_eq!(tick.query.start, None);

        s.apply(tick.respond(Ok(vec![batch("a", &[120, 100, 90]), batch("b", &[110])])));
        assert_eq!(timestamps(&s), vec![120, 110, 100, 90]);
        assert_eq!(s.cursor(), Some(90));
    }

    #[test]
    fn test_poll_skipped_while_fetch_outstanding() {
        let mut s = loaded(vec![batch("a", &[100, 90])]);
        let _older = s.load_older().unwrap();
        assert!(s.poll_tick().is_none());
    }

    #[test]
    fn test_tail_backpressure() {
        let mut s = loaded(vec![batch("a", &[100, 90, 80, 70, 60, 50, 40, 30, 20, 10])]);

        assert!(s.on_viewport(Viewport::new(1, 2, 10)).is_none());
        assert!(!s.is_live());
        for _ in 0..3 {
            assert!(s.poll_tick().is_none());
        }

        let fetch = s.return_to_top().unwrap();
        assert!(s.is_live());
        assert!(s.take_scroll_to_top());
        assert!(!s.take_scroll_to_top());
        assert_eq!(fetch.kind, FetchKind::Tail);

        s.apply(fetch.respond(Ok(vec![batch("b", &[105])])));
        assert_eq!(timestamps(&s)[..2], [105, 100]);
    }

    #[test]
    fn test_return_to_top_waits_for_outstanding_fetch() {
        let mut s = loaded(vec![batch("a", &[100, 90])]);
        let older = s.on_viewport(Viewport::new(1, 5, 2)).unwrap();
        assert!(!s.is_live());

        assert!(s.return_to_top().is_none());
        assert!(s.take_pending().is_none());

        s.apply(older.respond(Ok(vec![batch("a", &[80])])));
        let pending = s.take_pending().unwrap();
        assert_eq!(pending.kind, FetchKind::Tail);
        assert!(s.take_pending().is_none());
    }

    #[test]
    fn test_tail_page_after_pause_is_dropped() {
        let mut s = loaded(vec![batch("a", &[100, 90])]);
        let tick = s.poll_tick().unwrap();
        s.on_viewport(Viewport::new(1, 1, 50));

        assert_eq!(
            s.apply(tick.respond(Ok(vec![batch("a", &[130])]))),
            ApplyOutcome::Stale
        );
        assert_eq!(timestamps(&s), vec![100, 90]);
        assert!(s.in_flight().is_none());
    }

    #[test]
    fn test_results_from_replaced_session_are_discarded() {
        let mut s = loaded(vec![batch("a", &[100])]);
        let old_tick = s.poll_tick().unwrap();

        let initial = s.set_filter(LabelFilter::new("staging"));
        assert_eq!(initial.generation, old_tick.generation + 1);
        assert!(s.is_live());
        assert!(s.is_empty());

        assert_eq!(
            s.apply(old_tick.respond(Ok(vec![batch("a", &[200])]))),
            ApplyOutcome::Stale
        );
        s.apply(initial.respond(Ok(vec![batch("s", &[50])])));
        assert_eq!(timestamps(&s), vec![50]);
        assert_eq!(s.query(), r#"{namespace="staging"}"#);
    }

    #[test]
    fn test_failed_initial_load_retried_by_poll() {
        let mut s = session();
        let req = s.start().unwrap();
        s.apply(req.respond(Err(failure())));
        assert!(!s.is_loaded());
        assert!(s.load_older().is_none());

        let retry = s.poll_tick().unwrap();
        assert_eq!(retry.kind, FetchKind::Initial);
    }

    #[test]
    fn test_refresh_keeps_filter() {
        let filter = LabelFilter::new("prod").with_search("timeout");
        let mut s = LogSession::new(filter.clone(), SessionConfig::default());
        let req = s.refresh();
        assert_eq!(req.generation, 1);
        assert_eq!(s.filter(), &filter);
        assert_eq!(req.query.query, r#"{namespace="prod"} |~ "timeout""#);
    }

    #[test]
    fn test_merge_reconstruction_is_stable() {
        let s = loaded(vec![batch("a", &[5, 5, 3]), batch("b", &[5, 4])]);
        let first: Vec<_> = s.lines().map(|l| l.entry.text.clone()).collect();
        let second: Vec<_> = s.lines().map(|l| l.entry.text.clone()).collect();
        assert_eq!(first, second);
    }
}
