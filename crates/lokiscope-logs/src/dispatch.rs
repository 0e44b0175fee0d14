use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use lokiscope_query::LogSource;

use crate::session::{FetchRequest, FetchResponse};

/// Runs session fetches against a [`LogSource`] in background tasks.
///
/// Results are delivered on the channel given at construction, tagged with the
/// request they answer. [`FetchDispatcher::reset`] cancels everything still
/// running, which is what a filter change wants.
pub struct FetchDispatcher<S: LogSource> {
    source: S,
    tx: mpsc::UnboundedSender<FetchResponse>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl<S: LogSource> FetchDispatcher<S> {
    pub fn new(source: S, tx: mpsc::UnboundedSender<FetchResponse>) -> Self {
        Self {
            source,
            tx,
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        }
    }

    /// Spawn a task executing `request`
    pub fn dispatch(&mut self, request: FetchRequest) {
        self.tasks.retain(|t| !t.is_finished());

        let source = self.source.clone();
        let tx = self.tx.clone();
        let cancel = self.cancel.clone();

        let task = tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(generation = request.generation, kind = ?request.kind, "fetch cancelled");
                }

                result = source.query(&request.query) => {
                    // Receiver gone means the viewer is shutting down
                    let _ = tx.send(request.respond(result));
                }
            }
        });
        self.tasks.push(task);
    }

    /// Cancel all running fetches
    pub fn reset(&mut self) {
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.cancel = CancellationToken::new();
    }

    /// Number of fetches still running
    pub fn active_count(&self) -> usize {
        self.tasks.iter().filter(|t| !t.is_finished()).count()
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

impl<S: LogSource> Drop for FetchDispatcher<S> {
    fn drop(&mut self) {
        self.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::future::Future;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use lokiscope_query::{LogQuery, QueryError};
    use lokiscope_types::{LogBatch, LogEntry, LogStreamLabels, Timestamp};

    use crate::cursor::Viewport;
    use crate::query::LabelFilter;
    use crate::session::{ApplyOutcome, FetchKind, LogSession, SessionConfig};

    /// Scripted backend: answers each query with the next page, or an empty
    /// page once the script runs out
    #[derive(Clone, Default)]
    struct ScriptedSource {
        pages: Arc<Mutex<VecDeque<Option<Vec<LogBatch>>>>>,
        queries: Arc<Mutex<Vec<LogQuery>>>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedSource {
        fn with_pages(pages: Vec<Option<Vec<LogBatch>>>) -> Self {
            Self {
                pages: Arc::new(Mutex::new(pages.into())),
                ..Self::default()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn queries(&self) -> Vec<LogQuery> {
            self.queries.lock().unwrap().clone()
        }
    }

    impl LogSource for ScriptedSource {
        fn query(
            &self,
            query: &LogQuery,
        ) -> impl Future<Output = Result<Vec<LogBatch>, QueryError>> + Send {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.queries.lock().unwrap().push(query.clone());
            // `None` scripts a failure
            let page = self.pages.lock().unwrap().pop_front().unwrap_or(Some(Vec::new()));
            async move {
                page.ok_or(QueryError::Status {
                    status: 503,
                    body: "unavailable".to_string(),
                })
            }
        }
    }

    /// Backend that never answers
    #[derive(Clone)]
    struct HangingSource;

    impl LogSource for HangingSource {
        fn query(
            &self,
            _query: &LogQuery,
        ) -> impl Future<Output = Result<Vec<LogBatch>, QueryError>> + Send {
            std::future::pending()
        }
    }

    fn batch(pod: &str, timestamps: &[Timestamp]) -> LogBatch {
        LogBatch::new(
            LogStreamLabels::new().with("pod", pod),
            timestamps
                .iter()
                .map(|&ts| LogEntry::new(ts, format!("{pod}@{ts}")))
                .collect(),
        )
    }

    async fn roundtrip(
        session: &mut LogSession,
        dispatcher: &mut FetchDispatcher<ScriptedSource>,
        rx: &mut mpsc::UnboundedReceiver<FetchResponse>,
        request: FetchRequest,
    ) -> ApplyOutcome {
        dispatcher.dispatch(request);
        let response = rx.recv().await.unwrap();
        session.apply(response)
    }

    #[tokio::test]
    async fn test_three_streams_end_to_end() {
        let source = ScriptedSource::with_pages(vec![
            Some(vec![
                batch("a", &[100, 90, 80]),
                batch("b", &[95, 70]),
                batch("c", &[60]),
            ]),
            Some(vec![batch("a", &[50]), batch("c", &[55])]),
            Some(vec![]),
        ]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut dispatcher = FetchDispatcher::new(source.clone(), tx);
        let mut session = LogSession::new(LabelFilter::new("prod"), SessionConfig::default());

        let initial = session.start().unwrap();
        roundtrip(&mut session, &mut dispatcher, &mut rx, initial).await;
        let timestamps: Vec<_> = session.lines().map(|l| l.entry.timestamp).collect();
        assert_eq!(timestamps, vec![100, 95, 90, 80, 70, 60]);

        let older = session.on_viewport(Viewport::new(0, 10, 6)).unwrap();
        roundtrip(&mut session, &mut dispatcher, &mut rx, older).await;
        let older = session.load_older().unwrap();
        let outcome = roundtrip(&mut session, &mut dispatcher, &mut rx, older).await;
        assert_eq!(outcome, ApplyOutcome::Exhausted);

        // exhausted: no more backend traffic from pagination triggers
        assert!(session.load_older().is_none());
        assert_eq!(source.calls(), 3);

        let starts: Vec<_> = source.queries().iter().map(|q| q.start).collect();
        assert_eq!(starts, vec![None, Some(60), Some(50)]);
        assert_eq!(session.len(), 8);
    }

    #[tokio::test]
    async fn test_paused_tail_does_not_poll() {
        let source = ScriptedSource::with_pages(vec![
            Some(vec![batch("a", &(1..=40).rev().collect::<Vec<Timestamp>>())]),
            Some(vec![batch("a", &[42, 41, 40])]),
        ]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut dispatcher = FetchDispatcher::new(source.clone(), tx);
        let mut session = LogSession::new(LabelFilter::new("prod"), SessionConfig::default());

        let initial = session.start().unwrap();
        roundtrip(&mut session, &mut dispatcher, &mut rx, initial).await;

        assert!(session.on_viewport(Viewport::new(10, 10, 40)).is_none());
        for _ in 0..5 {
            assert!(session.poll_tick().is_none());
        }
        assert_eq!(source.calls(), 1);

        let fetch = session.return_to_top().unwrap();
        roundtrip(&mut session, &mut dispatcher, &mut rx, fetch).await;
        assert_eq!(source.calls(), 2);
        assert!(session.is_live());

        let newest: Vec<_> = session.lines().take(3).map(|l| l.entry.timestamp).collect();
        assert_eq!(newest, vec![42, 41, 40]);
    }

    #[tokio::test]
    async fn test_failure_keeps_stored_lines() {
        let source = ScriptedSource::with_pages(vec![Some(vec![batch("a", &[10, 9])]), None]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut dispatcher = FetchDispatcher::new(source, tx);
        let mut session = LogSession::new(LabelFilter::new("prod"), SessionConfig::default());

        let initial = session.start().unwrap();
        roundtrip(&mut session, &mut dispatcher, &mut rx, initial).await;
        let older = session.load_older().unwrap();
        let outcome = roundtrip(&mut session, &mut dispatcher, &mut rx, older).await;

        assert_eq!(outcome, ApplyOutcome::Failed(FetchKind::Older));
        assert_eq!(session.len(), 2);
        assert!(!session.is_exhausted());
        assert!(session.error().is_some_and(|e| e.contains("503")));
    }

    #[tokio::test]
    async fn test_stale_generation_is_ignored() {
        let source = ScriptedSource::with_pages(vec![
            Some(vec![batch("old", &[500])]),
            Some(vec![batch("new", &[5])]),
        ]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut dispatcher = FetchDispatcher::new(source, tx);
        let mut session = LogSession::new(LabelFilter::new("prod"), SessionConfig::default());

        let first = session.start().unwrap();
        let second = session.set_filter(LabelFilter::new("staging"));
        dispatcher.dispatch(first);
        let stale = rx.recv().await.unwrap();
        assert_eq!(session.apply(stale), ApplyOutcome::Stale);

        dispatcher.dispatch(second);
        let fresh = rx.recv().await.unwrap();
        assert!(matches!(session.apply(fresh), ApplyOutcome::Applied { .. }));
        let pods: Vec<_> = session
            .lines()
            .filter_map(|l| l.source_labels.get("pod"))
            .collect();
        assert_eq!(pods, vec!["new"]);
    }

    #[tokio::test]
    async fn test_reset_cancels_running_fetches() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut dispatcher = FetchDispatcher::new(HangingSource, tx);
        let mut session = LogSession::new(LabelFilter::new("prod"), SessionConfig::default());

        dispatcher.dispatch(session.start().unwrap());
        tokio::task::yield_now().await;
        assert_eq!(dispatcher.active_count(), 1);

        dispatcher.reset();
        assert_eq!(dispatcher.active_count(), 0);

        let waited = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(waited.is_err());
    }
}
