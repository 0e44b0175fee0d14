use std::collections::HashMap;

use tracing::debug;

use lokiscope_types::{LogBatch, LogStreamLabels, Severity, Timestamp};

use crate::merge::{StreamMerger, merge_streams};

/// Per-stream storage for one viewer session.
///
/// One batch per distinct label set, kept in first-arrival order. Older pages
/// are appended to the tail of a batch, live-tail pages are prepended; stored
/// entries are never reordered.
#[derive(Clone, Debug, Default)]
pub struct StreamStore {
    batches: Vec<LogBatch>,
    index: HashMap<LogStreamLabels, usize>,
}

impl StreamStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything and store a fresh first page
    pub fn replace(&mut self, batches: Vec<LogBatch>) -> usize {
        self.clear();
        self.append_older(batches)
    }

    /// Append a pagination page. Only entries strictly older than a stream's
    /// current oldest entry are kept. Returns the number of entries added.
    pub fn append_older(&mut self, batches: Vec<LogBatch>) -> usize {
        let mut added = 0;
        for batch in batches {
            if batch.is_empty() {
                continue;
            }
            let slot = self.slot(batch.labels);
            let boundary = slot.oldest();
            let before = slot.entries.len();

            slot.entries.extend(
                batch
                    .entries
                    .into_iter()
                    .skip_while(|e| boundary.is_some_and(|b| e.timestamp >= b)),
            );
            added += slot.entries.len() - before;
        }
        added
    }

    /// Prepend a live-tail page. Entries newer than a stream's newest entry are
    /// kept, plus same-timestamp lines not already stored. Returns the number of
    /// entries added.
    pub fn prepend_newer(&mut self, batches: Vec<LogBatch>) -> usize {
        let mut added = 0;
        for batch in batches {
            if batch.is_empty() {
                continue;
            }
            let slot = self.slot(batch.labels);
            let Some(newest) = slot.newest() else {
                added += batch.entries.len();
                slot.entries = batch.entries;
                continue;
            };

            if batch.entries.last().is_some_and(|e| e.timestamp > newest) {
                debug!(stream = %slot.labels, "tail page does not overlap stored lines");
            }

            let mut fresh: Vec<_> = Vec::new();
            for entry in batch.entries {
                if entry.timestamp > newest {
                    fresh.push(entry);
                } else if entry.timestamp == newest {
                    let seen = slot
                        .entries
                        .iter()
                        .take_while(|e| e.timestamp == newest)
                        .any(|e| e.text == entry.text);
                    if !seen {
                        fresh.push(entry);
                    }
                } else {
                    break;
                }
            }

            if !fresh.is_empty() {
                added += fresh.len();
                fresh.append(&mut slot.entries);
                slot.entries = fresh;
            }
        }
        added
    }

    fn slot(&mut self, labels: LogStreamLabels) -> &mut LogBatch {
        let idx = match self.index.get(&labels) {
            Some(&idx) => idx,
            None => {
                let idx = self.batches.len();
                self.index.insert(labels.clone(), idx);
                self.batches.push(LogBatch::new(labels, Vec::new()));
                idx
            }
        };
        &mut self.batches[idx]
    }

    /// Lazy newest-first view over everything stored
    pub fn merged(&self) -> StreamMerger<'_> {
        merge_streams(&self.batches)
    }

    pub fn batches(&self) -> &[LogBatch] {
        &self.batches
    }

    pub fn stream_count(&self) -> usize {
        self.batches.len()
    }

    pub fn total_len(&self) -> usize {
        self.batches.iter().map(LogBatch::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.iter().all(LogBatch::is_empty)
    }

    /// Oldest timestamp held by any stream
    pub fn oldest_timestamp(&self) -> Option<Timestamp> {
        self.batches.iter().filter_map(LogBatch::oldest).min()
    }

    /// Newest timestamp held by any stream
    pub fn newest_timestamp(&self) -> Option<Timestamp> {
        self.batches.iter().filter_map(LogBatch::newest).max()
    }

    /// Get entry count per severity
    pub fn level_counts(&self) -> LevelCounts {
        let mut counts = LevelCounts::default();
        for line in self.merged() {
            counts.record(line.level);
        }
        counts
    }

    pub fn clear(&mut self) {
        self.batches.clear();
        self.index.clear();
    }
}

/// Counts per severity
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LevelCounts {
    pub fatal: usize,
    pub error: usize,
    pub warn: usize,
    pub info: usize,
    pub other: usize,
}

impl LevelCounts {
    pub fn record(&mut self, level: Severity) {
        match level {
            Severity::Fatal => self.fatal += 1,
            Severity::Error => self.error += 1,
            Severity::Warn => self.warn += 1,
            Severity::Info => self.info += 1,
            Severity::Other => self.other += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.fatal + self.error + self.warn + self.info + self.other
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lokiscope_types::LogEntry;

    fn batch(pod: &str, entries: &[(Timestamp, &str)]) -> LogBatch {
        LogBatch::new(
            LogStreamLabels::new().with("pod", pod),
            entries
                .iter()
                .map(|&(ts, text)| LogEntry::new(ts, text))
                .collect(),
        )
    }

    fn timestamps(store: &StreamStore, stream: usize) -> Vec<Timestamp> {
        store.batches()[stream]
            .entries
            .iter()
            .map(|e| e.timestamp)
            .collect()
    }

    #[test]
    fn test_replace_resets_streams() {
        let mut store = StreamStore::new();
        store.replace(vec![batch("a", &[(5, "x")]), batch("b", &[(4, "y")])]);
        assert_eq!(store.stream_count(), 2);

        let added = store.replace(vec![batch("c", &[(9, "z"), (8, "w")])]);
        assert_eq!(added, 2);
        assert_eq!(store.stream_count(), 1);
        assert_eq!(store.batches()[0].labels.get("pod"), Some("c"));
    }

    #[test]
    fn test_append_older_keeps_only_older_entries() {
        let mut store = StreamStore::new();
        store.replace(vec![batch("a", &[(10, "j"), (8, "h")])]);

        let added = store.append_older(vec![
            batch("a", &[(8, "h"), (6, "f"), (4, "d")]),
            batch("b", &[(7, "g")]),
            batch("c", &[]),
        ]);

        assert_eq!(added, 3);
        assert_eq!(timestamps(&store, 0), vec![10, 8, 6, 4]);
        assert_eq!(timestamps(&store, 1), vec![7]);
        assert_eq!(store.stream_count(), 2);
        assert_eq!(store.oldest_timestamp(), Some(4));
    }

    #[test]
    fn test_prepend_newer_dedupes_overlap() {
        let mut store = StreamStore::new();
        store.replace(vec![batch("a", &[(10, "j"), (10, "j2"), (8, "h")])]);

        let added = store.prepend_newer(vec![batch(
            "a",
            &[(12, "l"), (11, "k"), (10, "j2"), (10, "j3"), (10, "j"), (8, "h")],
        )]);

        assert_eq!(added, 3);
        let texts: Vec<_> = store.batches()[0]
            .entries
            .iter()
            .map(|e| e.text.as_str())
            .collect();
        assert_eq!(texts, vec!["l", "k", "j3", "j", "j2", "h"]);
        assert_eq!(store.newest_timestamp(), Some(12));
    }

    #[test]
    fn test_prepend_newer_adds_new_streams() {
        let mut store = StreamStore::new();
        store.replace(vec![batch("a", &[(5, "x")])]);
        let added = store.prepend_newer(vec![batch("b", &[(6, "y"), (3, "z")])]);
        assert_eq!(added, 2);
        assert_eq!(store.total_len(), 3);

        let merged: Vec<_> = store.merged().map(|l| l.entry.timestamp).collect();
        assert_eq!(merged, vec![6, 5, 3]);
    }

    #[test]
    fn test_prepend_without_new_lines_is_noop() {
        let mut store = StreamStore::new();
        store.replace(vec![batch("a", &[(5, "x"), (4, "w")])]);
        assert_eq!(store.prepend_newer(vec![batch("a", &[(5, "x"), (4, "w")])]), 0);
        assert_eq!(store.total_len(), 2);
    }

    #[test]
    fn test_level_counts() {
        let mut store = StreamStore::new();
        store.replace(vec![batch(
            "a",
            &[(4, "ERROR boom"), (3, "warn: slow"), (2, "fatal"), (1, "ok")],
        )]);

        let counts = store.level_counts();
        assert_eq!(counts.error, 1);
        assert_eq!(counts.warn, 1);
        assert_eq!(counts.fatal, 1);
        assert_eq!(counts.other, 1);
        assert_eq!(counts.total(), 4);
    }
}
