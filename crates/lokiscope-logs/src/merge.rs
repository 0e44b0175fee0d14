use std::cmp::Ordering;
use std::collections::BinaryHeap;

use lokiscope_types::{LogBatch, MergedLine, Timestamp};

use crate::level::classify;

/// Next unread entry of one source batch
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Head {
    timestamp: Timestamp,
    source: usize,
    index: usize,
}

impl Ord for Head {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap on timestamp; on ties the earlier source pops first
        self.timestamp
            .cmp(&other.timestamp)
            .then_with(|| other.source.cmp(&self.source))
    }
}

impl PartialOrd for Head {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Lazy k-way merge of newest-first batches into one newest-first sequence.
///
/// Holds one heap slot per source; lines are classified as they are pulled.
/// Equal timestamps across sources come out in source order.
pub struct StreamMerger<'a> {
    batches: &'a [LogBatch],
    heap: BinaryHeap<Head>,
    remaining: usize,
}

impl<'a> StreamMerger<'a> {
    pub fn new(batches: &'a [LogBatch]) -> Self {
        let mut heap = BinaryHeap::with_capacity(batches.len());
        for (source, batch) in batches.iter().enumerate() {
            if let Some(first) = batch.entries.first() {
                heap.push(Head {
                    timestamp: first.timestamp,
                    source,
                    index: 0,
                });
            }
        }

        Self {
            batches,
            heap,
            remaining: batches.iter().map(LogBatch::len).sum(),
        }
    }
}

impl<'a> Iterator for StreamMerger<'a> {
    type Item = MergedLine<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let head = self.heap.pop()?;
        let batch = &self.batches[head.source];
        let entry = &batch.entries[head.index];

        if let Some(next) = batch.entries.get(head.index + 1) {
            self.heap.push(Head {
                timestamp: next.timestamp,
                source: head.source,
                index: head.index + 1,
            });
        }
        self.remaining -= 1;

        Some(MergedLine {
            entry,
            level: classify(&entry.text),
            source_labels: &batch.labels,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for StreamMerger<'_> {}

/// Merge stored batches without copying them
pub fn merge_streams(batches: &[LogBatch]) -> StreamMerger<'_> {
    StreamMerger::new(batches)
}
