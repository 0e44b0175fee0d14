use lokiscope_types::Timestamp;

/// Scroll position of the rendered feed, in rows. Row 0 is the newest line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Viewport {
    /// First visible row
    pub offset: usize,
    /// Number of visible rows
    pub height: usize,
    /// Total rows in the feed
    pub total: usize,
    /// Highlighted row (absolute)
    pub selected: usize,
}

impl Viewport {
    pub fn new(offset: usize, height: usize, total: usize) -> Self {
        Self {
            offset,
            height,
            total,
            selected: 0,
        }
    }

    pub fn with_selected(mut self, selected: usize) -> Self {
        self.selected = selected;
        self
    }

    /// Newest entry visible and highlighted
    pub fn at_top(&self) -> bool {
        self.offset == 0 && self.selected == 0
    }

    /// Bottom edge within `margin` rows of the end of the feed
    pub fn near_bottom(&self, margin: usize) -> bool {
        self.offset + self.height + margin >= self.total
    }
}

/// Backward pagination state.
///
/// Tracks the oldest loaded timestamp, whether a page request is in flight,
/// and whether the backend has run out of older lines.
#[derive(Clone, Debug, Default)]
pub struct PaginationCursor {
    oldest: Option<Timestamp>,
    in_flight: bool,
    done: bool,
}

impl PaginationCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn oldest(&self) -> Option<Timestamp> {
        self.oldest
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Record the oldest loaded timestamp; the cursor only ever moves older
    pub fn observe(&mut self, oldest: Option<Timestamp>) {
        if let Some(ts) = oldest {
            self.oldest = Some(self.oldest.map_or(ts, |cur| cur.min(ts)));
        }
    }

    /// Claim the next page. Returns the exclusive `start` boundary, or `None`
    /// when exhausted, already fetching, or nothing is loaded yet.
    pub fn begin(&mut self) -> Option<Timestamp> {
        if self.done || self.in_flight {
            return None;
        }
        let start = self.oldest?;
        self.in_flight = true;
        Some(start)
    }

    /// Page arrived. An empty page means there is nothing older.
    pub fn complete(&mut self, entries: usize, oldest: Option<Timestamp>) {
        self.in_flight = false;
        if entries == 0 {
            self.done = true;
        } else {
            self.observe(oldest);
        }
    }

    /// Page failed; state is left as it was so the next trigger retries
    pub fn fail(&mut self) {
        self.in_flight = false;
    }

    /// Mark exhausted without a page request (e.g. an empty first load)
    pub fn finish(&mut self) {
        self.done = true;
    }
}
