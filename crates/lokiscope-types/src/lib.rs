//! Shared types for lokiscope
//!
//! This crate contains data structures used across multiple lokiscope crates.

use chrono::{DateTime, Local, Utc};
use ratatui::style::Color;
use std::collections::BTreeMap;
use std::collections::btree_map;
use std::fmt;

/// Nanoseconds since the Unix epoch, as reported by the log backend
pub type Timestamp = i64;

// ============================================================================
// Stream Types
// ============================================================================

/// Label set identifying one log stream (e.g. namespace, pod, container)
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LogStreamLabels(BTreeMap<String, String>);

impl LogStreamLabels {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Short human name for the stream: pod, then container, then app, else the full selector
    pub fn short_name(&self) -> String {
        ["pod", "container", "app"]
            .iter()
            .find_map(|key| self.get(key))
            .map(str::to_string)
            .unwrap_or_else(|| self.to_string())
    }
}

impl From<BTreeMap<String, String>> for LogStreamLabels {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl<K, V> FromIterator<(K, V)> for LogStreamLabels
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl<'a> IntoIterator for &'a LogStreamLabels {
    type Item = (&'a String, &'a String);
    type IntoIter = btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for LogStreamLabels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}={:?}", name, value)?;
        }
        f.write_str("}")
    }
}

// ============================================================================
// Log Types
// ============================================================================

/// A single raw log line
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: Timestamp,
    pub text: String,
}

impl LogEntry {
    pub fn new(timestamp: Timestamp, text: impl Into<String>) -> Self {
        Self {
            timestamp,
            text: text.into(),
        }
    }

    pub fn datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_nanos(self.timestamp)
    }
}

/// Render a nanosecond timestamp for display
pub fn format_timestamp(timestamp: Timestamp, local: bool) -> String {
    let utc = DateTime::from_timestamp_nanos(timestamp);
    if local {
        utc.with_timezone(&Local).to_rfc3339()
    } else {
        utc.to_rfc3339()
    }
}

/// One stream's worth of lines, newest first
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LogBatch {
    pub labels: LogStreamLabels,
    /// Sorted descending by timestamp (backend contract)
    pub entries: Vec<LogEntry>,
}

impl LogBatch {
    pub fn new(labels: LogStreamLabels, entries: Vec<LogEntry>) -> Self {
        Self { labels, entries }
    }

    pub fn newest(&self) -> Option<Timestamp> {
        self.entries.first().map(|e| e.timestamp)
    }

    pub fn oldest(&self) -> Option<Timestamp> {
        self.entries.last().map(|e| e.timestamp)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Log severity, in classification priority order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Severity {
    Fatal,
    Error,
    Warn,
    Info,
    #[default]
    Other,
}

impl Severity {
    /// Keyword-bearing severities, highest priority first
    pub const PRIORITY: [Severity; 4] = [Self::Fatal, Self::Error, Self::Warn, Self::Info];

    /// Lowercase keyword matched against line text
    pub fn keyword(&self) -> Option<&'static str> {
        match self {
            Self::Fatal => Some("fatal"),
            Self::Error => Some("error"),
            Self::Warn => Some("warn"),
            Self::Info => Some("info"),
            Self::Other => None,
        }
    }

    /// Get display color for this severity
    pub fn color(&self) -> Color {
        match self {
            Self::Fatal => Color::Magenta,
            Self::Error => Color::Red,
            Self::Warn => Color::Yellow,
            Self::Info => Color::Green,
            Self::Other => Color::DarkGray,
        }
    }

    /// Short display string (3 chars)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fatal => "FTL",
            Self::Error => "ERR",
            Self::Warn => "WRN",
            Self::Info => "INF",
            Self::Other => "---",
        }
    }
}

/// A line emitted by the stream merge, borrowed from per-stream storage
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MergedLine<'a> {
    pub entry: &'a LogEntry,
    pub level: Severity,
    pub source_labels: &'a LogStreamLabels,
}

/// Live tail mode
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TailState {
    #[default]
    Live,
    Paused,
}
