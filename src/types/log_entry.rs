//! Log entry types and utilities

use chrono::{DateTime, Local, Utc};

/// Maximum stored message length in bytes; longer lines are truncated
pub const MAX_MESSAGE_LEN: usize = 1024;

/// Suffix appended to truncated messages
pub const TRUNCATION_MARKER: &str = "...";

/// A single ingested log record
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Raw log message, at most [`MAX_MESSAGE_LEN`] bytes
    pub message: String,

    /// Wall-clock instant at ingest
    pub timestamp: DateTime<Utc>,

    /// Short severity tag, `"info"` when the producer supplied none
    pub level: String,

    /// Short origin tag, `"unknown"` when the producer supplied none
    pub source: String,
}

impl LogEntry {
    /// Create a new entry stamped with the current instant
    pub fn new(message: String, level: &str, source: &str) -> Self {
        Self {
            message,
            timestamp: Utc::now(),
            level: level.to_string(),
            source: source.to_string(),
        }
    }

    /// Format as `"[YYYY-MM-DD HH:MM:SS] <message>"` in local time, the shape
    /// returned by buffer searches
    pub fn format_bracketed(&self) -> String {
        format!(
            "[{}] {}",
            self.timestamp
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S"),
            self.message
        )
    }
}

/// Truncate `line` in place to [`MAX_MESSAGE_LEN`] bytes, replacing the tail with
/// [`TRUNCATION_MARKER`]. The cut lands on a char boundary, so multi-byte input
/// never splits a code point.
pub fn truncate_message(line: &mut String) {
    if line.len() <= MAX_MESSAGE_LEN {
        return;
    }
    let mut cut = MAX_MESSAGE_LEN - TRUNCATION_MARKER.len();
    while !line.is_char_boundary(cut) {
        cut -= 1;
    }
    line.truncate(cut);
    line.push_str(TRUNCATION_MARKER);
}
