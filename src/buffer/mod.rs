//! Bounded in-memory ring buffer of log entries
//!
//! The buffer is the shared heart of the data plane: ingest readers push into it,
//! the query port scans it, and the IRC subsystem subscribes to it through
//! registered callbacks. A single mutex guards contents and the callback table;
//! callbacks run synchronously on the pushing task, so all deliveries for one entry
//! happen before the next push is admitted.

use crate::query::ParsedQuery;
use crate::types::LogEntry;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Default ring capacity in entries
pub const DEFAULT_CAPACITY: usize = 10000;

/// Callback key receiving every pushed entry
pub const CHANNEL_ALL: &str = "#logs-all";

/// Callback key receiving entries with level `"ERROR"`
pub const CHANNEL_ERROR: &str = "#logs-error";

/// Subscriber callback invoked for matching pushes.
///
/// Callbacks run on the pushing task while the buffer lock is held; they must be
/// fast, must not block, and must not call back into [`RingBuffer::push`].
pub type LogCallback = Arc<dyn Fn(&LogEntry) + Send + Sync>;

/// Counter snapshot returned by [`RingBuffer::stats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Successful pushes since construction
    pub total: u64,
    /// Entries overwritten because the ring was full
    pub dropped: u64,
}

struct Inner {
    entries: VecDeque<LogEntry>,
    callbacks: HashMap<String, Vec<LogCallback>>,
}

/// Bounded FIFO of log entries with drop-oldest overwrite
pub struct RingBuffer {
    capacity: usize,
    inner: Mutex<Inner>,
    total: AtomicU64,
    dropped: AtomicU64,
}

impl RingBuffer {
    /// Create a buffer holding at most `capacity` entries
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Inner {
                entries: VecDeque::with_capacity(capacity.min(4096)),
                callbacks: HashMap::new(),
            }),
            total: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Append an entry stamped with the current instant.
    ///
    /// When full, the oldest entry is overwritten and `dropped` incremented. After
    /// insertion every callback under [`CHANNEL_ALL`] fires, and every callback
    /// under [`CHANNEL_ERROR`] when `level == "ERROR"`.
    pub fn push(&self, message: String, level: &str, source: &str) {
        let entry = LogEntry::new(message, level, source);

        let mut inner = self.inner.lock().unwrap();
        if inner.entries.len() >= self.capacity {
            inner.entries.pop_front();
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        inner.entries.push_back(entry.clone());
        self.total.fetch_add(1, Ordering::Relaxed);

        if let Some(callbacks) = inner.callbacks.get(CHANNEL_ALL) {
            for callback in callbacks {
                callback(&entry);
            }
        }
        if entry.level == "ERROR" {
            if let Some(callbacks) = inner.callbacks.get(CHANNEL_ERROR) {
                for callback in callbacks {
                    callback(&entry);
                }
            }
        }
    }

    /// Linear scan oldest-first for entries containing `keyword` as a substring,
    /// formatted as `"[YYYY-MM-DD HH:MM:SS] <message>"`
    pub fn search(&self, keyword: &str) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        inner
            .entries
            .iter()
            .filter(|entry| entry.message.contains(keyword))
            .map(LogEntry::format_bracketed)
            .collect()
    }

    /// Linear scan oldest-first for entries matching a parsed query, formatted
    /// like [`RingBuffer::search`]
    pub fn search_enhanced(&self, query: &ParsedQuery) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        inner
            .entries
            .iter()
            .filter(|entry| query.matches(&entry.message, entry.timestamp))
            .map(LogEntry::format_bracketed)
            .collect()
    }

    /// Current entry count
    pub fn size(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    /// Snapshot of the total/dropped counters
    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            total: self.total.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    /// Register a callback under `key`; duplicate registrations are kept
    pub fn register_callback(&self, key: &str, callback: LogCallback) {
        let mut inner = self.inner.lock().unwrap();
        inner.callbacks.entry(key.to_string()).or_default().push(callback);
    }
}

impl Default for RingBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
