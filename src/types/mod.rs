//! Core data types for LogCaster

pub mod log_entry;

pub use log_entry::{truncate_message, LogEntry, MAX_MESSAGE_LEN, TRUNCATION_MARKER};
