//! Query-port command dispatch

use crate::buffer::RingBuffer;
use crate::query::ParsedQuery;
use std::sync::Arc;

const HELP_TEXT: &str = "Available commands:
  STATS - Show buffer statistics
  COUNT - Show number of logs in buffer
  HELP  - Show this help message
  QUERY <parameters> - Search logs with parameters:

Query parameters:
  keywords=<w1,w2,..> - Multiple keywords (comma-separated)
  operator=<AND|OR>   - Keyword matching logic (default: AND)
  regex=<pattern>     - Regular expression pattern (case-insensitive)
  time_from=<unix_ts> - Start time (Unix timestamp)
  time_to=<unix_ts>   - End time (Unix timestamp)

Example: QUERY keywords=error,timeout operator=AND regex=failed
";

/// Serves the one-shot textual command set over a shared [`RingBuffer`]
pub struct QueryHandler {
    buffer: Arc<RingBuffer>,
}

impl QueryHandler {
    /// Create a handler reading from `buffer`
    pub fn new(buffer: Arc<RingBuffer>) -> Self {
        Self { buffer }
    }

    /// Dispatch one command line and produce the full response text
    pub fn process(&self, command: &str) -> String {
        if command.starts_with("QUERY") {
            self.handle_search(command)
        } else if command == "STATS" {
            self.handle_stats()
        } else if command == "COUNT" {
            self.handle_count()
        } else if command == "HELP" {
            HELP_TEXT.to_string()
        } else {
            "ERROR: Unknown command. Use HELP for usage.\n".to_string()
        }
    }

    fn handle_search(&self, command: &str) -> String {
        let query = match ParsedQuery::parse(command) {
            Ok(query) => query,
            Err(e) => return format!("ERROR: {}\n", e),
        };

        let results = self.buffer.search_enhanced(&query);
        let mut response = format!("FOUND: {} matches\n", results.len());
        for line in results {
            response.push_str(&line);
            response.push('\n');
        }
        response
    }

    fn handle_stats(&self) -> String {
        let stats = self.buffer.stats();
        format!(
            "STATS: Total={}, Dropped={}, Current={}\n",
            stats.total,
            stats.dropped,
            self.buffer.size()
        )
    }

    fn handle_count(&self) -> String {
        format!("COUNT: {}\n", self.buffer.size())
    }
}
