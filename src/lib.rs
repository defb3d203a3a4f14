//! # LogCaster - Concurrent Log Ingestion Server
//!
//! LogCaster accepts newline-delimited log lines over TCP, retains the most recent
//! window in a bounded in-memory ring buffer for interactive querying, optionally
//! persists every line to size-rotated files, and optionally republishes entries in
//! real time to clients connected over an IRC-compatible protocol.
//!
//! ## Ports
//!
//! - **Ingest** (default 9999): producers write raw log lines; the server never
//!   responds on this socket.
//! - **Query** (default 9998): one `STATS` / `COUNT` / `HELP` / `QUERY ...` command
//!   per connection, text response, close.
//! - **IRC** (optional, default 6667): an IRC subset where `#logs-all` and
//!   `#logs-error` stream matching entries to joined clients.
//!
//! ## Quick Start
//!
//! ```no_run
//! use logcaster::config::ServerConfig;
//! use logcaster::server::LogCaster;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default();
//!     let server = LogCaster::new(config).await?;
//!     server.start().await?;
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod buffer;
pub mod config;
pub mod irc;
pub mod persist;
pub mod pool;
pub mod query;
pub mod server;
pub mod types;

/// Common error types used throughout LogCaster
pub mod error {
    use std::fmt;

    /// LogCaster error types
    #[derive(Debug)]
    pub enum LogCasterError {
        /// I/O operation failed
        Io(std::io::Error),
        /// Configuration error
        Config(String),
        /// Server error
        Server(String),
        /// Query parse or execution error
        Query(String),
        /// IRC subsystem error
        Irc(String),
        /// Persistence error
        Persistence(String),
    }

    impl fmt::Display for LogCasterError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                LogCasterError::Io(e) => write!(f, "I/O error: {}", e),
                LogCasterError::Config(e) => write!(f, "Configuration error: {}", e),
                LogCasterError::Server(e) => write!(f, "Server error: {}", e),
                LogCasterError::Query(e) => write!(f, "Query error: {}", e),
                LogCasterError::Irc(e) => write!(f, "IRC error: {}", e),
                LogCasterError::Persistence(e) => write!(f, "Persistence error: {}", e),
            }
        }
    }

    impl std::error::Error for LogCasterError {}

    impl From<std::io::Error> for LogCasterError {
        fn from(err: std::io::Error) -> Self {
            LogCasterError::Io(err)
        }
    }

    /// Result type alias for LogCaster operations
    pub type Result<T> = std::result::Result<T, LogCasterError>;
}

pub use error::{LogCasterError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::buffer::RingBuffer;
    pub use crate::config::ServerConfig;
    pub use crate::query::{ParsedQuery, QueryHandler};
    pub use crate::server::LogCaster;
    pub use crate::types::LogEntry;
    pub use crate::{LogCasterError, Result};
}
