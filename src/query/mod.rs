//! Structured query language over the ring buffer
//!
//! A query is a single line of `key=value` tokens after a leading `QUERY` keyword:
//!
//! ```text
//! QUERY keywords=error,timeout operator=OR regex=fail.*ed time_from=1700000000
//! ```
//!
//! [`parser`] turns the line into a [`ParsedQuery`] matcher; [`handler`] implements
//! the full query-port command set on top of it.

pub mod handler;
pub mod parser;

pub use handler::QueryHandler;
pub use parser::{OperatorType, ParsedQuery};
