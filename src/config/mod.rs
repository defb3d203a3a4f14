//! Configuration management for LogCaster

pub mod settings;

pub use settings::{IrcSettings, PersistenceSettings, ServerConfig, ServerSettings};
