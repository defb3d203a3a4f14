//! IRC-compatible log streaming subsystem
//!
//! A subset of the IRC protocol: registration (`NICK`/`USER`), channel membership
//! (`JOIN`/`PART`/`NAMES`/`LIST`), messaging (`PRIVMSG`), and keepalive
//! (`PING`/`QUIT`). Two log-stream channels are created at startup, `#logs-all` and
//! `#logs-error`; entries pushed into the ring buffer are fanned out to their
//! members as PRIVMSGs from the synthetic user `LogBot!log@system`.

pub mod channel;
pub mod channels;
pub mod commands;
pub mod message;
pub mod registry;
pub mod server;
pub mod session;

pub use channel::{Channel, ChannelKind};
pub use channels::ChannelManager;
pub use commands::CommandHandler;
pub use message::IrcCommand;
pub use registry::SessionRegistry;
pub use server::IrcServer;
pub use session::{Session, SessionState};

/// Server name used in reply prefixes
pub const SERVER_NAME: &str = "logcaster-irc";

/// Version string reported in the welcome replies
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum concurrent IRC sessions
pub const MAX_SESSIONS: usize = 1024;
