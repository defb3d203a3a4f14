//! Channel table and membership lifecycle

use crate::irc::channel::{Channel, ChannelKind};
use crate::irc::message::format_user_message;
use crate::irc::session::Session;
use crate::types::LogEntry;
use dashmap::DashMap;
use std::sync::Arc;

/// Prefix reserved for pre-created log-stream channels
pub const LOG_CHANNEL_PREFIX: &str = "#logs-";

struct LogChannelConfig {
    name: &'static str,
    level: Option<&'static str>,
    topic: &'static str,
}

const DEFAULT_LOG_CHANNELS: &[LogChannelConfig] = &[
    LogChannelConfig {
        name: "#logs-all",
        level: None,
        topic: "All log messages",
    },
    LogChannelConfig {
        name: "#logs-error",
        level: Some("ERROR"),
        topic: "Error level logs only",
    },
];

/// Owns every channel and implements join/part/fan-out rules
#[derive(Default)]
pub struct ChannelManager {
    channels: DashMap<String, Arc<Channel>>,
}

impl ChannelManager {
    /// Create an empty channel table
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the `#logs-all` and `#logs-error` stream channels with their topics,
    /// filters, and streaming enabled
    pub fn initialize_log_channels(&self) {
        for config in DEFAULT_LOG_CHANNELS {
            let channel = Arc::new(Channel::new(config.name, ChannelKind::LogStream));
            channel.set_topic(config.topic, "LogCaster");
            channel.enable_streaming(true);
            if let Some(level) = config.level {
                channel.set_filter(Channel::level_filter(level));
            }
            self.channels.insert(config.name.to_string(), channel);
        }
    }

    /// Whether `name` exists
    pub fn exists(&self, name: &str) -> bool {
        self.channels.contains_key(name)
    }

    /// Look up a channel
    pub fn get(&self, name: &str) -> Option<Arc<Channel>> {
        self.channels.get(name).map(|entry| Arc::clone(&entry))
    }

    /// Names of every channel
    pub fn names(&self) -> Vec<String> {
        self.channels.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Join `session` to `name`.
    ///
    /// Missing `#logs-*` channels are not auto-created (the caller replies 403);
    /// any other missing name is created as a Normal channel whose first joiner is
    /// the operator. Returns false when the channel was missing and reserved.
    pub fn join(&self, session: &Arc<Session>, name: &str) -> bool {
        let channel = match self.get(name) {
            Some(channel) => channel,
            None => {
                if name.starts_with(LOG_CHANNEL_PREFIX) {
                    return false;
                }
                Arc::clone(
                    &self
                        .channels
                        .entry(name.to_string())
                        .or_insert_with(|| Arc::new(Channel::new(name, ChannelKind::Normal))),
                )
            }
        };

        channel.add_member(Arc::clone(session));
        session.join_channel(name);

        let join_msg = format!(":{} JOIN :{}", session.full_identifier(), name);
        channel.broadcast(&join_msg);
        true
    }

    /// Part `session` from `name`, broadcasting the reason (which may be empty)
    /// and destroying an emptied Normal channel. Log-stream channels are never
    /// destroyed. Returns false when the session was not a member.
    pub fn part(&self, session: &Arc<Session>, name: &str, reason: &str) -> bool {
        let nickname = session.nickname();
        let Some(channel) = self.get(name) else {
            return false;
        };
        if !channel.has_member(&nickname) {
            return false;
        }

        let mut part_msg = format!(":{} PART {}", session.full_identifier(), name);
        if !reason.is_empty() {
            part_msg.push_str(" :");
            part_msg.push_str(reason);
        }
        channel.broadcast(&part_msg);

        channel.remove_member(&nickname);
        session.part_channel(name);

        if channel.member_count() == 0 && channel.kind() == ChannelKind::Normal {
            self.channels.remove(name);
        }
        true
    }

    /// Part `session` from every channel it has joined
    pub fn part_all(&self, session: &Arc<Session>, reason: &str) {
        for name in session.channels() {
            self.part(session, &name, reason);
        }
    }

    /// Broadcast a PRIVMSG from `session` to every other member of `name`
    pub fn privmsg(&self, session: &Arc<Session>, name: &str, text: &str) {
        if let Some(channel) = self.get(name) {
            let message = format_user_message(
                &session.nickname(),
                &session.username(),
                &session.hostname(),
                "PRIVMSG",
                name,
                text,
            );
            channel.broadcast_except(&message, &session.nickname());
        }
    }

    /// Fan one log entry out to every streaming log-stream channel whose filter
    /// accepts it. Called from the ring buffer callback on the pushing task.
    pub fn distribute(&self, entry: &LogEntry) {
        for channel in self.channels.iter() {
            if channel.kind() == ChannelKind::LogStream && channel.is_streaming() {
                channel.process_entry(entry);
            }
        }
    }
}
