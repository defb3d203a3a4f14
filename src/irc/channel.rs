//! IRC channel state and log-entry fan-out

use crate::irc::message::format_user_message;
use crate::irc::session::Session;
use crate::types::LogEntry;
use chrono::{DateTime, Local, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

/// Predicate deciding whether a log-stream channel receives an entry
pub type LogFilter = Arc<dyn Fn(&LogEntry) -> bool + Send + Sync>;

/// Channel flavor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// Ordinary chat channel, destroyed when its last member parts
    Normal,
    /// Log fan-out channel, pre-created at startup and never destroyed
    LogStream,
}

struct ChannelInner {
    topic: String,
    topic_set_by: String,
    topic_set_at: Option<DateTime<Utc>>,
    members: HashMap<String, Arc<Session>>,
    operators: HashSet<String>,
    streaming: bool,
    filter: Option<LogFilter>,
}

/// A named channel shared by every joined session
pub struct Channel {
    name: String,
    kind: ChannelKind,
    inner: RwLock<ChannelInner>,
}

impl Channel {
    /// Create an empty channel
    pub fn new(name: &str, kind: ChannelKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            inner: RwLock::new(ChannelInner {
                topic: String::new(),
                topic_set_by: String::new(),
                topic_set_at: None,
                members: HashMap::new(),
                operators: HashSet::new(),
                streaming: false,
                filter: None,
            }),
        }
    }

    /// Channel name, including the `#`/`&` sigil
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Channel flavor
    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    /// Add a member; the first joiner of a channel becomes its operator
    pub fn add_member(&self, session: Arc<Session>) {
        let mut inner = self.inner.write().unwrap();
        let nickname = session.nickname();
        inner.members.insert(nickname.clone(), session);
        if inner.members.len() == 1 {
            inner.operators.insert(nickname);
        }
    }

    /// Remove a member and any operator grant it held
    pub fn remove_member(&self, nickname: &str) {
        let mut inner = self.inner.write().unwrap();
        inner.members.remove(nickname);
        inner.operators.remove(nickname);
    }

    /// Whether `nickname` is currently a member
    pub fn has_member(&self, nickname: &str) -> bool {
        self.inner.read().unwrap().members.contains_key(nickname)
    }

    /// Whether `nickname` holds operator status
    pub fn is_operator(&self, nickname: &str) -> bool {
        self.inner.read().unwrap().operators.contains(nickname)
    }

    /// Current member count
    pub fn member_count(&self) -> usize {
        self.inner.read().unwrap().members.len()
    }

    /// Nicknames of every member
    pub fn member_nicknames(&self) -> Vec<String> {
        self.inner.read().unwrap().members.keys().cloned().collect()
    }

    /// Queue `message` to every member
    pub fn broadcast(&self, message: &str) {
        let inner = self.inner.read().unwrap();
        for session in inner.members.values() {
            session.send(message);
        }
    }

    /// Queue `message` to every member except `except_nick`
    pub fn broadcast_except(&self, message: &str, except_nick: &str) {
        let inner = self.inner.read().unwrap();
        for (nick, session) in &inner.members {
            if nick != except_nick {
                session.send(message);
            }
        }
    }

    /// Set the topic, recording who set it and when
    pub fn set_topic(&self, topic: &str, set_by: &str) {
        let mut inner = self.inner.write().unwrap();
        inner.topic = topic.to_string();
        inner.topic_set_by = set_by.to_string();
        inner.topic_set_at = Some(Utc::now());
    }

    /// Current topic
    pub fn topic(&self) -> String {
        self.inner.read().unwrap().topic.clone()
    }

    /// Who set the topic and when, if it has ever been set
    pub fn topic_info(&self) -> Option<(String, DateTime<Utc>)> {
        let inner = self.inner.read().unwrap();
        inner
            .topic_set_at
            .map(|at| (inner.topic_set_by.clone(), at))
    }

    /// Enable or disable log streaming into this channel
    pub fn enable_streaming(&self, enable: bool) {
        self.inner.write().unwrap().streaming = enable;
    }

    /// Whether log streaming is enabled
    pub fn is_streaming(&self) -> bool {
        self.inner.read().unwrap().streaming
    }

    /// Install the log filter predicate
    pub fn set_filter(&self, filter: LogFilter) {
        self.inner.write().unwrap().filter = Some(filter);
    }

    /// Build a filter accepting entries whose level equals `level`
    pub fn level_filter(level: &str) -> LogFilter {
        let level = level.to_string();
        Arc::new(move |entry: &LogEntry| entry.level == level)
    }

    /// Deliver one log entry to this channel if streaming is enabled, the channel
    /// has members, and the filter (when present) accepts it. Delivery only
    /// enqueues onto member outbound queues and never blocks.
    pub fn process_entry(&self, entry: &LogEntry) {
        let inner = self.inner.read().unwrap();
        if !inner.streaming || inner.members.is_empty() {
            return;
        }
        if let Some(filter) = &inner.filter {
            if !filter(entry) {
                return;
            }
        }

        let message = format_user_message(
            "LogBot",
            "log",
            "system",
            "PRIVMSG",
            &self.name,
            &format_stream_line(entry),
        );
        for session in inner.members.values() {
            session.send(&message);
        }
    }
}

/// Format an entry for channel delivery: `"[ts] LEVEL: [source] message"`, with
/// empty level/source segments omitted
fn format_stream_line(entry: &LogEntry) -> String {
    let mut line = format!(
        "[{}] ",
        entry
            .timestamp
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
    );
    if !entry.level.is_empty() {
        line.push_str(&entry.level);
        line.push_str(": ");
    }
    if !entry.source.is_empty() {
        line.push('[');
        line.push_str(&entry.source);
        line.push_str("] ");
    }
    line.push_str(&entry.message);
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use tokio::sync::mpsc;

    fn member(id: u64, nick: &str) -> (Arc<Session>, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let addr: SocketAddr = "127.0.0.1:50000".parse().unwrap();
        let session = Arc::new(Session::new(id, addr, tx));
        session.set_nickname(nick);
        (session, rx)
    }

    #[test]
    fn test_first_member_becomes_operator() {
        let channel = Channel::new("#dev", ChannelKind::Normal);
        let (alice, _rx_a) = member(1, "alice");
        let (bob, _rx_b) = member(2, "bob");

        channel.add_member(alice);
        channel.add_member(bob);

        assert!(channel.is_operator("alice"));
        assert!(!channel.is_operator("bob"));
        assert_eq!(channel.member_count(), 2);
    }

    #[test]
    fn test_remove_member_drops_operator_grant() {
        let channel = Channel::new("#dev", ChannelKind::Normal);
        let (alice, _rx) = member(1, "alice");
        channel.add_member(alice);
        channel.remove_member("alice");
        assert!(!channel.has_member("alice"));
        assert!(!channel.is_operator("alice"));
        assert_eq!(channel.member_count(), 0);
    }

    #[test]
    fn test_broadcast_except_skips_sender() {
        let channel = Channel::new("#dev", ChannelKind::Normal);
        let (alice, mut rx_a) = member(1, "alice");
        let (bob, mut rx_b) = member(2, "bob");
        channel.add_member(alice);
        channel.add_member(bob);

        channel.broadcast_except("hello", "alice");
        assert!(rx_a.try_recv().is_err());
        assert_eq!(rx_b.try_recv().unwrap(), "hello\r\n");
    }

    #[test]
    fn test_process_entry_requires_streaming() {
        let channel = Channel::new("#logs-all", ChannelKind::LogStream);
        let (alice, mut rx) = member(1, "alice");
        channel.add_member(alice);

        let entry = LogEntry::new("quiet".to_string(), "info", "unknown");
        channel.process_entry(&entry);
        assert!(rx.try_recv().is_err());

        channel.enable_streaming(true);
        channel.process_entry(&entry);
        let line = rx.try_recv().unwrap();
        assert!(line.starts_with(":LogBot!log@system PRIVMSG #logs-all :["));
        assert!(line.contains("info: [unknown] quiet"));
    }

    #[test]
    fn test_process_entry_applies_filter() {
        let channel = Channel::new("#logs-error", ChannelKind::LogStream);
        channel.enable_streaming(true);
        channel.set_filter(Channel::level_filter("ERROR"));
        let (alice, mut rx) = member(1, "alice");
        channel.add_member(alice);

        channel.process_entry(&LogEntry::new("fine".to_string(), "info", "unknown"));
        assert!(rx.try_recv().is_err());

        channel.process_entry(&LogEntry::new("boom".to_string(), "ERROR", "unknown"));
        let line = rx.try_recv().unwrap();
        assert!(line.contains("ERROR: [unknown] boom"));
    }

    #[test]
    fn test_topic_bookkeeping() {
        let channel = Channel::new("#dev", ChannelKind::Normal);
        assert!(channel.topic_info().is_none());
        channel.set_topic("All log messages", "LogCaster");
        assert_eq!(channel.topic(), "All log messages");
        let (set_by, _at) = channel.topic_info().unwrap();
        assert_eq!(set_by, "LogCaster");
    }
}
