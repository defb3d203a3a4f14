//! Per-connection IRC session state

use crate::irc::message::format_reply;
use crate::irc::SERVER_NAME;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::Instant;
use tokio::sync::mpsc;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// TCP connection established, not yet registered
    Connected,
    /// NICK and USER both received, welcome sent
    Authenticated,
    /// QUIT processed or socket gone; awaiting teardown
    Disconnected,
}

struct SessionInner {
    nickname: String,
    username: String,
    realname: String,
    hostname: String,
    state: SessionState,
    channels: HashSet<String>,
    last_activity: Instant,
}

/// One connected IRC client.
///
/// Shared between the reader task, the registry, and every joined channel.
/// Mutable fields sit behind a lock held only briefly; outbound traffic goes
/// through an unbounded queue drained by a single writer task, so sends never
/// block and per-session ordering is preserved.
pub struct Session {
    id: u64,
    addr: SocketAddr,
    outbound: mpsc::UnboundedSender<String>,
    inner: Mutex<SessionInner>,
}

impl Session {
    /// Create a session for a connection from `addr`; `outbound` feeds the
    /// connection's writer task
    pub fn new(id: u64, addr: SocketAddr, outbound: mpsc::UnboundedSender<String>) -> Self {
        Self {
            id,
            addr,
            outbound,
            inner: Mutex::new(SessionInner {
                nickname: String::new(),
                username: String::new(),
                realname: String::new(),
                hostname: addr.ip().to_string(),
                state: SessionState::Connected,
                channels: HashSet::new(),
                last_activity: Instant::now(),
            }),
        }
    }

    /// Registry key for this session
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Peer address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Current nickname, empty before NICK
    pub fn nickname(&self) -> String {
        self.inner.lock().unwrap().nickname.clone()
    }

    /// Set the nickname
    pub fn set_nickname(&self, nick: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.nickname = nick.to_string();
        inner.last_activity = Instant::now();
    }

    /// Current username, empty before USER
    pub fn username(&self) -> String {
        self.inner.lock().unwrap().username.clone()
    }

    /// Set the USER fields
    pub fn set_user_info(&self, username: &str, hostname: &str, realname: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.username = username.to_string();
        inner.hostname = hostname.to_string();
        inner.realname = realname.to_string();
        inner.last_activity = Instant::now();
    }

    /// Hostname shown in this session's message prefix
    pub fn hostname(&self) -> String {
        self.inner.lock().unwrap().hostname.clone()
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.inner.lock().unwrap().state
    }

    /// Transition the lifecycle state
    pub fn set_state(&self, state: SessionState) {
        let mut inner = self.inner.lock().unwrap();
        inner.state = state;
        inner.last_activity = Instant::now();
    }

    /// Whether the registration handshake has completed
    pub fn is_authenticated(&self) -> bool {
        self.inner.lock().unwrap().state == SessionState::Authenticated
    }

    /// Record a channel this session joined
    pub fn join_channel(&self, name: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.channels.insert(name.to_string());
        inner.last_activity = Instant::now();
    }

    /// Forget a channel this session left
    pub fn part_channel(&self, name: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.channels.remove(name);
        inner.last_activity = Instant::now();
    }

    /// Whether this session is currently in `name`
    pub fn is_in_channel(&self, name: &str) -> bool {
        self.inner.lock().unwrap().channels.contains(name)
    }

    /// Names of every channel this session has joined
    pub fn channels(&self) -> Vec<String> {
        self.inner.lock().unwrap().channels.iter().cloned().collect()
    }

    /// Touch the last-activity instant
    pub fn touch(&self) {
        self.inner.lock().unwrap().last_activity = Instant::now();
    }

    /// `nick!user@host` identifier, empty before NICK
    pub fn full_identifier(&self) -> String {
        let inner = self.inner.lock().unwrap();
        if inner.nickname.is_empty() {
            return String::new();
        }
        format!("{}!{}@{}", inner.nickname, inner.username, inner.hostname)
    }

    /// Queue one line for this session; CR-LF is appended when missing.
    /// Delivery is best-effort: once the writer task is gone the line is dropped.
    pub fn send(&self, message: &str) {
        let mut line = message.to_string();
        if !line.ends_with("\r\n") {
            line.push_str("\r\n");
        }
        let _ = self.outbound.send(line);
    }

    /// Queue a numeric reply, using `*` as the nick before registration
    pub fn send_numeric(&self, code: u16, params: &str) {
        let nick = {
            let inner = self.inner.lock().unwrap();
            if inner.nickname.is_empty() {
                "*".to_string()
            } else {
                inner.nickname.clone()
            }
        };
        self.send(&format_reply(SERVER_NAME, &nick, code, params));
    }
}
