//! Session and nickname registries

use crate::irc::session::Session;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// Tracks live sessions and enforces case-insensitive nickname uniqueness.
///
/// Folding is plain ASCII lowercase; RFC 1459 folding (`{|}~` as lowercase
/// `[\]^`) is a documented simplification and is not implemented.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<u64, Arc<Session>>,
    nicknames: DashMap<String, u64>,
}

impl SessionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly accepted session
    pub fn add(&self, session: Arc<Session>) {
        self.sessions.insert(session.id(), session);
    }

    /// Remove a session and release its nickname
    pub fn remove(&self, id: u64) -> Option<Arc<Session>> {
        let session = self.sessions.remove(&id).map(|(_, s)| s);
        if let Some(session) = &session {
            let nick = session.nickname();
            if !nick.is_empty() {
                self.release_nickname(&nick, id);
            }
        }
        session
    }

    /// Look up a session by id
    pub fn get(&self, id: u64) -> Option<Arc<Session>> {
        self.sessions.get(&id).map(|entry| Arc::clone(&entry))
    }

    /// Look up a session by nickname, case-insensitively
    pub fn get_by_nickname(&self, nick: &str) -> Option<Arc<Session>> {
        let id = *self.nicknames.get(&fold(nick))?;
        self.get(id)
    }

    /// Atomically claim `nick` for session `id`, releasing the session's previous
    /// nickname on success. Returns false when another session holds the name.
    pub fn claim_nickname(&self, id: u64, old_nick: &str, nick: &str) -> bool {
        // The entry guard must drop before touching any other key: both keys can
        // hash to the same shard
        let claimed = match self.nicknames.entry(fold(nick)) {
            Entry::Occupied(entry) => *entry.get() == id,
            Entry::Vacant(entry) => {
                entry.insert(id);
                true
            }
        };
        if claimed && !old_nick.is_empty() && !old_nick.eq_ignore_ascii_case(nick) {
            self.release_nickname(old_nick, id);
        }
        claimed
    }

    /// Release `nick` if it is still held by session `id`
    pub fn release_nickname(&self, nick: &str, id: u64) {
        self.nicknames.remove_if(&fold(nick), |_, owner| *owner == id);
    }

    /// Number of live sessions
    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    /// Snapshot of every live session
    pub fn all(&self) -> Vec<Arc<Session>> {
        self.sessions.iter().map(|entry| Arc::clone(&entry)).collect()
    }
}

fn fold(nick: &str) -> String {
    nick.to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use tokio::sync::mpsc;

    fn session(id: u64) -> Arc<Session> {
        let (tx, _rx) = mpsc::unbounded_channel();
        let addr: SocketAddr = "127.0.0.1:50000".parse().unwrap();
        Arc::new(Session::new(id, addr, tx))
    }

    #[test]
    fn test_add_get_remove() {
        let registry = SessionRegistry::new();
        registry.add(session(7));
        assert_eq!(registry.count(), 1);
        assert!(registry.get(7).is_some());
        assert!(registry.remove(7).is_some());
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_nickname_claim_is_case_insensitive() {
        let registry = SessionRegistry::new();
        registry.add(session(1));
        registry.add(session(2));

        assert!(registry.claim_nickname(1, "", "Alice"));
        assert!(!registry.claim_nickname(2, "", "alice"));
        assert!(!registry.claim_nickname(2, "", "ALICE"));
        assert!(registry.claim_nickname(2, "", "bob"));
    }

    #[test]
    fn test_reclaim_own_nickname() {
        let registry = SessionRegistry::new();
        registry.add(session(1));
        assert!(registry.claim_nickname(1, "", "alice"));
        assert!(registry.claim_nickname(1, "alice", "alice"));
    }

    #[test]
    fn test_nickname_change_releases_old() {
        let registry = SessionRegistry::new();
        registry.add(session(1));
        registry.add(session(2));

        assert!(registry.claim_nickname(1, "", "alice"));
        assert!(registry.claim_nickname(1, "alice", "alice2"));
        // Old name is free again
        assert!(registry.claim_nickname(2, "", "alice"));
    }

    #[test]
    fn test_lookup_by_nickname() {
        let registry = SessionRegistry::new();
        let s = session(9);
        s.set_nickname("Carol");
        registry.add(Arc::clone(&s));
        assert!(registry.claim_nickname(9, "", "Carol"));

        let found = registry.get_by_nickname("carol").unwrap();
        assert_eq!(found.id(), 9);
        assert!(registry.get_by_nickname("nobody").is_none());
    }

    #[test]
    fn test_remove_releases_nickname() {
        let registry = SessionRegistry::new();
        let s = session(3);
        registry.add(Arc::clone(&s));
        assert!(registry.claim_nickname(3, "", "dave"));
        s.set_nickname("dave");

        registry.remove(3);
        registry.add(session(4));
        assert!(registry.claim_nickname(4, "", "dave"));
    }
}
