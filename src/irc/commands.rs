//! IRC command dispatch and numeric replies

use crate::irc::channels::{ChannelManager, LOG_CHANNEL_PREFIX};
use crate::irc::message::{
    self, numerics::*, split_channels, IrcCommand,
};
use crate::irc::registry::SessionRegistry;
use crate::irc::session::{Session, SessionState};
use crate::irc::{SERVER_NAME, SERVER_VERSION};
use std::sync::Arc;

/// Routes parsed commands to their handlers, enforcing the registration gate
pub struct CommandHandler {
    registry: Arc<SessionRegistry>,
    channels: Arc<ChannelManager>,
    server_created: String,
}

impl CommandHandler {
    /// Create a handler over the shared session and channel tables
    pub fn new(registry: Arc<SessionRegistry>, channels: Arc<ChannelManager>) -> Self {
        Self {
            registry,
            channels,
            server_created: chrono::Local::now().format("%a %b %e %T %Y").to_string(),
        }
    }

    /// Dispatch one parsed command for `session`.
    ///
    /// Until the session is authenticated only NICK, USER, and QUIT are accepted;
    /// everything else is answered with 451 and causes no state change.
    pub fn handle(&self, session: &Arc<Session>, cmd: &IrcCommand) {
        if cmd.command.is_empty() {
            return;
        }

        if !session.is_authenticated()
            && cmd.command != "NICK"
            && cmd.command != "USER"
            && cmd.command != "QUIT"
        {
            session.send_numeric(ERR_NOTREGISTERED, ":You have not registered");
            return;
        }

        match cmd.command.as_str() {
            "NICK" => self.handle_nick(session, cmd),
            "USER" => self.handle_user(session, cmd),
            "JOIN" => self.handle_join(session, cmd),
            "PART" => self.handle_part(session, cmd),
            "PRIVMSG" => self.handle_privmsg(session, cmd),
            "QUIT" => self.handle_quit(session, cmd),
            "PING" => self.handle_ping(session, cmd),
            "LIST" => self.handle_list(session),
            "NAMES" => self.handle_names(session, cmd),
            other => {
                session.send_numeric(ERR_UNKNOWNCOMMAND, &format!("{} :Unknown command", other));
            }
        }
    }

    fn handle_nick(&self, session: &Arc<Session>, cmd: &IrcCommand) {
        if cmd.params.is_empty() {
            session.send_numeric(ERR_NONICKNAMEGIVEN, ":No nickname given");
            return;
        }

        let new_nick = cmd.param(0);
        let old_nick = session.nickname();
        if !self.registry.claim_nickname(session.id(), &old_nick, new_nick) {
            session.send_numeric(
                ERR_NICKNAMEINUSE,
                &format!("{} :Nickname is already in use", new_nick),
            );
            return;
        }

        session.set_nickname(new_nick);
        self.check_authentication(session);
    }

    fn handle_user(&self, session: &Arc<Session>, cmd: &IrcCommand) {
        if session.is_authenticated() {
            session.send_numeric(ERR_ALREADYREGISTRED, ":You may not reregister");
            return;
        }
        if cmd.params.len() < 3 {
            session.send_numeric(ERR_NEEDMOREPARAMS, "USER :Not enough parameters");
            return;
        }

        let realname = if cmd.trailing.is_empty() {
            cmd.param(3)
        } else {
            cmd.trailing.as_str()
        };
        session.set_user_info(cmd.param(0), cmd.param(1), realname);
        self.check_authentication(session);
    }

    fn handle_join(&self, session: &Arc<Session>, cmd: &IrcCommand) {
        if cmd.params.is_empty() {
            session.send_numeric(ERR_NEEDMOREPARAMS, "JOIN :Not enough parameters");
            return;
        }

        for name in split_channels(cmd.param(0)) {
            if !message::is_valid_channel_name(&name) {
                session.send_numeric(ERR_NOSUCHCHANNEL, &format!("{} :No such channel", name));
                continue;
            }
            if name.starts_with(LOG_CHANNEL_PREFIX) && !self.channels.exists(&name) {
                session.send_numeric(
                    ERR_NOSUCHCHANNEL,
                    &format!("{} :Log channel does not exist", name),
                );
                continue;
            }
            self.channels.join(session, &name);
        }
    }

    fn handle_part(&self, session: &Arc<Session>, cmd: &IrcCommand) {
        if cmd.params.is_empty() {
            session.send_numeric(ERR_NEEDMOREPARAMS, "PART :Not enough parameters");
            return;
        }

        for name in split_channels(cmd.param(0)) {
            if !self.channels.exists(&name) {
                session.send_numeric(ERR_NOSUCHCHANNEL, &format!("{} :No such channel", name));
                continue;
            }
            if !session.is_in_channel(&name) {
                session.send_numeric(
                    ERR_NOTONCHANNEL,
                    &format!("{} :You're not on that channel", name),
                );
                continue;
            }
            // An absent reason stays absent
            self.channels.part(session, &name, &cmd.trailing);
        }
    }

    fn handle_privmsg(&self, session: &Arc<Session>, cmd: &IrcCommand) {
        if cmd.params.is_empty() {
            session.send_numeric(ERR_NORECIPIENT, ":No recipient given (PRIVMSG)");
            return;
        }
        if cmd.trailing.is_empty() && cmd.params.len() < 2 {
            session.send_numeric(ERR_NOTEXTTOSEND, ":No text to send");
            return;
        }

        let target = cmd.param(0);
        let text = if cmd.trailing.is_empty() {
            cmd.param(1)
        } else {
            cmd.trailing.as_str()
        };

        if target.starts_with('#') || target.starts_with('&') {
            let Some(channel) = self.channels.get(target) else {
                session.send_numeric(ERR_NOSUCHCHANNEL, &format!("{} :No such channel", target));
                return;
            };
            if !channel.has_member(&session.nickname()) {
                session.send_numeric(
                    ERR_CANNOTSENDTOCHAN,
                    &format!("{} :Cannot send to channel", target),
                );
                return;
            }
            self.channels.privmsg(session, target, text);
        } else {
            let Some(peer) = self.registry.get_by_nickname(target) else {
                session.send_numeric(ERR_NOSUCHNICK, &format!("{} :No such nick/channel", target));
                return;
            };
            peer.send(&message::format_user_message(
                &session.nickname(),
                &session.username(),
                &session.hostname(),
                "PRIVMSG",
                target,
                text,
            ));
        }
    }

    /// Broadcast the QUIT notice, leave every channel, and mark the session
    /// disconnected. Socket teardown is the reader task's job.
    pub fn handle_quit(&self, session: &Arc<Session>, cmd: &IrcCommand) {
        let reason = if cmd.trailing.is_empty() {
            "Client Quit"
        } else {
            cmd.trailing.as_str()
        };

        let notice = format!(":{} QUIT :{}", session.full_identifier(), reason);
        let nickname = session.nickname();
        for name in session.channels() {
            if let Some(channel) = self.channels.get(&name) {
                channel.broadcast_except(&notice, &nickname);
            }
        }

        self.channels.part_all(session, reason);
        session.set_state(SessionState::Disconnected);
    }

    fn handle_ping(&self, session: &Arc<Session>, cmd: &IrcCommand) {
        let token = if cmd.params.is_empty() {
            SERVER_NAME
        } else {
            cmd.param(0)
        };
        session.send(&format!(
            ":{} PONG {} :{}",
            SERVER_NAME, SERVER_NAME, token
        ));
    }

    fn handle_list(&self, session: &Arc<Session>) {
        for name in self.channels.names() {
            if let Some(channel) = self.channels.get(&name) {
                session.send(&format!(
                    "{} {} :{}",
                    channel.name(),
                    channel.member_count(),
                    channel.topic()
                ));
            }
        }
    }

    fn handle_names(&self, session: &Arc<Session>, cmd: &IrcCommand) {
        let names = if cmd.params.is_empty() {
            self.channels.names()
        } else {
            split_channels(cmd.param(0))
        };

        for name in names {
            if let Some(channel) = self.channels.get(&name) {
                let mut members = String::new();
                for nick in channel.member_nicknames() {
                    members.push_str(&nick);
                    members.push(' ');
                }
                session.send_numeric(RPL_NAMREPLY, &format!("= {} :{}", name, members));
                session.send_numeric(RPL_ENDOFNAMES, &format!("{} :End of /NAMES list.", name));
            }
        }
    }

    /// Promote to Authenticated and send the 001-004 welcome once both the
    /// nickname and username are set
    fn check_authentication(&self, session: &Arc<Session>) {
        if session.is_authenticated() {
            return;
        }
        if session.nickname().is_empty() || session.username().is_empty() {
            return;
        }

        session.set_state(SessionState::Authenticated);
        session.send_numeric(
            RPL_WELCOME,
            &format!(
                ":Welcome to the LogCaster IRC Network {}",
                session.full_identifier()
            ),
        );
        session.send_numeric(
            RPL_YOURHOST,
            &format!(
                ":Your host is {}, running version {}",
                SERVER_NAME, SERVER_VERSION
            ),
        );
        session.send_numeric(
            RPL_CREATED,
            &format!(":This server was created {}", self.server_created),
        );
        session.send_numeric(
            RPL_MYINFO,
            &format!("{} {} o o", SERVER_NAME, SERVER_VERSION),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use tokio::sync::mpsc;

    struct Fixture {
        handler: CommandHandler,
        registry: Arc<SessionRegistry>,
    }

    impl Fixture {
        fn new() -> Self {
            let registry = Arc::new(SessionRegistry::new());
            let channels = Arc::new(ChannelManager::new());
            channels.initialize_log_channels();
            Self {
                handler: CommandHandler::new(Arc::clone(&registry), channels),
                registry,
            }
        }

        fn session(&self, id: u64) -> (Arc<Session>, mpsc::UnboundedReceiver<String>) {
            let (tx, rx) = mpsc::unbounded_channel();
            let addr: SocketAddr = "127.0.0.1:50000".parse().unwrap();
            let session = Arc::new(Session::new(id, addr, tx));
            self.registry.add(Arc::clone(&session));
            (session, rx)
        }

        fn authenticate(
            &self,
            session: &Arc<Session>,
            rx: &mut mpsc::UnboundedReceiver<String>,
            nick: &str,
        ) {
            self.handler
                .handle(session, &IrcCommand::parse(&format!("NICK {}", nick)));
            self.handler
                .handle(session, &IrcCommand::parse(&format!("USER {} h s :{}", nick, nick)));
            while rx.try_recv().is_ok() {}
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(line) = rx.try_recv() {
            lines.push(line);
        }
        lines
    }

    #[test]
    fn test_gate_rejects_unregistered_commands() {
        let fx = Fixture::new();
        let (session, mut rx) = fx.session(1);

        fx.handler.handle(&session, &IrcCommand::parse("JOIN #logs-all"));
        let lines = drain(&mut rx);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains(" 451 "));
        assert!(!session.is_in_channel("#logs-all"));
    }

    #[test]
    fn test_registration_sends_welcome_in_order() {
        let fx = Fixture::new();
        let (session, mut rx) = fx.session(1);

        fx.handler.handle(&session, &IrcCommand::parse("NICK alice"));
        assert!(drain(&mut rx).is_empty());

        fx.handler
            .handle(&session, &IrcCommand::parse("USER alice host srv :Alice"));
        let lines = drain(&mut rx);
        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains(" 001 alice "));
        assert!(lines[0].contains("Welcome to the LogCaster IRC Network alice!alice@host"));
        assert!(lines[1].contains(" 002 alice "));
        assert!(lines[2].contains(" 003 alice "));
        assert!(lines[3].contains(" 004 alice "));
        assert!(session.is_authenticated());
    }

    #[test]
    fn test_nick_conflict_replies_433() {
        let fx = Fixture::new();
        let (alice, mut rx_a) = fx.session(1);
        fx.authenticate(&alice, &mut rx_a, "alice");

        let (imposter, mut rx_i) = fx.session(2);
        fx.handler.handle(&imposter, &IrcCommand::parse("NICK ALICE"));
        let lines = drain(&mut rx_i);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains(" 433 "));
        assert!(lines[0].contains("ALICE :Nickname is already in use"));
    }

    #[test]
    fn test_user_without_enough_params_replies_461() {
        let fx = Fixture::new();
        let (session, mut rx) = fx.session(1);
        fx.handler.handle(&session, &IrcCommand::parse("USER onlyone"));
        assert!(drain(&mut rx)[0].contains(" 461 "));
    }

    #[test]
    fn test_reregister_replies_462() {
        let fx = Fixture::new();
        let (session, mut rx) = fx.session(1);
        fx.authenticate(&session, &mut rx, "alice");

        fx.handler
            .handle(&session, &IrcCommand::parse("USER again h s :Again"));
        assert!(drain(&mut rx)[0].contains(" 462 "));
    }

    #[test]
    fn test_join_missing_log_channel_replies_403() {
        let fx = Fixture::new();
        let (session, mut rx) = fx.session(1);
        fx.authenticate(&session, &mut rx, "alice");

        fx.handler.handle(&session, &IrcCommand::parse("JOIN #logs-debug"));
        let lines = drain(&mut rx);
        assert!(lines[0].contains(" 403 "));
        assert!(lines[0].contains("Log channel does not exist"));
    }

    #[test]
    fn test_join_creates_and_replies_with_join_broadcast() {
        let fx = Fixture::new();
        let (session, mut rx) = fx.session(1);
        fx.authenticate(&session, &mut rx, "alice");

        fx.handler.handle(&session, &IrcCommand::parse("JOIN #dev"));
        let lines = drain(&mut rx);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with(":alice!alice@"));
        assert!(lines[0].contains(" JOIN :#dev"));
    }

    #[test]
    fn test_part_not_on_channel_replies_442() {
        let fx = Fixture::new();
        let (alice, mut rx_a) = fx.session(1);
        let (bob, mut rx_b) = fx.session(2);
        fx.authenticate(&alice, &mut rx_a, "alice");
        fx.authenticate(&bob, &mut rx_b, "bob");

        fx.handler.handle(&alice, &IrcCommand::parse("JOIN #dev"));
        drain(&mut rx_a);

        fx.handler.handle(&bob, &IrcCommand::parse("PART #dev"));
        assert!(drain(&mut rx_b)[0].contains(" 442 "));
    }

    #[test]
    fn test_privmsg_channel_requires_membership() {
        let fx = Fixture::new();
        let (alice, mut rx_a) = fx.session(1);
        let (bob, mut rx_b) = fx.session(2);
        fx.authenticate(&alice, &mut rx_a, "alice");
        fx.authenticate(&bob, &mut rx_b, "bob");

        fx.handler.handle(&alice, &IrcCommand::parse("JOIN #dev"));
        drain(&mut rx_a);

        fx.handler
            .handle(&bob, &IrcCommand::parse("PRIVMSG #dev :hi there"));
        assert!(drain(&mut rx_b)[0].contains(" 404 "));

        fx.handler.handle(&bob, &IrcCommand::parse("JOIN #dev"));
        drain(&mut rx_a);
        drain(&mut rx_b);

        fx.handler
            .handle(&bob, &IrcCommand::parse("PRIVMSG #dev :hi there"));
        let received = drain(&mut rx_a);
        assert_eq!(received.len(), 1);
        assert!(received[0].starts_with(":bob!bob@"));
        assert!(received[0].ends_with("PRIVMSG #dev :hi there\r\n"));
        // Sender does not hear their own message
        assert!(drain(&mut rx_b).is_empty());
    }

    #[test]
    fn test_privmsg_unknown_nick_replies_401() {
        let fx = Fixture::new();
        let (alice, mut rx) = fx.session(1);
        fx.authenticate(&alice, &mut rx, "alice");

        fx.handler
            .handle(&alice, &IrcCommand::parse("PRIVMSG ghost :anyone?"));
        assert!(drain(&mut rx)[0].contains(" 401 "));
    }

    #[test]
    fn test_privmsg_without_text_replies_412() {
        let fx = Fixture::new();
        let (alice, mut rx) = fx.session(1);
        fx.authenticate(&alice, &mut rx, "alice");

        fx.handler.handle(&alice, &IrcCommand::parse("PRIVMSG #dev"));
        assert!(drain(&mut rx)[0].contains(" 412 "));
    }

    #[test]
    fn test_quit_broadcasts_and_disconnects() {
        let fx = Fixture::new();
        let (alice, mut rx_a) = fx.session(1);
        let (bob, mut rx_b) = fx.session(2);
        fx.authenticate(&alice, &mut rx_a, "alice");
        fx.authenticate(&bob, &mut rx_b, "bob");
        fx.handler.handle(&alice, &IrcCommand::parse("JOIN #dev"));
        fx.handler.handle(&bob, &IrcCommand::parse("JOIN #dev"));
        drain(&mut rx_a);
        drain(&mut rx_b);

        fx.handler.handle(&alice, &IrcCommand::parse("QUIT :off to bed"));
        let bob_lines = drain(&mut rx_b);
        assert!(bob_lines.iter().any(|l| l.contains("QUIT :off to bed")));
        assert_eq!(alice.state(), SessionState::Disconnected);
        assert!(alice.channels().is_empty());
    }

    #[test]
    fn test_ping_pong() {
        let fx = Fixture::new();
        let (alice, mut rx) = fx.session(1);
        fx.authenticate(&alice, &mut rx, "alice");

        fx.handler.handle(&alice, &IrcCommand::parse("PING token123"));
        let lines = drain(&mut rx);
        assert_eq!(lines[0], ":logcaster-irc PONG logcaster-irc :token123\r\n");
    }

    #[test]
    fn test_unknown_command_replies_421() {
        let fx = Fixture::new();
        let (alice, mut rx) = fx.session(1);
        fx.authenticate(&alice, &mut rx, "alice");

        fx.handler.handle(&alice, &IrcCommand::parse("WALLOPS :hi"));
        let lines = drain(&mut rx);
        assert!(lines[0].contains(" 421 "));
        assert!(lines[0].contains("WALLOPS :Unknown command"));
    }

    #[test]
    fn test_names_lists_members() {
        let fx = Fixture::new();
        let (alice, mut rx) = fx.session(1);
        fx.authenticate(&alice, &mut rx, "alice");
        fx.handler.handle(&alice, &IrcCommand::parse("JOIN #dev"));
        drain(&mut rx);

        fx.handler.handle(&alice, &IrcCommand::parse("NAMES #dev"));
        let lines = drain(&mut rx);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains(" 353 alice = #dev :alice "));
        assert!(lines[1].contains(" 366 alice #dev :End of /NAMES list."));
    }

    #[test]
    fn test_list_shows_log_channels() {
        let fx = Fixture::new();
        let (alice, mut rx) = fx.session(1);
        fx.authenticate(&alice, &mut rx, "alice");

        fx.handler.handle(&alice, &IrcCommand::parse("LIST"));
        let lines = drain(&mut rx);
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().any(|l| l.starts_with("#logs-all 0 :All log messages")));
        assert!(lines.iter().any(|l| l.starts_with("#logs-error 0 :Error level logs only")));
    }
}
