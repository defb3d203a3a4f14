//! IRC line grammar and reply formatting
//!
//! Grammar: `[":" prefix SP] command SP *param [SP ":" trailing]`. Commands are
//! uppercased during parsing; the trailing parameter is stored without its colon.

/// Numeric reply codes emitted by the server
pub mod numerics {
    /// Welcome to the network
    pub const RPL_WELCOME: u16 = 1;
    /// Host and version line
    pub const RPL_YOURHOST: u16 = 2;
    /// Server creation time
    pub const RPL_CREATED: u16 = 3;
    /// Server capabilities line
    pub const RPL_MYINFO: u16 = 4;
    /// NAMES list for one channel
    pub const RPL_NAMREPLY: u16 = 353;
    /// End of a NAMES list
    pub const RPL_ENDOFNAMES: u16 = 366;
    /// No such nickname
    pub const ERR_NOSUCHNICK: u16 = 401;
    /// No such channel
    pub const ERR_NOSUCHCHANNEL: u16 = 403;
    /// Cannot send to channel
    pub const ERR_CANNOTSENDTOCHAN: u16 = 404;
    /// No recipient given
    pub const ERR_NORECIPIENT: u16 = 411;
    /// No text to send
    pub const ERR_NOTEXTTOSEND: u16 = 412;
    /// Unknown command
    pub const ERR_UNKNOWNCOMMAND: u16 = 421;
    /// No nickname given
    pub const ERR_NONICKNAMEGIVEN: u16 = 431;
    /// Nickname already in use
    pub const ERR_NICKNAMEINUSE: u16 = 433;
    /// Not on that channel
    pub const ERR_NOTONCHANNEL: u16 = 442;
    /// Registration required
    pub const ERR_NOTREGISTERED: u16 = 451;
    /// Not enough parameters
    pub const ERR_NEEDMOREPARAMS: u16 = 461;
    /// Already registered
    pub const ERR_ALREADYREGISTRED: u16 = 462;
}

/// One parsed IRC line
#[derive(Debug, Clone, Default)]
pub struct IrcCommand {
    /// Optional source prefix, without the leading colon
    pub prefix: String,
    /// Command name, uppercased
    pub command: String,
    /// Positional parameters before the trailing parameter
    pub params: Vec<String>,
    /// Trailing parameter, without the leading colon
    pub trailing: String,
}

impl IrcCommand {
    /// Parse one line; trailing CR/LF is tolerated
    pub fn parse(line: &str) -> Self {
        let mut cmd = IrcCommand::default();
        let mut rest = line.trim_end_matches(['\r', '\n']);

        if rest.is_empty() {
            return cmd;
        }

        if let Some(stripped) = rest.strip_prefix(':') {
            match stripped.split_once(' ') {
                Some((prefix, remainder)) => {
                    cmd.prefix = prefix.to_string();
                    rest = remainder;
                }
                None => return cmd,
            }
        }

        let (command, mut rest) = match rest.split_once(' ') {
            Some((command, remainder)) => (command, remainder),
            None => (rest, ""),
        };
        cmd.command = command.to_ascii_uppercase();

        while !rest.is_empty() {
            if let Some(trailing) = rest.strip_prefix(':') {
                cmd.trailing = trailing.to_string();
                break;
            }
            match rest.split_once(' ') {
                Some((param, remainder)) => {
                    if !param.is_empty() {
                        cmd.params.push(param.to_string());
                    }
                    rest = remainder;
                }
                None => {
                    cmd.params.push(rest.to_string());
                    break;
                }
            }
        }

        cmd
    }

    /// Positional parameter by index, or empty string
    pub fn param(&self, index: usize) -> &str {
        self.params.get(index).map(String::as_str).unwrap_or("")
    }
}

/// Format a numeric reply: `:server 001 nick params`
pub fn format_reply(server_name: &str, nick: &str, code: u16, params: &str) -> String {
    format!(":{} {:03} {} {}", server_name, code, nick, params)
}

/// Format a user-sourced message: `:nick!user@host CMD target [:message]`
pub fn format_user_message(
    nick: &str,
    user: &str,
    host: &str,
    command: &str,
    target: &str,
    message: &str,
) -> String {
    if message.is_empty() {
        format!(":{}!{}@{} {} {}", nick, user, host, command, target)
    } else {
        format!(":{}!{}@{} {} {} :{}", nick, user, host, command, target, message)
    }
}

/// Split a comma-separated channel list, dropping empty segments
pub fn split_channels(list: &str) -> Vec<String> {
    list.split(',')
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Whether `name` is a syntactically valid channel name: leading `#` or `&`, at
/// most 50 bytes, no space, comma, BEL, or control characters
pub fn is_valid_channel_name(name: &str) -> bool {
    if name.is_empty() || name.len() > 50 {
        return false;
    }
    if !name.starts_with('#') && !name.starts_with('&') {
        return false;
    }
    name.chars().all(|c| c != ' ' && c != ',' && c != '\x07' && c >= ' ')
}
