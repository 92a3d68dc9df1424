//! IRC line parsing
//!
//! ```text
//! [@tags ][:prefix ]COMMAND[ param ...][ :trailing]
//! ```
//!
//! IRCv3 tags are skipped; nothing downstream uses them.

use crate::protocol::Message;

/// One parsed IRC line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrcLine {
    /// Source (`nick!user@host` or a server name)
    pub prefix: Option<String>,

    /// Command or numeric, uppercased
    pub command: String,

    /// Parameters, trailing one last
    pub params: Vec<String>,
}

impl IrcLine {
    /// Parse a line without its terminator; `None` if there is no command
    pub fn parse(line: &str) -> Option<Self> {
        let mut rest = line;

        if rest.starts_with('@') {
            let (_, after) = rest.split_once(' ')?;
            rest = after.trim_start_matches(' ');
        }

        let mut prefix = None;
        if let Some(stripped) = rest.strip_prefix(':') {
            let (source, after) = stripped.split_once(' ')?;
            prefix = Some(source.to_string());
            rest = after.trim_start_matches(' ');
        }

        let (command, mut params_str) = match rest.split_once(' ') {
            Some((command, after)) => (command, after),
            None => (rest, ""),
        };
        if command.is_empty() {
            return None;
        }

        let mut params = Vec::new();
        loop {
            params_str = params_str.trim_start_matches(' ');
            if params_str.is_empty() {
                break;
            }
            if let Some(trailing) = params_str.strip_prefix(':') {
                params.push(trailing.to_string());
                break;
            }
            match params_str.split_once(' ') {
                Some((param, after)) => {
                    params.push(param.to_string());
                    params_str = after;
                }
                None => {
                    params.push(params_str.to_string());
                    break;
                }
            }
        }

        Some(Self {
            prefix,
            command: command.to_ascii_uppercase(),
            params,
        })
    }

    /// Nick part of the prefix, or the whole prefix for server sources
    pub fn nick(&self) -> &str {
        match &self.prefix {
            Some(prefix) => prefix.split('!').next().unwrap_or(prefix.as_str()),
            None => "",
        }
    }

    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    /// Channel name of the first parameter, without its `#`
    fn channel(&self) -> Option<&str> {
        self.param(0)?.strip_prefix('#').filter(|c| !c.is_empty())
    }

    /// Convert a channel-scoped line into a chat message
    ///
    /// `PRIVMSG` becomes a chat message; `NOTICE`, `USERNOTICE` and
    /// `CLEARCHAT` become notices. Anything else, and lines not addressed to
    /// a channel, yield `None`.
    pub fn to_message(&self) -> Option<Message> {
        let channel = self.channel()?;
        let text = self.param(1).unwrap_or_default();

        match self.command.as_str() {
            "PRIVMSG" => Some(Message::chat(channel, self.nick(), text)),
            "NOTICE" | "USERNOTICE" | "CLEARCHAT" => {
                Some(Message::notice(channel, self.nick(), text))
            }
            _ => None,
        }
    }
}

/// Wire form of a `JOIN`; Twitch only knows lowercase channel names
pub fn join_line(channel: &str) -> String {
    format!("JOIN #{}", channel.to_lowercase())
}

/// Wire form of a `PART`
pub fn part_line(channel: &str) -> String {
    format!("PART #{}", channel.to_lowercase())
}

/// Wire form of a `PRIVMSG`
pub fn privmsg_line(channel: &str, text: &str) -> String {
    format!("PRIVMSG #{} :{}", channel, text)
}

/// Reply to a `PING`
pub fn pong_line(ping: &IrcLine) -> String {
    match ping.param(0) {
        Some(token) => format!("PONG :{}", token),
        None => "PONG".to_string(),
    }
}
