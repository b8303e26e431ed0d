//! Outgoing commands.
//!
//! Everything the client writes to the socket is built here, so every line
//! goes through the same checks: no CR, LF or NUL anywhere, no spaces in
//! word parameters, and nothing longer than the line limit.

use crate::{Message, ModeChange, ProtocolError};

/// A command the client sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Nick(String),
    User {
        user: String,
        realname: String,
    },
    Join {
        channel: String,
        key: Option<String>,
    },
    Part {
        channel: String,
        message: Option<String>,
    },
    Privmsg {
        target: String,
        text: String,
    },
    Notice {
        target: String,
        text: String,
    },
    Quit(Option<String>),
    Pong(String),
    Kick {
        channel: String,
        nick: String,
        reason: Option<String>,
    },
    Mode {
        channel: String,
        change: ModeChange,
    },
    Topic {
        channel: String,
        topic: String,
    },
}

impl Command {
    /// Builds the wire message, validating every parameter.
    pub fn to_message(&self) -> Result<Message, ProtocolError> {
        let (command, params) = match self {
            Self::Nick(nick) => ("NICK", vec![word(nick)?]),
            // Mode 0, unused field "*" (RFC 2812 §3.1.3).
            Self::User { user, realname } => (
                "USER",
                vec![word(user)?, "0".to_owned(), "*".to_owned(), text(realname)?],
            ),
            Self::Join { channel, key } => {
                let mut params = vec![word(channel)?];
                if let Some(key) = key {
                    params.push(word(key)?);
                }
                ("JOIN", params)
            }
            Self::Part { channel, message } => {
                let mut params = vec![word(channel)?];
                if let Some(message) = message {
                    params.push(text(message)?);
                }
                ("PART", params)
            }
            Self::Privmsg { target, text: body } => ("PRIVMSG", vec![word(target)?, text(body)?]),
            Self::Notice { target, text: body } => ("NOTICE", vec![word(target)?, text(body)?]),
            Self::Quit(message) => ("QUIT", message.iter().map(|m| text(m)).collect::<Result<Vec<_>, _>>()?),
            Self::Pong(server) => ("PONG", vec![text(server)?]),
            Self::Kick {
                channel,
                nick,
                reason,
            } => {
                let mut params = vec![word(channel)?, word(nick)?];
                if let Some(reason) = reason {
                    params.push(text(reason)?);
                }
                ("KICK", params)
            }
            Self::Mode { channel, change } => {
                let sign = if change.added { '+' } else { '-' };
                let mut params = vec![word(channel)?, word(&format!("{sign}{}", change.mode))?];
                if let Some(arg) = &change.arg {
                    params.push(word(arg)?);
                }
                ("MODE", params)
            }
            Self::Topic { channel, topic } => ("TOPIC", vec![word(channel)?, text(topic)?]),
        };
        Ok(Message::new(command, params))
    }

    /// Serializes to a `\r\n`-terminated line no longer than `max_len`.
    pub fn encode(&self, max_len: usize) -> Result<String, ProtocolError> {
        let line = self.to_message()?.to_string();
        if line.len() + 2 > max_len {
            return Err(ProtocolError::LineTooLong { limit: max_len });
        }
        Ok(format!("{line}\r\n"))
    }
}

fn text(s: &str) -> Result<String, ProtocolError> {
    if let Some(c) = s.chars().find(|c| matches!(c, '\r' | '\n' | '\0')) {
        return Err(ProtocolError::InvalidParameter(format!(
            "{s:?} contains forbidden character {c:?}"
        )));
    }
    Ok(s.to_owned())
}

fn word(s: &str) -> Result<String, ProtocolError> {
    if s.is_empty() {
        return Err(ProtocolError::InvalidParameter("empty parameter".to_owned()));
    }
    if s.contains(' ') || s.starts_with(':') {
        return Err(ProtocolError::InvalidParameter(format!(
            "{s:?} must be a single word"
        )));
    }
    text(s)
}
