//! Message targets (`msgtarget` in RFC 2812 §2.3.1).
//!
//! A PRIVMSG or NOTICE can be addressed to several comma-separated targets,
//! each of which is a channel, a nick, a `user[%host]@server` address or a
//! server/host mask. The dispatcher only routes channels and nicks, but the
//! other forms are recognised so they are not mistaken for nicks.

/// One entry of a comma-separated target list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageTarget {
    /// `#chan`, `&chan`, `+chan` or `!chan`.
    Channel(String),
    /// A plain nick, or `nick!user@host`.
    Nick {
        nick: String,
        user: Option<String>,
        host: Option<String>,
    },
    /// `user[%host]@server` or `user%host`.
    User {
        user: String,
        host: Option<String>,
        server: Option<String>,
    },
    /// `$mask`, or a `#` host mask with a wildcard (opers only).
    Mask(String),
}

/// Whether `name` starts with one of the channel prefixes.
pub fn is_channel_name(name: &str) -> bool {
    name.starts_with(['#', '&', '+', '!'])
}

impl MessageTarget {
    /// Parses a single `msgto`.
    pub fn parse(msgto: &str) -> Self {
        if msgto.starts_with('$') || (msgto.starts_with('#') && looks_like_mask(msgto)) {
            return Self::Mask(msgto.to_owned());
        }
        if is_channel_name(msgto) {
            return Self::Channel(msgto.to_owned());
        }

        if let Some((front, server)) = msgto.split_once('@') {
            if let Some((nick, user)) = front.split_once('!') {
                return Self::Nick {
                    nick: nick.to_owned(),
                    user: Some(user.to_owned()),
                    host: Some(server.to_owned()),
                };
            }
            let (user, host) = split_percent(front);
            return Self::User {
                user,
                host,
                server: Some(server.to_owned()),
            };
        }
        if msgto.contains('%') {
            let (user, host) = split_percent(msgto);
            return Self::User {
                user,
                host,
                server: None,
            };
        }

        Self::Nick {
            nick: msgto.to_owned(),
            user: None,
            host: None,
        }
    }

    /// Parses a comma-separated list, skipping empty entries.
    pub fn parse_list(targets: &str) -> Vec<Self> {
        targets
            .split(',')
            .filter(|t| !t.is_empty())
            .map(Self::parse)
            .collect()
    }

    /// The channel name, if this target is a channel.
    pub fn channel(&self) -> Option<&str> {
        match self {
            Self::Channel(name) => Some(name),
            _ => None,
        }
    }

    /// The nick, if this target names a user by nick.
    pub fn nick(&self) -> Option<&str> {
        match self {
            Self::Nick { nick, .. } => Some(nick),
            _ => None,
        }
    }
}

// `#*.edu` is a host mask; `#rust.lang` without a wildcard stays a channel.
fn looks_like_mask(s: &str) -> bool {
    s.contains('.') && s.contains(['*', '?'])
}

fn split_percent(s: &str) -> (String, Option<String>) {
    match s.split_once('%') {
        Some((user, host)) => (user.to_owned(), Some(host.to_owned())),
        None => (s.to_owned(), None),
    }
}
