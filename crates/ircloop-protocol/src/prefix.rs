//! Message prefix: `nickname [ [ "!" user ] "@" host ]` or a server name.

/// A prefix split into its parts. `user` and `host` are absent for server
/// prefixes and for bare nicks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prefix {
    pub nick: String,
    pub user: Option<String>,
    pub host: Option<String>,
}

impl Prefix {
    /// Splits a prefix (without the leading `:`).
    pub fn parse(prefix: &str) -> Self {
        let (front, host) = match prefix.split_once('@') {
            Some((front, host)) => (front, Some(host.to_owned())),
            None => (prefix, None),
        };
        let (nick, user) = match front.split_once('!') {
            Some((nick, user)) => (nick, Some(user.to_owned())),
            None => (front, None),
        };
        Self {
            nick: nick.to_owned(),
            user,
            host,
        }
    }

    /// Just the nick part, without allocating.
    pub fn nick_of(prefix: &str) -> &str {
        let end = prefix.find(['!', '@']).unwrap_or(prefix.len());
        &prefix[..end]
    }
}
