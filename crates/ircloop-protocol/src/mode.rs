//! Channel mode strings: `MODE #chan +ov-v alice bob carol`.
//!
//! Which letters take an argument depends on the server. [`ChannelModes`]
//! starts from the RFC 2811 set and is updated from the `PREFIX` and
//! `CHANMODES` tokens of the ISUPPORT (005) reply.

use std::fmt;

use tracing::{debug, warn};

/// Per-member privilege flags the client tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberFlag {
    /// Channel operator (`o`, shown as `@`).
    Op,
    /// Voice (`v`, shown as `+`).
    Voice,
}

impl MemberFlag {
    /// The mode letter.
    pub fn letter(self) -> char {
        match self {
            Self::Op => 'o',
            Self::Voice => 'v',
        }
    }

    /// The flag for a mode letter, if it is one we track.
    pub fn from_letter(c: char) -> Option<Self> {
        match c {
            'o' => Some(Self::Op),
            'v' => Some(Self::Voice),
            _ => None,
        }
    }
}

/// A single `+x` / `-x` change with its argument, if it takes one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeChange {
    pub added: bool,
    pub mode: char,
    pub arg: Option<String>,
}

impl ModeChange {
    /// Splits a channel mode string using the RFC 2811 mode set.
    ///
    /// See [`ModeChange::parse_channel_with`].
    pub fn parse_channel(pieces: &[String]) -> Vec<Self> {
        Self::parse_channel_with(pieces, &ChannelModes::default())
    }

    /// Splits a channel mode string and its arguments into single changes.
    ///
    /// `pieces[0]` is the mode string, the rest are arguments consumed in
    /// order by the letters `modes` says take one. Letters the client
    /// doesn't know take no argument. A missing argument leaves `arg`
    /// empty rather than failing, since servers echo list queries like
    /// `+b` without one.
    pub fn parse_channel_with(pieces: &[String], modes: &ChannelModes) -> Vec<Self> {
        let Some((mode_str, args)) = pieces.split_first() else {
            return Vec::new();
        };
        let mut args = args.iter();
        let mut added = true;
        let mut changes = Vec::new();

        for c in mode_str.chars() {
            match c {
                '+' => added = true,
                '-' => added = false,
                _ => {
                    let arg = if modes.takes_arg(c, added) {
                        args.next().cloned()
                    } else {
                        None
                    };
                    changes.push(Self {
                        added,
                        mode: c,
                        arg,
                    });
                }
            }
        }
        changes
    }

    /// The member flag this change toggles, if any.
    pub fn member_flag(&self) -> Option<MemberFlag> {
        MemberFlag::from_letter(self.mode)
    }
}

impl fmt::Display for ModeChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.added { '+' } else { '-' };
        match &self.arg {
            Some(arg) => write!(f, "{sign}{} {arg}", self.mode),
            None => write!(f, "{sign}{}", self.mode),
        }
    }
}

/// Membership prefix symbols seen in NAMES replies across common servers.
///
/// Nicknames can't start with any of them, so they are always safe to
/// strip even before the server has advertised its own `PREFIX`.
const COMMON_PREFIX_SYMBOLS: &[char] = &['~', '&', '@', '%', '+', '!'];

/// The channel modes a server supports, grouped by how they take
/// arguments.
///
/// The default is the RFC 2811 set: `O o v` are membership modes,
/// `b e I` lists, `k` always takes a key and `l` a limit only when set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelModes {
    /// `(mode, symbol)` pairs from `PREFIX`, highest rank first. A mode
    /// with no NAMES symbol (RFC 2811 `O`) uses `'\0'`.
    prefix: Vec<(char, char)>,
    /// `CHANMODES` type A: list modes, argument on set and unset.
    list: String,
    /// `CHANMODES` type B: always an argument.
    always: String,
    /// `CHANMODES` type C: argument only when set. Type D letters and
    /// unknown ones never take an argument.
    when_set: String,
}

impl Default for ChannelModes {
    fn default() -> Self {
        Self {
            prefix: vec![('O', '\0'), ('o', '@'), ('v', '+')],
            list: "beI".to_owned(),
            always: "k".to_owned(),
            when_set: "l".to_owned(),
        }
    }
}

impl ChannelModes {
    /// Whether `mode` consumes an argument when `added` (or removed).
    pub fn takes_arg(&self, mode: char, added: bool) -> bool {
        if self.prefix.iter().any(|&(m, _)| m == mode)
            || self.list.contains(mode)
            || self.always.contains(mode)
        {
            return true;
        }
        added && self.when_set.contains(mode)
    }

    /// The membership mode letter for a NAMES prefix symbol.
    pub fn prefix_mode(&self, symbol: char) -> Option<char> {
        self.prefix
            .iter()
            .find(|&&(_, s)| s == symbol && s != '\0')
            .map(|&(m, _)| m)
    }

    /// Whether `c` is a membership prefix symbol in a NAMES entry.
    pub fn is_prefix_symbol(&self, c: char) -> bool {
        COMMON_PREFIX_SYMBOLS.contains(&c) || self.prefix_mode(c).is_some()
    }

    /// Splits a NAMES entry such as `@+alice` into its prefix symbols and
    /// the bare nick.
    pub fn split_names_entry<'a>(&self, entry: &'a str) -> (&'a str, &'a str) {
        let nick = entry.trim_start_matches(|c: char| self.is_prefix_symbol(c));
        (&entry[..entry.len() - nick.len()], nick)
    }

    /// Applies the parameters of an ISUPPORT (005) reply.
    ///
    /// Only `PREFIX` and `CHANMODES` matter here; other tokens, the
    /// leading target nick and the trailing text are ignored. Malformed
    /// values are logged and leave the current table in place.
    pub fn apply_isupport(&mut self, params: &[String]) {
        for token in params {
            if let Some(value) = token.strip_prefix("PREFIX=") {
                match parse_prefix(value) {
                    Some(prefix) => {
                        debug!(%value, "server membership modes");
                        self.prefix = prefix;
                    }
                    None => warn!(%value, "ignoring malformed PREFIX token"),
                }
            } else if let Some(value) = token.strip_prefix("CHANMODES=") {
                let groups: Vec<&str> = value.split(',').collect();
                match groups.as_slice() {
                    [list, always, when_set, _, ..] => {
                        debug!(%value, "server channel modes");
                        self.list = (*list).to_owned();
                        self.always = (*always).to_owned();
                        self.when_set = (*when_set).to_owned();
                    }
                    _ => warn!(%value, "ignoring malformed CHANMODES token"),
                }
            }
        }
    }
}

/// Parses `(qaohv)~&@%+` into mode/symbol pairs. An empty value means the
/// server has no membership prefixes.
fn parse_prefix(value: &str) -> Option<Vec<(char, char)>> {
    if value.is_empty() {
        return Some(Vec::new());
    }
    let (modes, symbols) = value.strip_prefix('(')?.split_once(')')?;
    if modes.chars().count() != symbols.chars().count() {
        return None;
    }
    Some(modes.chars().zip(symbols.chars()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pieces(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_mixed_signs_consume_args_in_order() {
        let changes = ModeChange::parse_channel(&pieces(&["+ov-v", "alice", "bob", "carol"]));
        assert_eq!(changes.len(), 3);
        assert_eq!(changes[0], ModeChange { added: true, mode: 'o', arg: Some("alice".into()) });
        assert_eq!(changes[1], ModeChange { added: true, mode: 'v', arg: Some("bob".into()) });
        assert_eq!(changes[2], ModeChange { added: false, mode: 'v', arg: Some("carol".into()) });
        assert_eq!(changes[0].member_flag(), Some(MemberFlag::Op));
    }

    #[test]
    fn test_limit_takes_arg_only_when_added() {
        let changes = ModeChange::parse_channel(&pieces(&["+l-l", "10"]));
        assert_eq!(changes[0].arg.as_deref(), Some("10"));
        assert_eq!(changes[1].arg, None);
    }

    #[test]
    fn test_flag_modes_without_args() {
        let changes = ModeChange::parse_channel(&pieces(&["+nt-m"]));
        assert_eq!(
            changes.iter().map(|c| c.to_string()).collect::<Vec<_>>(),
            vec!["+n", "+t", "-m"]
        );
        assert!(changes.iter().all(|c| c.member_flag().is_none()));
    }

    #[test]
    fn test_list_query_without_arg() {
        let changes = ModeChange::parse_channel(&pieces(&["+b"]));
        assert_eq!(changes, vec![ModeChange { added: true, mode: 'b', arg: None }]);
    }

    #[test]
    fn test_creator_mode_takes_nick() {
        let changes = ModeChange::parse_channel(&pieces(&["+Ov", "alice", "bob"]));
        assert_eq!(changes[0], ModeChange { added: true, mode: 'O', arg: Some("alice".into()) });
        assert_eq!(changes[1], ModeChange { added: true, mode: 'v', arg: Some("bob".into()) });
        assert_eq!(changes[1].member_flag(), Some(MemberFlag::Voice));
    }

    #[test]
    fn test_isupport_prefix_modes_take_args() {
        let mut modes = ChannelModes::default();
        modes.apply_isupport(&pieces(&[
            "fred",
            "PREFIX=(qaohv)~&@%+",
            "CHANMODES=beI,k,l,imnpst",
            "NETWORK=Test",
            "are supported by this server",
        ]));
        let changes = ModeChange::parse_channel_with(
            &pieces(&["+qhov", "owner", "half", "alice", "bob"]),
            &modes,
        );
        let args: Vec<_> = changes.iter().map(|c| c.arg.as_deref()).collect();
        assert_eq!(args, vec![Some("owner"), Some("half"), Some("alice"), Some("bob")]);
        assert_eq!(changes[2].member_flag(), Some(MemberFlag::Op));
        assert_eq!(modes.prefix_mode('%'), Some('h'));
    }

    #[test]
    fn test_isupport_chanmodes_groups() {
        let mut modes = ChannelModes::default();
        modes.apply_isupport(&pieces(&["CHANMODES=beIq,k,fl,imnpst"]));
        assert!(modes.takes_arg('q', false));
        assert!(modes.takes_arg('f', true) && !modes.takes_arg('f', false));
        assert!(!modes.takes_arg('m', true));
    }

    #[test]
    fn test_malformed_isupport_is_ignored() {
        let mut modes = ChannelModes::default();
        modes.apply_isupport(&pieces(&["PREFIX=(ov)@", "CHANMODES=b,k"]));
        assert_eq!(modes, ChannelModes::default());
    }

    #[test]
    fn test_split_names_entry() {
        let modes = ChannelModes::default();
        assert_eq!(modes.split_names_entry("@+alice"), ("@+", "alice"));
        assert_eq!(modes.split_names_entry("~owner"), ("~", "owner"));
        assert_eq!(modes.split_names_entry("bob"), ("", "bob"));
        assert_eq!(modes.prefix_mode('@'), Some('o'));
        assert_eq!(modes.prefix_mode('~'), None);
    }

    #[test]
    fn test_empty_input() {
        assert!(ModeChange::parse_channel(&[]).is_empty());
    }
}
