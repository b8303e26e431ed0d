//! Per-channel state: topic and members with their flags.

use std::collections::HashMap;

use ircloop_protocol::{MemberFlag, Nick};

/// A member's privileges in one channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemberStatus {
    pub op: bool,
    pub voice: bool,
}

impl MemberStatus {
    /// Sets or clears one flag.
    pub fn set(&mut self, flag: MemberFlag, enabled: bool) {
        match flag {
            MemberFlag::Op => self.op = enabled,
            MemberFlag::Voice => self.voice = enabled,
        }
    }

    /// Whether `flag` is set.
    pub fn has(&self, flag: MemberFlag) -> bool {
        match flag {
            MemberFlag::Op => self.op,
            MemberFlag::Voice => self.voice,
        }
    }
}

/// A channel the client is joined to.
///
/// Member nicks compare with RFC 1459 case mapping, so `member("BOB")`
/// finds `bob`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub(crate) name: String,
    pub(crate) topic: Option<String>,
    pub(crate) members: HashMap<Nick, MemberStatus>,
}

impl ChannelInfo {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            topic: None,
            members: HashMap::new(),
        }
    }

    /// The channel name as it was first seen.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    /// All members, in no particular order.
    pub fn members(&self) -> impl Iterator<Item = (&Nick, &MemberStatus)> {
        self.members.iter()
    }

    /// Status of `nick`, if present.
    pub fn member(&self, nick: &str) -> Option<MemberStatus> {
        self.members.get(&Nick::from(nick)).copied()
    }

    pub fn contains(&self, nick: &str) -> bool {
        self.members.contains_key(&Nick::from(nick))
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_op(&self, nick: &str) -> bool {
        self.member(nick).is_some_and(|m| m.op)
    }

    pub fn has_voice(&self, nick: &str) -> bool {
        self.member(nick).is_some_and(|m| m.voice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_status_flags() {
        let mut s = MemberStatus::default();
        s.set(MemberFlag::Op, true);
        assert!(s.has(MemberFlag::Op));
        assert!(!s.has(MemberFlag::Voice));
        s.set(MemberFlag::Op, false);
        assert_eq!(s, MemberStatus::default());
    }

    #[test]
    fn test_member_lookup_is_case_insensitive() {
        let mut info = ChannelInfo::new("#Rust");
        info.members.insert(
            Nick::from("Bob[away]"),
            MemberStatus {
                op: true,
                voice: false,
            },
        );
        assert!(info.contains("bob{AWAY}"));
        assert!(info.is_op("BOB[AWAY]"));
        assert!(!info.has_voice("bob[away]"));
        assert_eq!(info.name(), "#Rust");
    }
}
