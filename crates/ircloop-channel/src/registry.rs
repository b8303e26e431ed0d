//! The channel registry: one [`ChannelInfo`] per joined channel.
//!
//! The registry only stores state. Deciding *which* update a message
//! implies (and whether it concerns the local user) is the dispatcher's
//! job; every method here is a single, self-contained change.

use std::collections::HashMap;

use ircloop_protocol::{ChannelModes, MemberFlag, Nick, irc_to_lower};
use tracing::{debug, trace};

use crate::{ChannelInfo, MemberStatus};

/// All channels the client is currently joined to.
///
/// Channel names are keyed by their case-folded form, so `#Rust` and
/// `#rust` are the same channel. The server's channel mode table lives
/// here too, since NAMES and MODE parsing depend on it.
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    channels: HashMap<String, ChannelInfo>,
    modes: ChannelModes,
}

impl ChannelRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    // -- Channel lifecycle --------------------------------------------------

    /// The local user joined `name`. Returns `false` if it was already
    /// tracked, in which case the existing state is kept.
    pub fn join_self(&mut self, name: &str) -> bool {
        let key = irc_to_lower(name);
        if self.channels.contains_key(&key) {
            return false;
        }
        self.channels.insert(key, ChannelInfo::new(name));
        debug!(channel = name, "channel joined");
        true
    }

    /// The local user left or was kicked from `name`; drops all its state.
    pub fn remove_channel(&mut self, name: &str) -> Option<ChannelInfo> {
        let removed = self.channels.remove(&irc_to_lower(name));
        if removed.is_some() {
            debug!(channel = name, "channel left");
        }
        removed
    }

    /// Forgets every channel and the server's mode table. Used when the
    /// connection drops.
    pub fn clear(&mut self) {
        self.channels.clear();
        self.modes = ChannelModes::default();
    }

    /// The channel modes the current server supports.
    pub fn modes(&self) -> &ChannelModes {
        &self.modes
    }

    /// Applies an ISUPPORT (005) reply to the mode table.
    pub fn apply_isupport(&mut self, params: &[String]) {
        self.modes.apply_isupport(params);
    }

    // -- Membership ---------------------------------------------------------

    /// Adds `nick` with no flags. An existing member keeps its flags.
    ///
    /// Returns `false` if the channel isn't tracked.
    pub fn add_member(&mut self, channel: &str, nick: &str) -> bool {
        let Some(info) = self.channel_mut(channel) else {
            return false;
        };
        info.members.entry(Nick::from(nick)).or_default();
        trace!(channel, nick, "member added");
        true
    }

    /// Removes `nick` from `channel`. Returns whether it was a member.
    pub fn remove_member(&mut self, channel: &str, nick: &str) -> bool {
        self.channel_mut(channel)
            .is_some_and(|info| info.members.remove(&Nick::from(nick)).is_some())
    }

    /// Removes `nick` from every channel. Returns the names of the
    /// channels it was in.
    pub fn quit(&mut self, nick: &str) -> Vec<String> {
        let key = Nick::from(nick);
        let mut left = Vec::new();
        for info in self.channels.values_mut() {
            if info.members.remove(&key).is_some() {
                left.push(info.name.clone());
            }
        }
        left
    }

    /// Renames `old` to `new` in every channel, keeping its flags.
    /// Returns the names of the channels that were updated.
    pub fn rename(&mut self, old: &str, new: &str) -> Vec<String> {
        let old_key = Nick::from(old);
        let mut renamed = Vec::new();
        for info in self.channels.values_mut() {
            if let Some(status) = info.members.remove(&old_key) {
                info.members.insert(Nick::from(new), status);
                renamed.push(info.name.clone());
            }
        }
        renamed
    }

    /// Sets or clears `flag` on a member. Returns `false` if the channel
    /// or the member is unknown.
    pub fn set_flag(&mut self, channel: &str, nick: &str, flag: MemberFlag, enabled: bool) -> bool {
        let Some(info) = self.channel_mut(channel) else {
            return false;
        };
        match info.members.get_mut(&Nick::from(nick)) {
            Some(status) => {
                status.set(flag, enabled);
                true
            }
            None => false,
        }
    }

    /// Replaces the topic. `None` or an empty string clears it.
    pub fn set_topic(&mut self, channel: &str, topic: Option<&str>) -> bool {
        let Some(info) = self.channel_mut(channel) else {
            return false;
        };
        info.topic = topic.filter(|t| !t.is_empty()).map(str::to_owned);
        true
    }

    /// Applies one RPL_NAMREPLY batch: a space-separated list of nicks,
    /// each optionally carrying membership prefixes such as `~&@%+`.
    ///
    /// Every prefix is stripped from the stored nick; only the ones that
    /// map to `o` and `v` set flags. Returns how many members were listed,
    /// or 0 if the channel isn't tracked.
    pub fn add_names(&mut self, channel: &str, names: &str) -> usize {
        let key = irc_to_lower(channel);
        let Some(info) = self.channels.get_mut(&key) else {
            debug!(channel, "names for unknown channel");
            return 0;
        };
        let mut count = 0;
        for entry in names.split(' ').filter(|e| !e.is_empty()) {
            let (prefixes, nick) = self.modes.split_names_entry(entry);
            if nick.is_empty() {
                continue;
            }
            let status = info.members.entry(Nick::from(nick)).or_default();
            for symbol in prefixes.chars() {
                let flag = self
                    .modes
                    .prefix_mode(symbol)
                    .and_then(MemberFlag::from_letter);
                if let Some(flag) = flag {
                    status.set(flag, true);
                }
            }
            count += 1;
        }
        count
    }

    // -- Lookups ------------------------------------------------------------

    /// The state of `name`, if joined.
    pub fn channel(&self, name: &str) -> Option<&ChannelInfo> {
        self.channels.get(&irc_to_lower(name))
    }

    /// Every joined channel, in no particular order.
    pub fn channels(&self) -> impl Iterator<Item = &ChannelInfo> {
        self.channels.values()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.channels.contains_key(&irc_to_lower(name))
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Status of `nick` in `channel`.
    pub fn member(&self, channel: &str, nick: &str) -> Option<MemberStatus> {
        self.channel(channel)?.member(nick)
    }

    fn channel_mut(&mut self, name: &str) -> Option<&mut ChannelInfo> {
        self.channels.get_mut(&irc_to_lower(name))
    }
}
