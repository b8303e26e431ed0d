//! Joined-channel state for ircloop.
//!
//! Tracks, for every channel the client is in, who else is there, who has
//! op or voice, and the topic. The dispatcher is the only writer.
//!
//! # Key types
//!
//! - [`ChannelRegistry`]: all joined channels
//! - [`ChannelInfo`]: one channel's topic and members
//! - [`MemberStatus`]: a member's op/voice flags

mod info;
mod registry;

pub use info::{ChannelInfo, MemberStatus};
pub use registry::ChannelRegistry;
