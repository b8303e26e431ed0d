//! Wire protocol for ircloop.
//!
//! This crate knows how IRC lines look and nothing else:
//!
//! - **Framing** ([`LineFramer`]): socket bytes in, complete lines out.
//! - **Messages** ([`Message`], [`Prefix`], [`MessageTarget`],
//!   [`ModeChange`], [`ChannelModes`]): one line parsed into its parts,
//!   and back.
//! - **Numerics** ([`Numeric`], [`ErrorReply`]): reply codes, with the
//!   error codes decoded into typed fields.
//! - **Commands** ([`Command`]): validated outgoing lines.
//! - **Case mapping** ([`Nick`], [`irc_eq`]): RFC 1459 comparisons.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and the dispatcher
//! (events). It has no notion of connections, sessions or channels.
//!
//! ```text
//! Transport (bytes) → Protocol (Message) → Dispatcher (events + state)
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod casemap;
mod command;
mod error;
mod framer;
mod message;
mod mode;
mod numeric;
mod prefix;
mod target;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use casemap::{Nick, irc_eq, irc_lower_char, irc_to_lower};
pub use command::Command;
pub use error::ProtocolError;
pub use framer::{DEFAULT_MAX_LINE_LEN, LineFramer, Lines};
pub use message::Message;
pub use mode::{ChannelModes, MemberFlag, ModeChange};
pub use numeric::{ErrorReply, Numeric};
pub use prefix::Prefix;
pub use target::{MessageTarget, is_channel_name};
