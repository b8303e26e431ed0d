//! The parsed form of one protocol line.
//!
//! Grammar (RFC 2812 §2.3.1, without tags):
//!
//! ```text
//! message  =  [ ":" prefix SPACE ] command [ params ]
//! command  =  1*letter / 3digit
//! params   =  *( SPACE middle ) [ SPACE ":" trailing ]
//! ```
//!
//! Parsing is pure: it never touches session or channel state.

use std::fmt;
use std::str::FromStr;

use crate::{Numeric, Prefix, ProtocolError};

/// A single protocol message.
///
/// The trailing parameter (the one introduced by `:`) is stored as the last
/// element of `params` like any other; the colon is syntax, not data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Origin of the message, without the leading `:`.
    pub prefix: Option<String>,
    /// Alphabetic command (upper-cased as received) or 3-digit numeric.
    pub command: String,
    /// Parameters in order.
    pub params: Vec<String>,
}

impl Message {
    /// Builds a message with no prefix.
    pub fn new(command: impl Into<String>, params: Vec<String>) -> Self {
        Self {
            prefix: None,
            command: command.into(),
            params,
        }
    }

    /// Parses one line (terminator already stripped).
    ///
    /// # Errors
    /// - [`ProtocolError::MalformedLine`] for empty lines, a prefix with
    ///   nothing after it, or a missing command.
    /// - [`ProtocolError::InvalidCommand`] when the command token is neither
    ///   letters nor exactly three digits.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let malformed = |reason| ProtocolError::MalformedLine {
            raw: line.to_owned(),
            reason,
        };

        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return Err(malformed("empty line"));
        }

        let mut rest = line;
        let prefix = match rest.strip_prefix(':') {
            Some(after_colon) => {
                let (prefix, tail) = after_colon
                    .split_once(' ')
                    .ok_or_else(|| malformed("prefix without command"))?;
                if prefix.is_empty() {
                    return Err(malformed("empty prefix"));
                }
                rest = tail;
                Some(prefix.to_owned())
            }
            None => None,
        };

        let rest = rest.trim_start_matches(' ');
        if rest.is_empty() {
            return Err(malformed("missing command"));
        }
        let (command, mut rest) = rest.split_once(' ').unwrap_or((rest, ""));
        if !is_valid_command(command) {
            return Err(ProtocolError::InvalidCommand {
                command: command.to_owned(),
                raw: line.to_owned(),
            });
        }

        let mut params = Vec::new();
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }
            if let Some(trailing) = rest.strip_prefix(':') {
                params.push(trailing.to_owned());
                break;
            }
            match rest.split_once(' ') {
                Some((middle, tail)) => {
                    params.push(middle.to_owned());
                    rest = tail;
                }
                None => {
                    params.push(rest.to_owned());
                    break;
                }
            }
        }

        Ok(Self {
            prefix,
            command: command.to_ascii_uppercase(),
            params,
        })
    }

    /// The numeric code, if the command is a 3-digit reply.
    pub fn numeric(&self) -> Option<Numeric> {
        Numeric::from_command(&self.command)
    }

    /// The prefix split into nick/user/host, if there is one.
    pub fn source(&self) -> Option<Prefix> {
        self.prefix.as_deref().map(Prefix::parse)
    }

    /// The nick (or server name) the message came from.
    pub fn source_nick(&self) -> Option<&str> {
        self.prefix.as_deref().map(|p| Prefix::nick_of(p))
    }

    /// Parameter at `index`, if present.
    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }
}

impl FromStr for Message {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Serializes to wire form, without the `\r\n` terminator.
///
/// The last parameter is written as a trailing parameter whenever it has to
/// be (empty, contains a space, starts with `:`), so parsing the output
/// gives back an equal `Message`.
impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(prefix) = &self.prefix {
            write!(f, ":{prefix} ")?;
        }
        f.write_str(&self.command)?;

        if let Some((last, middle)) = self.params.split_last() {
            for param in middle {
                write!(f, " {param}")?;
            }
            if needs_trailing(last) {
                write!(f, " :{last}")?;
            } else {
                write!(f, " {last}")?;
            }
        }
        Ok(())
    }
}

fn is_valid_command(command: &str) -> bool {
    let all_alpha = !command.is_empty() && command.bytes().all(|b| b.is_ascii_alphabetic());
    let three_digits = command.len() == 3 && command.bytes().all(|b| b.is_ascii_digit());
    all_alpha || three_digits
}

fn needs_trailing(param: &str) -> bool {
    param.is_empty() || param.contains(' ') || param.starts_with(':')
}
