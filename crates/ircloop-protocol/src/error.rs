//! Error types for the protocol layer.
//!
//! Everything that can go wrong between "bytes arrived" and "we have a
//! structured [`Message`](crate::Message)" ends up here. These errors are
//! never fatal to a connection: the engine reports them and moves on to the
//! next line.

/// Errors that can occur while framing, parsing or building protocol lines.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// A line did not match the message grammar at all, for example it
    /// was empty, or it had a prefix but no command after it.
    ///
    /// `raw` is the offending line exactly as received (terminator
    /// stripped), so the caller can log or inspect it.
    #[error("malformed line ({reason}): {raw:?}")]
    MalformedLine {
        /// The raw line.
        raw: String,
        /// Short description of what was wrong.
        reason: &'static str,
    },

    /// The command token was neither a pure alphabetic word nor exactly
    /// three digits.
    #[error("invalid command {command:?} in line {raw:?}")]
    InvalidCommand {
        /// The rejected command token.
        command: String,
        /// The raw line.
        raw: String,
    },

    /// A line exceeded the framing limit. The rest of it, up to the next
    /// terminator, was discarded.
    #[error("line exceeds {limit} bytes")]
    LineTooLong {
        /// The configured maximum line length in bytes (terminator included).
        limit: usize,
    },

    /// An outgoing parameter can't be put on the wire: it contains a line
    /// terminator or NUL, is empty where a word is required, or contains a
    /// space in a non-trailing position.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

impl ProtocolError {
    /// The raw line that caused the error, when one is available.
    pub fn raw_line(&self) -> Option<&str> {
        match self {
            Self::MalformedLine { raw, .. } | Self::InvalidCommand { raw, .. } => Some(raw),
            Self::LineTooLong { .. } | Self::InvalidParameter(_) => None,
        }
    }
}
