//! Unified error type for ircloop.

use std::time::Duration;

use ircloop_protocol::ProtocolError;
use ircloop_session::SessionError;
use ircloop_task::SchedulerError;
use ircloop_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each wrapped variant auto-generates `From`
/// impls, so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum IrcError {
    /// A transport-level error (connect, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A line that couldn't be framed or parsed, or an outgoing parameter
    /// that can't be put on the wire.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A lifecycle violation or an operation called in the wrong state.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A bad delay or an unknown task id.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    /// Handler code returned an error or panicked.
    #[error("handler failed in {event}: {reason}")]
    MessageHandling {
        /// The handler method or `"task"`.
        event: &'static str,
        reason: String,
    },

    /// The TCP connect took longer than the configured timeout.
    #[error("connecting to {addr} timed out after {timeout:?}")]
    ConnectionTimeout { addr: String, timeout: Duration },

    /// Every reconnect attempt failed.
    #[error("giving up after {attempts} reconnect attempts")]
    ReconnectExhausted {
        attempts: u32,
        /// The error that ended the last attempt.
        #[source]
        last: Box<IrcError>,
    },
}

/// Coarse classification of an [`IrcError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A malformed or overlong incoming line.
    Parser,
    /// A handler or task failed.
    MessageHandling,
    /// The connect timed out.
    ConnectionTimeout,
    /// The caller misused the API.
    Usage,
    /// Socket I/O failed or the peer went away.
    Transport,
    /// The session ended or broke its lifecycle.
    Session,
}

impl IrcError {
    /// Which kind of failure this is.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) => ErrorKind::Transport,
            Self::Protocol(ProtocolError::InvalidParameter(_)) => ErrorKind::Usage,
            Self::Protocol(_) => ErrorKind::Parser,
            Self::Session(SessionError::NotActive { .. }) => ErrorKind::Usage,
            Self::Session(SessionError::InvalidTransition { .. }) => ErrorKind::Session,
            Self::Scheduler(_) => ErrorKind::Usage,
            Self::MessageHandling { .. } => ErrorKind::MessageHandling,
            Self::ConnectionTimeout { .. } => ErrorKind::ConnectionTimeout,
            Self::ReconnectExhausted { .. } => ErrorKind::Session,
        }
    }
}
