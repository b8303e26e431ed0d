//! Error types for the session layer.

use crate::SessionState;

/// Errors raised by the session state machine.
///
/// Both variants are usage errors: they are returned immediately and never
/// retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// A lifecycle transition the state machine does not allow, for
    /// example `Idle → Active`.
    #[error("invalid session transition {from} -> {to}")]
    InvalidTransition {
        from: SessionState,
        to: SessionState,
    },

    /// A client operation was called in a state that doesn't permit it,
    /// for example `join` before registration completed.
    #[error("{operation} is not allowed while the session is {state}")]
    NotActive {
        operation: &'static str,
        state: SessionState,
    },
}
