//! Connection lifecycle for ircloop.
//!
//! This crate owns the one thing every other layer asks about: what state
//! the connection is in.
//!
//! 1. **Session** ([`Session`]): nick, server and retry bookkeeping
//! 2. **State machine** ([`SessionMachine`]): which transitions are legal,
//!    and which client operations are allowed in each state
//! 3. **Policy** ([`SessionConfig`]): connect timeout and reconnect backoff
//!
//! # How it fits in the stack
//!
//! ```text
//! Engine / Dispatcher (above)  ← drive transitions
//!     ↕
//! Session Layer (this crate)   ← lifecycle + reconnect policy
//! ```

mod error;
mod machine;
mod session;

pub use error::SessionError;
pub use machine::SessionMachine;
pub use session::{Session, SessionConfig, SessionState};
