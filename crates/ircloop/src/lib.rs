//! # ircloop
//!
//! Single-connection IRC client engine for bots.
//!
//! ircloop connects to one server, registers, and turns every line the
//! server sends into a call on your [`Handler`]. Channel membership and
//! the session state are kept up to date for you, and handlers can
//! schedule one-shot or periodic tasks on the same loop. Lost connections
//! are retried with exponential backoff.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ircloop::prelude::*;
//!
//! struct Greeter;
//!
//! impl Handler for Greeter {
//!     fn on_register(&mut self, client: &mut Client) -> HandlerResult {
//!         client.join("#ircloop", None)?;
//!         Ok(())
//!     }
//!
//!     fn on_join(&mut self, client: &mut Client, channel: &str, nick: &str) -> HandlerResult {
//!         client.send_message(channel, &format!("hello, {nick}"))?;
//!         Ok(())
//!     }
//! }
//!
//! # async fn start() -> Result<(), IrcError> {
//! let mut engine = Engine::builder()
//!     .server("irc.libera.chat", 6667)
//!     .nick("greeter")
//!     .build(Greeter);
//! engine.run().await
//! # }
//! ```

mod client;
mod config;
mod dispatcher;
mod engine;
mod error;
mod handler;

pub use client::{Client, Task};
pub use config::EngineConfig;
pub use engine::{Engine, EngineBuilder};
pub use error::{ErrorKind, IrcError};
pub use handler::{BoxError, Handler, HandlerResult, NoopHandler};

pub use ircloop_channel::{ChannelInfo, MemberStatus};
pub use ircloop_protocol::{ErrorReply, MemberFlag, Message, ModeChange, Numeric, ProtocolError};
pub use ircloop_session::{SessionConfig, SessionError, SessionState};
pub use ircloop_task::{SchedulerError, SchedulerMetrics, TaskId};
pub use ircloop_transport::{Connection, Connector, TcpConnection, TcpConnector, TransportError};

/// Everything a bot usually needs, in one import.
pub mod prelude {
    pub use crate::{
        ChannelInfo, Client, Engine, EngineConfig, ErrorReply, Handler, HandlerResult, IrcError,
        MemberFlag, Message, ModeChange, NoopHandler, Numeric, SessionConfig, SessionState,
        TaskId,
    };
}
