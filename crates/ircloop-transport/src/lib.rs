//! Transport abstraction layer for ircloop.
//!
//! Provides the [`Connector`] and [`Connection`] traits the engine is
//! written against, and [`TcpConnector`], the plain TCP implementation.
//! Tests plug in their own connectors to simulate slow or dead servers.

#![allow(async_fn_in_trait)]

mod error;
mod tcp;

pub use error::TransportError;
pub use tcp::{TcpConnection, TcpConnector};

use std::fmt;

/// Opaque identifier for a connection.
///
/// Every reconnect produces a new id, which makes it easy to tell
/// connection attempts apart in the logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Opens outbound connections.
pub trait Connector: Send + Sync + 'static {
    /// The connection type produced by this connector.
    type Connection: Connection;

    /// Connects to `addr` (`host:port`).
    ///
    /// No timeout is applied here; the caller bounds the attempt.
    async fn connect(&self, addr: &str) -> Result<Self::Connection, TransportError>;
}

/// A single byte-stream connection.
pub trait Connection: Send + 'static {
    /// Writes all of `data` to the peer.
    async fn send(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Reads whatever is available into `buf`.
    ///
    /// Returns `Ok(0)` when the peer closed the connection cleanly. Chunk
    /// boundaries carry no meaning; framing is the caller's job.
    async fn recv(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Flushes and shuts down the write half.
    async fn close(&mut self) -> Result<(), TransportError>;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}
