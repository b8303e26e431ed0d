//! TCP transport using `tokio::net::TcpStream`.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::{Connection, ConnectionId, Connector, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Opens plain TCP connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Connection = TcpConnection;

    async fn connect(&self, addr: &str) -> Result<Self::Connection, TransportError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| TransportError::ConnectFailed {
                addr: addr.to_owned(),
                source,
            })?;
        // Lines are small and latency matters more than throughput.
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(error = %e, "could not set TCP_NODELAY");
        }

        let id = ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(%id, addr, "TCP connection established");
        Ok(TcpConnection { id, stream })
    }
}

/// A single TCP connection.
pub struct TcpConnection {
    id: ConnectionId,
    stream: TcpStream,
}

impl Connection for TcpConnection {
    async fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.stream
            .write_all(data)
            .await
            .map_err(TransportError::SendFailed)
    }

    async fn recv(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        self.stream
            .read(buf)
            .await
            .map_err(TransportError::ReceiveFailed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        tracing::debug!(id = %self.id, "closing TCP connection");
        self.stream
            .shutdown()
            .await
            .map_err(TransportError::SendFailed)
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
