//! `Engine` builder and event loop.
//!
//! This is the entry point for running a bot. It ties together all the
//! layers: transport → protocol → dispatcher → handler, with the session
//! state machine and the task scheduler in between.

use ircloop_protocol::LineFramer;
use ircloop_session::SessionConfig;
use ircloop_transport::{Connection, Connector, TcpConnector, TransportError};
use tokio::time;

use crate::dispatcher::{self, Flow};
use crate::{Client, EngineConfig, Handler, IrcError, NoopHandler};

/// Builder for configuring an [`Engine`].
///
/// # Example
///
/// ```rust,no_run
/// use ircloop::prelude::*;
///
/// # async fn start() -> Result<(), IrcError> {
/// let mut engine = Engine::builder()
///     .server("irc.libera.chat", 6667)
///     .nick("fred")
///     .build(NoopHandler);
/// engine.run().await
/// # }
/// ```
pub struct EngineBuilder<C = TcpConnector> {
    config: EngineConfig,
    connector: C,
}

impl EngineBuilder {
    /// Creates a new builder with default settings and plain TCP.
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            connector: TcpConnector,
        }
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Connector> EngineBuilder<C> {
    /// Replaces the whole configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the server to connect to.
    pub fn server(mut self, host: &str, port: u16) -> Self {
        self.config.server = host.to_string();
        self.config.port = port;
        self
    }

    /// Sets the nick sent at registration.
    pub fn nick(mut self, nick: &str) -> Self {
        self.config.nick = nick.to_string();
        self
    }

    /// Sets the user name and real name sent with USER.
    pub fn user(mut self, username: &str, realname: &str) -> Self {
        self.config.username = username.to_string();
        self.config.realname = realname.to_string();
        self
    }

    /// Sets the connect timeout and reconnection policy.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.config.session = config;
        self
    }

    /// Uses `connector` instead of plain TCP.
    pub fn connector<C2: Connector>(self, connector: C2) -> EngineBuilder<C2> {
        EngineBuilder {
            config: self.config,
            connector,
        }
    }

    /// Builds the engine around `handler`. Nothing connects until
    /// [`Engine::run`] is called.
    pub fn build<H: Handler>(self, handler: H) -> Engine<H, C> {
        Engine {
            client: Client::new(&self.config),
            config: self.config,
            connector: self.connector,
            handler,
        }
    }
}

/// A single IRC connection driven by a [`Handler`].
///
/// The engine owns everything: the connection, the [`Client`] state and
/// the handler. Call [`run()`](Self::run) to connect and process events
/// until the session ends.
pub struct Engine<H: Handler, C: Connector = TcpConnector> {
    config: EngineConfig,
    connector: C,
    handler: H,
    client: Client,
}

impl Engine<NoopHandler> {
    /// Creates a new builder. The handler type is picked by
    /// [`EngineBuilder::build`].
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }
}

impl<H: Handler, C: Connector> Engine<H, C> {
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Mutable access to the client, e.g. to call
    /// [`terminate`](Client::terminate) before `run`.
    pub fn client_mut(&mut self) -> &mut Client {
        &mut self.client
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// Consumes the engine and returns the handler.
    pub fn into_handler(self) -> H {
        self.handler
    }

    /// Connects and processes events until the session ends.
    ///
    /// Lost connections are retried according to the
    /// [`SessionConfig`] with exponential backoff. Returns `Ok(())` once
    /// [`Client::terminate`] was called, and an error when the connection
    /// is lost for good: the last connection error itself when
    /// reconnection is disabled, [`IrcError::ReconnectExhausted`] when
    /// every attempt failed.
    pub async fn run(&mut self) -> Result<(), IrcError> {
        let addr = self.config.addr();
        tracing::info!(%addr, nick = %self.client.nick(), "engine starting");

        loop {
            if self.client.session().termination_requested() {
                self.client.session_mut().terminate();
                tracing::info!("engine stopped");
                return Ok(());
            }

            self.client.session_mut().begin_connect()?;
            let result = self.connect_and_serve(&addr).await;

            if self.client.session().termination_requested() {
                continue;
            }
            let last = match result {
                Err(e) => e,
                Ok(()) => TransportError::ConnectionClosed("connection ended".into()).into(),
            };

            match self.client.session_mut().next_reconnect()? {
                Some(delay) => time::sleep(delay).await,
                None => {
                    self.client.session_mut().terminate();
                    if !self.config.session.reconnect_enabled() {
                        tracing::error!(error = %last, "connection lost, reconnection disabled");
                        return Err(last);
                    }
                    let attempts = self.client.session().retry_count();
                    tracing::error!(attempts, error = %last, "giving up on reconnecting");
                    return Err(IrcError::ReconnectExhausted {
                        attempts,
                        last: Box::new(last),
                    });
                }
            }
        }
    }

    /// One connection attempt, from connect to close. Always leaves the
    /// session `Disconnected`.
    async fn connect_and_serve(&mut self, addr: &str) -> Result<(), IrcError> {
        let timeout = self.config.session.connect_timeout();
        tracing::info!(%addr, attempt = self.client.session().retry_count(), "connecting");

        let mut conn = match time::timeout(timeout, self.connector.connect(addr)).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => {
                tracing::warn!(%addr, error = %e, "connect failed");
                self.client.session_mut().disconnected()?;
                return Err(e.into());
            }
            Err(_) => {
                tracing::warn!(%addr, ?timeout, "connect timed out");
                self.client.session_mut().disconnected()?;
                return Err(IrcError::ConnectionTimeout {
                    addr: addr.to_owned(),
                    timeout,
                });
            }
        };

        let conn_id = conn.id();
        tracing::info!(%conn_id, %addr, "connected");

        let result = self.serve(&mut conn).await;

        if let Err(e) = conn.close().await {
            tracing::debug!(%conn_id, error = %e, "close failed");
        }
        match &result {
            Ok(()) => tracing::info!(%conn_id, "connection closed"),
            Err(e) => tracing::warn!(%conn_id, error = %e, "connection lost"),
        }
        if let Err(e) = self.client.session_mut().disconnected() {
            tracing::warn!(%conn_id, error = %e, "unexpected state after disconnect");
        }
        dispatcher::invoke(&mut self.client, &mut self.handler, "on_disconnect", |h, c| {
            h.on_disconnect(c)
        });
        self.client.reset_connection_state();
        result
    }

    /// Registers and runs the event loop on an open connection.
    ///
    /// Returns `Ok(())` when termination was requested, and an error for
    /// anything else that ends the connection.
    async fn serve(&mut self, conn: &mut C::Connection) -> Result<(), IrcError> {
        let conn_id = conn.id();
        let client = &mut self.client;
        let handler = &mut self.handler;

        client.session_mut().connected()?;
        client.queue_registration()?;
        dispatcher::invoke(client, handler, "on_connect", |h, c| h.on_connect(c));

        let mut framer = LineFramer::with_max_len(self.config.max_line_len);
        let mut buf = vec![0u8; self.config.read_buffer_size.max(1)];

        loop {
            flush(client, conn).await?;
            if client.session().termination_requested() {
                return Ok(());
            }

            tokio::select! {
                read = conn.recv(&mut buf) => {
                    let n = read?;
                    if n == 0 {
                        return Err(TransportError::ConnectionClosed(
                            "server closed the connection".into(),
                        )
                        .into());
                    }
                    tracing::trace!(%conn_id, bytes = n, "read");
                    framer.push(&buf[..n]);

                    for line in framer.lines() {
                        if let Flow::Disconnect(reason) = dispatcher::handle_line(client, handler, line) {
                            flush(client, conn).await?;
                            return Err(TransportError::ConnectionClosed(reason).into());
                        }
                        if client.session().termination_requested() {
                            break;
                        }
                    }
                }
                () = client.tasks.wait_due() => {
                    dispatcher::run_due_tasks(client, handler);
                }
            }
        }
    }
}

/// Writes out everything the client queued.
async fn flush<Cn: Connection>(client: &mut Client, conn: &mut Cn) -> Result<(), IrcError> {
    while let Some(line) = client.next_outbound() {
        tracing::trace!(conn_id = %conn.id(), line = line.trim_end(), "sending");
        conn.send(line.as_bytes()).await?;
    }
    Ok(())
}
