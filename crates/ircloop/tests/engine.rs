//! End-to-end tests for the engine.
//!
//! Each test runs a scripted fake server on a random local port: it reads
//! the lines the engine sends, asserts on them, and answers the way a real
//! server would.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use ircloop::prelude::*;
use ircloop::{Connector, ErrorKind, TcpConnection, TransportError};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpListener;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time;

// =========================================================================
// Fake server
// =========================================================================

/// The server side of one accepted connection.
struct Peer {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl Peer {
    async fn accept(listener: &TcpListener) -> Self {
        let (socket, _) = listener.accept().await.expect("should accept");
        let (read, writer) = socket.into_split();
        Self {
            lines: BufReader::new(read).lines(),
            writer,
        }
    }

    /// Reads the next line from the engine, or `None` once it closed.
    async fn next(&mut self) -> Option<String> {
        time::timeout(Duration::from_secs(5), self.lines.next_line())
            .await
            .expect("timed out waiting for the engine")
            .expect("read failed")
    }

    async fn expect(&mut self, want: &str) {
        let got = self.next().await.expect("engine closed the connection");
        assert_eq!(got, want);
    }

    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\r\n").as_bytes())
            .await
            .expect("write failed");
    }

    /// Reads NICK/USER and welcomes `nick`.
    async fn register(&mut self, nick: &str) {
        self.expect(&format!("NICK {nick}")).await;
        self.expect("USER fred 0 * :Fred Bot").await;
        self.send(&format!(":irc.test 001 {nick} :Welcome to the test network"))
            .await;
    }

    /// Waits for QUIT and the close that follows it.
    async fn expect_quit(&mut self, quit: &str) {
        self.expect(quit).await;
        assert_eq!(self.next().await, None);
    }
}

// =========================================================================
// Helpers
// =========================================================================

async fn listen() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("should bind");
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

/// A port nobody listens on.
async fn dead_port() -> u16 {
    let (listener, port) = listen().await;
    drop(listener);
    port
}

fn config(port: u16, max_reconnect_attempts: u32) -> EngineConfig {
    EngineConfig {
        server: "127.0.0.1".into(),
        port,
        nick: "fred".into(),
        username: "fred".into(),
        realname: "Fred Bot".into(),
        session: SessionConfig {
            connect_timeout_secs: 5,
            max_reconnect_attempts,
            reconnect_base_delay_ms: 10,
            reconnect_max_delay_ms: 50,
            reconnect_jitter_ms: 0,
        },
        ..EngineConfig::default()
    }
}

async fn run_to_end<H: Handler, C: Connector>(engine: &mut Engine<H, C>) -> Result<(), IrcError> {
    time::timeout(Duration::from_secs(10), engine.run())
        .await
        .expect("engine did not stop")
}

// =========================================================================
// Handlers
// =========================================================================

/// Joins `#chan`, answers the first channel message and quits.
#[derive(Default)]
struct Greeter {
    events: Vec<String>,
}

impl Handler for Greeter {
    fn on_register(&mut self, client: &mut Client) -> HandlerResult {
        client.join("#chan", None)?;
        Ok(())
    }

    fn on_own_join(&mut self, client: &mut Client, channel: &str) -> HandlerResult {
        let members = client.channel_info(channel).map(|c| c.member_count());
        self.events.push(format!("joined {channel} {members:?}"));
        Ok(())
    }

    fn on_ping(&mut self, _client: &mut Client, server: &str) -> HandlerResult {
        self.events.push(format!("ping {server}"));
        Ok(())
    }

    fn on_channel_message(
        &mut self,
        client: &mut Client,
        channel: &str,
        message: &str,
        sender: &str,
    ) -> HandlerResult {
        self.events.push(format!("{channel} <{sender}> {message}"));
        client.send_message(channel, &format!("hi {sender}"))?;
        client.terminate(Some("bye"))?;
        Ok(())
    }
}

/// Counts lifecycle events and quits on the `quit_on`-th registration.
struct Lifecycle {
    quit_on: usize,
    connects: usize,
    registers: usize,
    disconnects: usize,
}

impl Lifecycle {
    fn new(quit_on: usize) -> Self {
        Self {
            quit_on,
            connects: 0,
            registers: 0,
            disconnects: 0,
        }
    }
}

impl Handler for Lifecycle {
    fn on_connect(&mut self, client: &mut Client) -> HandlerResult {
        assert_eq!(client.state(), SessionState::Registering);
        self.connects += 1;
        Ok(())
    }

    fn on_register(&mut self, client: &mut Client) -> HandlerResult {
        self.registers += 1;
        if self.registers == self.quit_on {
            client.terminate(None)?;
        }
        Ok(())
    }

    fn on_disconnect(&mut self, client: &mut Client) -> HandlerResult {
        assert_eq!(client.state(), SessionState::Disconnected);
        self.disconnects += 1;
        Ok(())
    }
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_register_join_and_answer_channel_message() {
    let (listener, port) = listen().await;
    let server = tokio::spawn(async move {
        let mut peer = Peer::accept(&listener).await;
        peer.register("fred").await;
        peer.expect("JOIN #chan").await;
        peer.send(":fred!fred@host JOIN #chan").await;
        peer.send(":irc.test 353 fred = #chan :fred @alice").await;
        peer.send("PING :irc.test").await;
        peer.expect("PONG irc.test").await;
        peer.send(":alice!a@host PRIVMSG #chan :Hello Fred").await;
        peer.expect("PRIVMSG #chan :hi alice").await;
        peer.expect_quit("QUIT bye").await;
    });

    let mut engine = Engine::builder()
        .config(config(port, 0))
        .build(Greeter::default());
    run_to_end(&mut engine).await.expect("should end cleanly");
    server.await.unwrap();

    assert_eq!(
        engine.handler().events,
        vec!["joined #chan Some(1)", "ping irc.test", "#chan <alice> Hello Fred"]
    );
    assert_eq!(engine.client().state(), SessionState::Terminated);
    assert_eq!(engine.client().channels().count(), 0);
}

#[tokio::test]
async fn test_nickname_in_use_keeps_registering() {
    #[derive(Default)]
    struct Retry {
        events: Vec<String>,
    }

    impl Handler for Retry {
        fn on_error(&mut self, client: &mut Client, error: &ErrorReply) -> HandlerResult {
            if let ErrorReply::NicknameInUse { nick, .. } = error {
                self.events.push(format!("{nick} taken while {}", client.state()));
                client.register(&format!("{nick}_"))?;
            }
            Ok(())
        }

        fn on_register(&mut self, client: &mut Client) -> HandlerResult {
            self.events.push(format!("registered as {}", client.nick()));
            client.terminate(None)?;
            Ok(())
        }
    }

    let (listener, port) = listen().await;
    let server = tokio::spawn(async move {
        let mut peer = Peer::accept(&listener).await;
        peer.expect("NICK fred").await;
        peer.expect("USER fred 0 * :Fred Bot").await;
        peer.send(":irc.test 433 * fred :Nickname is already in use").await;
        peer.expect("NICK fred_").await;
        peer.send(":irc.test 001 fred_ :Welcome").await;
        peer.expect_quit("QUIT").await;
    });

    let mut engine = Engine::builder()
        .config(config(port, 0))
        .build(Retry::default());
    run_to_end(&mut engine).await.expect("should end cleanly");
    server.await.unwrap();

    assert_eq!(
        engine.handler().events,
        vec!["fred taken while registering", "registered as fred_"]
    );
    assert_eq!(engine.client().server(), Some("irc.test"));
}

#[tokio::test]
async fn test_periodic_task_stops_after_cancel() {
    struct Ticker {
        ticks: Arc<AtomicUsize>,
    }

    impl Handler for Ticker {
        fn on_register(&mut self, client: &mut Client) -> HandlerResult {
            let ticks = Arc::clone(&self.ticks);
            client.schedule_periodic(Duration::from_millis(20), move |client| {
                let n = ticks.fetch_add(1, Ordering::SeqCst) + 1;
                client.send_message("#chan", &format!("tick {n}"))?;
                if n == 2 {
                    let me = client.current_task().ok_or("no current task")?;
                    client.cancel_task(me);
                    // Leave time for a third tick to show up if the
                    // cancel didn't work.
                    client.schedule(Duration::from_millis(100), |client| {
                        client.terminate(None)?;
                        Ok(())
                    })?;
                }
                Ok(())
            })?;
            Ok(())
        }
    }

    let (listener, port) = listen().await;
    let server = tokio::spawn(async move {
        let mut peer = Peer::accept(&listener).await;
        peer.register("fred").await;
        peer.expect("PRIVMSG #chan :tick 1").await;
        peer.expect("PRIVMSG #chan :tick 2").await;
        peer.expect_quit("QUIT").await;
    });

    let ticks = Arc::new(AtomicUsize::new(0));
    let mut engine = Engine::builder().config(config(port, 0)).build(Ticker {
        ticks: Arc::clone(&ticks),
    });
    run_to_end(&mut engine).await.expect("should end cleanly");
    server.await.unwrap();

    assert_eq!(ticks.load(Ordering::SeqCst), 2);
    assert_eq!(engine.client().task_metrics().fired, 3);
}

#[tokio::test]
async fn test_faults_do_not_stop_the_engine() {
    #[derive(Default)]
    struct Flaky {
        messages: usize,
        faults: Vec<ErrorKind>,
    }

    impl Handler for Flaky {
        fn on_channel_message(
            &mut self,
            client: &mut Client,
            _channel: &str,
            message: &str,
            _sender: &str,
        ) -> HandlerResult {
            self.messages += 1;
            match message {
                "fail" => Err("handler refused".into()),
                "panic" => panic!("handler blew up"),
                _ => {
                    client.terminate(None)?;
                    Ok(())
                }
            }
        }

        fn on_fault(&mut self, _client: &mut Client, error: &IrcError) {
            self.faults.push(error.kind());
        }
    }

    let (listener, port) = listen().await;
    let server = tokio::spawn(async move {
        let mut peer = Peer::accept(&listener).await;
        peer.register("fred").await;
        peer.send(":fred!fred@host JOIN #chan").await;
        peer.send(":alice!a@host PRIVMSG #chan :fail").await;
        peer.send(":no-command-here").await;
        peer.send(":alice!a@host PRIVMSG #chan :panic").await;
        peer.send(":alice!a@host PRIVMSG #chan :done").await;
        peer.expect_quit("QUIT").await;
    });

    let mut engine = Engine::builder()
        .config(config(port, 0))
        .build(Flaky::default());
    run_to_end(&mut engine).await.expect("should end cleanly");
    server.await.unwrap();

    let handler = engine.into_handler();
    assert_eq!(handler.messages, 3);
    assert_eq!(
        handler.faults,
        vec![
            ErrorKind::MessageHandling,
            ErrorKind::Parser,
            ErrorKind::MessageHandling
        ]
    );
}

#[tokio::test]
async fn test_reconnects_after_server_closes() {
    let (listener, port) = listen().await;
    let server = tokio::spawn(async move {
        let mut first = Peer::accept(&listener).await;
        first.register("fred").await;
        drop(first);

        let mut second = Peer::accept(&listener).await;
        second.register("fred").await;
        second.expect_quit("QUIT").await;
    });

    let mut engine = Engine::builder()
        .config(config(port, 3))
        .build(Lifecycle::new(2));
    run_to_end(&mut engine).await.expect("should end cleanly");
    server.await.unwrap();

    let handler = engine.handler();
    assert_eq!(handler.connects, 2);
    assert_eq!(handler.registers, 2);
    assert_eq!(handler.disconnects, 2);
}

#[tokio::test]
async fn test_error_line_ends_session_without_reconnect() {
    let (listener, port) = listen().await;
    let server = tokio::spawn(async move {
        let mut peer = Peer::accept(&listener).await;
        peer.register("fred").await;
        peer.send("ERROR :Closing Link: fred (K-Lined)").await;
        assert_eq!(peer.next().await, None);
    });

    let mut engine = Engine::builder()
        .config(config(port, 0))
        .build(Lifecycle::new(usize::MAX));
    let err = run_to_end(&mut engine).await.unwrap_err();
    server.await.unwrap();

    match err {
        IrcError::Transport(TransportError::ConnectionClosed(reason)) => {
            assert_eq!(reason, "Closing Link: fred (K-Lined)");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(engine.handler().disconnects, 1);
    assert_eq!(engine.client().state(), SessionState::Terminated);
}

#[tokio::test]
async fn test_exhausted_reconnect_returns_error() {
    let port = dead_port().await;
    let mut engine = Engine::builder()
        .config(config(port, 2))
        .build(Lifecycle::new(1));

    let err = run_to_end(&mut engine).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Session);
    match err {
        IrcError::ReconnectExhausted { attempts, last } => {
            assert_eq!(attempts, 2);
            assert_eq!(last.kind(), ErrorKind::Transport);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(engine.handler().connects, 0);
    assert_eq!(engine.client().state(), SessionState::Terminated);
}

#[tokio::test]
async fn test_reconnect_disabled_returns_connect_error() {
    let port = dead_port().await;
    let mut engine = Engine::builder()
        .config(config(port, 0))
        .build(NoopHandler);

    let err = run_to_end(&mut engine).await.unwrap_err();
    assert!(matches!(
        err,
        IrcError::Transport(TransportError::ConnectFailed { .. })
    ));
}

/// Accepts the connect call and never finishes it.
struct BlackHole;

impl Connector for BlackHole {
    type Connection = TcpConnection;

    async fn connect(&self, _addr: &str) -> Result<TcpConnection, TransportError> {
        std::future::pending().await
    }
}

#[tokio::test(start_paused = true)]
async fn test_connect_timeout_is_enforced() {
    let mut config = config(6667, 0);
    config.session.connect_timeout_secs = 3;
    let mut engine = Engine::builder()
        .config(config)
        .connector(BlackHole)
        .build(NoopHandler);

    let started = time::Instant::now();
    let err = engine.run().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConnectionTimeout);
    assert!(matches!(
        err,
        IrcError::ConnectionTimeout { timeout, .. } if timeout == Duration::from_secs(3)
    ));
    assert!(started.elapsed() >= Duration::from_secs(3));
}

#[tokio::test]
async fn test_terminate_before_run() {
    let mut engine = Engine::builder()
        .config(config(dead_port().await, 3))
        .build(Lifecycle::new(1));
    engine.client_mut().terminate(None).unwrap();

    run_to_end(&mut engine).await.expect("should return at once");
    assert_eq!(engine.handler().connects, 0);
    assert_eq!(engine.client().state(), SessionState::Terminated);
}
