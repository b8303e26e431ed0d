//! The session state machine.
//!
//! Only the engine and the dispatcher drive it; client operations just ask
//! it whether they are allowed right now.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::{Session, SessionConfig, SessionError, SessionState};

/// Owns the [`Session`] and enforces its lifecycle.
#[derive(Debug)]
pub struct SessionMachine {
    session: Session,
    config: SessionConfig,
    termination_requested: bool,
}

impl SessionMachine {
    /// Creates an idle machine for `nick`.
    pub fn new(nick: impl Into<String>, config: SessionConfig) -> Self {
        Self {
            session: Session::new(nick),
            config,
            termination_requested: false,
        }
    }

    // -- Accessors ----------------------------------------------------------

    pub fn state(&self) -> SessionState {
        self.session.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The confirmed nick.
    pub fn nick(&self) -> &str {
        &self.session.nick
    }

    pub fn server(&self) -> Option<&str> {
        self.session.server.as_deref()
    }

    pub fn pending_nick(&self) -> Option<&str> {
        self.session.pending_nick.as_deref()
    }

    pub fn retry_count(&self) -> u32 {
        self.session.retry_count
    }

    /// Whether `terminate` has been asked for.
    pub fn termination_requested(&self) -> bool {
        self.termination_requested
    }

    // -- Transitions --------------------------------------------------------

    /// Moves to `to`, or fails with [`SessionError::InvalidTransition`].
    pub fn transition(&mut self, to: SessionState) -> Result<(), SessionError> {
        let from = self.session.state;
        if !from.can_transition_to(to) {
            warn!(%from, %to, "rejected session transition");
            return Err(SessionError::InvalidTransition { from, to });
        }
        self.session.state = to;
        debug!(%from, %to, "session transition");
        Ok(())
    }

    /// `Idle | Reconnecting → Connecting`.
    pub fn begin_connect(&mut self) -> Result<(), SessionError> {
        self.transition(SessionState::Connecting)
    }

    /// `Connecting → Registering`. The configured nick is sent first, so it
    /// becomes the pending attempt.
    pub fn connected(&mut self) -> Result<(), SessionError> {
        self.transition(SessionState::Registering)?;
        self.session.server = None;
        self.session.pending_nick = Some(self.session.nick.clone());
        Ok(())
    }

    /// The server refused the pending nick.
    ///
    /// While registering this is the `Registering → Registering`
    /// transition. Once active the current nick simply stays. Either way
    /// the nick is left alone; the handler decides what to try next.
    pub fn nick_rejected(&mut self) -> Result<(), SessionError> {
        if self.session.state != SessionState::Active {
            self.transition(SessionState::Registering)?;
        }
        if let Some(nick) = self.session.pending_nick.take() {
            info!(%nick, state = %self.session.state, "nick rejected");
        }
        Ok(())
    }

    /// Records a NICK we sent that the server hasn't confirmed yet.
    pub fn nick_requested(&mut self, nick: impl Into<String>) {
        self.session.pending_nick = Some(nick.into());
    }

    /// `Registering → Active` on the welcome reply. `nick` is what the
    /// server says we are, `server` the reply's origin.
    pub fn registered(
        &mut self,
        nick: impl Into<String>,
        server: Option<String>,
    ) -> Result<(), SessionError> {
        self.transition(SessionState::Active)?;
        self.session.nick = nick.into();
        self.session.server = server;
        self.session.pending_nick = None;
        self.session.retry_count = 0;
        info!(nick = %self.session.nick, server = ?self.session.server, "registered");
        Ok(())
    }

    /// A NICK for ourselves was confirmed by the server.
    pub fn nick_changed(&mut self, nick: impl Into<String>) {
        self.session.nick = nick.into();
        self.session.pending_nick = None;
    }

    /// `Connecting | Registering | Active → Disconnected`.
    pub fn disconnected(&mut self) -> Result<(), SessionError> {
        self.transition(SessionState::Disconnected)?;
        self.session.pending_nick = None;
        Ok(())
    }

    /// `Disconnected → Reconnecting`, returning the backoff to wait.
    ///
    /// Returns `None` when no further attempt should be made: termination
    /// was requested, reconnection is disabled, or the attempts are used
    /// up. The state is left at `Disconnected` in that case.
    pub fn next_reconnect(&mut self) -> Result<Option<Duration>, SessionError> {
        if self.termination_requested
            || self.session.retry_count >= self.config.max_reconnect_attempts
        {
            return Ok(None);
        }
        self.transition(SessionState::Reconnecting)?;
        self.session.retry_count += 1;
        let delay = self.config.backoff_delay(self.session.retry_count);
        info!(
            attempt = self.session.retry_count,
            max = self.config.max_reconnect_attempts,
            delay_ms = delay.as_millis() as u64,
            "reconnecting"
        );
        Ok(Some(delay))
    }

    /// Asks for termination. The engine completes it at the next loop
    /// iteration. Idempotent.
    pub fn request_termination(&mut self) {
        if !self.termination_requested && self.state() != SessionState::Terminated {
            debug!(state = %self.state(), "termination requested");
        }
        self.termination_requested = true;
    }

    /// Any state `→ Terminated`. Idempotent.
    pub fn terminate(&mut self) {
        if self.session.state != SessionState::Terminated {
            info!(from = %self.session.state, "session terminated");
            self.session.state = SessionState::Terminated;
        }
        self.termination_requested = true;
        self.session.pending_nick = None;
    }

    // -- Guards -------------------------------------------------------------

    /// Fails unless the session is `Active`.
    pub fn require_active(&self, operation: &'static str) -> Result<(), SessionError> {
        self.require(operation, |s| s == SessionState::Active)
    }

    /// Fails unless the session is `Registering`.
    pub fn require_registering(&self, operation: &'static str) -> Result<(), SessionError> {
        self.require(operation, |s| s == SessionState::Registering)
    }

    /// Fails unless a socket is open (`Registering` or `Active`).
    pub fn require_connected(&self, operation: &'static str) -> Result<(), SessionError> {
        self.require(operation, SessionState::is_connected)
    }

    fn require(
        &self,
        operation: &'static str,
        allowed: impl Fn(SessionState) -> bool,
    ) -> Result<(), SessionError> {
        let state = self.state();
        if allowed(state) && !self.termination_requested {
            Ok(())
        } else {
            Err(SessionError::NotActive { operation, state })
        }
    }
}
