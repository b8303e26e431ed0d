//! Session types: the record of the one connection the engine owns.
//!
//! A session tracks:
//! - WHERE the connection is in its lifecycle ([`SessionState`])
//! - WHO we are on the server (the confirmed nick, plus a pending attempt)
//! - WHICH server answered the registration
//! - HOW many reconnects have been tried since the last good registration

use std::fmt;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Timeouts and reconnection policy.
///
/// Sensible defaults are provided; override just the fields you care about
/// with struct update syntax, or deserialize from a config file (missing
/// fields fall back to the defaults).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How long a TCP connect may take before it counts as failed.
    ///
    /// Default: 10 seconds.
    pub connect_timeout_secs: u64,

    /// How many reconnects are tried after a connection is lost, counted
    /// from the last successful registration.
    ///
    /// Default: 5. Set to 0 to disable reconnection entirely.
    pub max_reconnect_attempts: u32,

    /// Delay before the first reconnect. Doubles on every further attempt.
    ///
    /// Default: 2 seconds.
    pub reconnect_base_delay_ms: u64,

    /// Upper bound for the doubled delay.
    ///
    /// Default: 60 seconds.
    pub reconnect_max_delay_ms: u64,

    /// Random extra delay (0 to this value) added to every reconnect so a
    /// fleet of bots doesn't hammer a restarted server in lockstep.
    ///
    /// Default: 1 second.
    pub reconnect_jitter_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            max_reconnect_attempts: 5,
            reconnect_base_delay_ms: 2_000,
            reconnect_max_delay_ms: 60_000,
            reconnect_jitter_ms: 1_000,
        }
    }
}

impl SessionConfig {
    /// The connect timeout as a `Duration`.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Whether lost connections are retried at all.
    pub fn reconnect_enabled(&self) -> bool {
        self.max_reconnect_attempts > 0
    }

    /// Backoff before reconnect number `attempt` (1-based):
    /// `min(base * 2^(attempt-1), max) + jitter`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let base = self
            .reconnect_base_delay_ms
            .saturating_mul(1u64 << exponent)
            .min(self.reconnect_max_delay_ms);
        let jitter = if self.reconnect_jitter_ms > 0 {
            rand::rng().random_range(0..=self.reconnect_jitter_ms)
        } else {
            0
        };
        Duration::from_millis(base.saturating_add(jitter))
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Where the connection is in its lifecycle.
///
/// ```text
///   Idle ──→ Connecting ──→ Registering ──→ Active
///               ↑   │            │  ↺          │
///               │   └────────────┴─────┬───────┘
///               │                      ▼
///          Reconnecting ←──────── Disconnected
///
///   any state ──→ Terminated (absorbing)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Created, `run` not called yet.
    Idle,
    /// TCP connect in progress.
    Connecting,
    /// NICK/USER sent, waiting for the welcome reply.
    Registering,
    /// Registered; client operations are allowed.
    Active,
    /// The connection is gone.
    Disconnected,
    /// Waiting out the backoff before the next connect.
    Reconnecting,
    /// Finished for good.
    Terminated,
}

impl SessionState {
    /// Whether the machine may move from `self` to `to`.
    pub fn can_transition_to(self, to: SessionState) -> bool {
        use SessionState::*;
        match (self, to) {
            (Terminated, _) => false,
            (_, Terminated) => true,
            (Idle, Connecting)
            | (Connecting, Registering)
            | (Connecting, Disconnected)
            | (Registering, Registering)
            | (Registering, Active)
            | (Registering, Disconnected)
            | (Active, Disconnected)
            | (Disconnected, Reconnecting)
            | (Reconnecting, Connecting) => true,
            _ => false,
        }
    }

    /// Whether a socket is open (registering or registered).
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Registering | Self::Active)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Registering => "registering",
            Self::Active => "active",
            Self::Disconnected => "disconnected",
            Self::Reconnecting => "reconnecting",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// The engine's view of its one connection.
#[derive(Debug, Clone)]
pub struct Session {
    /// Current lifecycle state.
    pub state: SessionState,

    /// The nick the server confirmed. Before the first welcome this is the
    /// configured nick.
    pub nick: String,

    /// The server name taken from the welcome reply's prefix.
    pub server: Option<String>,

    /// A nick sent with NICK that the server hasn't confirmed yet.
    pub pending_nick: Option<String>,

    /// Reconnects tried since the last successful registration.
    pub retry_count: u32,
}

impl Session {
    /// A fresh, idle session for `nick`.
    pub fn new(nick: impl Into<String>) -> Self {
        Self {
            state: SessionState::Idle,
            nick: nick.into(),
            server: None,
            pending_nick: None,
            retry_count: 0,
        }
    }
}
