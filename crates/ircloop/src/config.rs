//! Engine configuration.

use ircloop_protocol::DEFAULT_MAX_LINE_LEN;
use ircloop_session::SessionConfig;
use serde::{Deserialize, Serialize};

/// Where to connect, who to be, and how to frame lines.
///
/// Missing fields fall back to the defaults when deserializing, so a
/// config file only needs the fields it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Server host name or address.
    ///
    /// Default: `"localhost"`.
    pub server: String,

    /// Server port.
    ///
    /// Default: 6667.
    pub port: u16,

    /// The nick sent at registration.
    ///
    /// Default: `"ircloop"`.
    pub nick: String,

    /// The user name sent with USER.
    ///
    /// Default: `"ircloop"`.
    pub username: String,

    /// The real name sent with USER.
    ///
    /// Default: `"ircloop"`.
    pub realname: String,

    /// Longest line accepted or sent, counting the `\r\n`.
    ///
    /// Default: 512, the RFC 2812 limit.
    pub max_line_len: usize,

    /// Size of the socket read buffer in bytes.
    ///
    /// Default: 4096.
    pub read_buffer_size: usize,

    /// Connect timeout and reconnection policy.
    pub session: SessionConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            server: "localhost".to_string(),
            port: 6667,
            nick: "ircloop".to_string(),
            username: "ircloop".to_string(),
            realname: "ircloop".to_string(),
            max_line_len: DEFAULT_MAX_LINE_LEN,
            read_buffer_size: 4096,
            session: SessionConfig::default(),
        }
    }
}

impl EngineConfig {
    /// `server:port`, as handed to the connector.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.server, self.port)
    }
}
