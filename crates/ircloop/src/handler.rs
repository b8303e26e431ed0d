//! The `Handler` trait, the main extension point for bot authors.
//!
//! The engine calls these methods as events arrive; the bot just reacts.
//! Every method has a no-op default, so an implementation only overrides
//! the events it cares about.

use ircloop_protocol::{ErrorReply, Message, ModeChange, Numeric};

use crate::{Client, IrcError};

/// What a handler method may fail with. Any error type will do; the
/// engine only looks at its `Display` output.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Return type of every handler method and scheduled task.
///
/// An `Err` never stops the engine. It is logged and handed to
/// [`Handler::on_fault`] as [`IrcError::MessageHandling`], and the next
/// event is dispatched as usual. Panics are treated the same way.
pub type HandlerResult = Result<(), BoxError>;

/// Reacts to IRC events.
///
/// Each method receives the [`Client`], which exposes the session state,
/// the joined channels and the outgoing operations (`join`,
/// `send_message`, `schedule`, ...). By the time a method runs, the
/// channel registry and the session already reflect the event, so e.g.
/// `on_join` sees the new member in `client.channel_info(channel)`.
///
/// "Own" variants (`on_own_join`, `on_own_part`, `on_own_kick`) fire
/// instead of the plain ones when the event concerns the local nick.
pub trait Handler: Send + 'static {
    /// The TCP connection is up and NICK/USER have been queued.
    ///
    /// Called once per connection attempt, including reconnects. The
    /// session is `Registering`, so only `register`, `change_nick` and
    /// scheduling are allowed yet.
    fn on_connect(&mut self, _client: &mut Client) -> HandlerResult {
        Ok(())
    }

    /// The server accepted our registration (`001`).
    ///
    /// Channels are not rejoined after a reconnect; do it here.
    fn on_register(&mut self, _client: &mut Client) -> HandlerResult {
        Ok(())
    }

    /// A PRIVMSG to a channel we are on.
    fn on_channel_message(
        &mut self,
        _client: &mut Client,
        _channel: &str,
        _message: &str,
        _sender: &str,
    ) -> HandlerResult {
        Ok(())
    }

    /// A PRIVMSG addressed to our nick.
    fn on_private_message(
        &mut self,
        _client: &mut Client,
        _message: &str,
        _sender: &str,
    ) -> HandlerResult {
        Ok(())
    }

    /// A NOTICE. `sender` is empty when the notice has no prefix.
    fn on_notice(
        &mut self,
        _client: &mut Client,
        _target: &str,
        _message: &str,
        _sender: &str,
    ) -> HandlerResult {
        Ok(())
    }

    /// Someone else joined `channel`.
    fn on_join(&mut self, _client: &mut Client, _channel: &str, _nick: &str) -> HandlerResult {
        Ok(())
    }

    /// We joined `channel`.
    fn on_own_join(&mut self, _client: &mut Client, _channel: &str) -> HandlerResult {
        Ok(())
    }

    /// Someone else left `channel`.
    fn on_part(
        &mut self,
        _client: &mut Client,
        _channel: &str,
        _nick: &str,
        _message: Option<&str>,
    ) -> HandlerResult {
        Ok(())
    }

    /// We left `channel`. Its state is already gone.
    fn on_own_part(&mut self, _client: &mut Client, _channel: &str) -> HandlerResult {
        Ok(())
    }

    /// `nick` quit; `channels` are the ones we shared with them.
    fn on_quit(
        &mut self,
        _client: &mut Client,
        _nick: &str,
        _message: Option<&str>,
        _channels: &[String],
    ) -> HandlerResult {
        Ok(())
    }

    /// `old` is now `new`. Also fires for our own nick.
    fn on_nick_change(&mut self, _client: &mut Client, _old: &str, _new: &str) -> HandlerResult {
        Ok(())
    }

    /// `by` kicked `nick` out of `channel`.
    fn on_kick(
        &mut self,
        _client: &mut Client,
        _channel: &str,
        _nick: &str,
        _by: &str,
        _reason: Option<&str>,
    ) -> HandlerResult {
        Ok(())
    }

    /// `by` kicked us out of `channel`.
    fn on_own_kick(
        &mut self,
        _client: &mut Client,
        _channel: &str,
        _by: &str,
        _reason: Option<&str>,
    ) -> HandlerResult {
        Ok(())
    }

    /// One channel mode change. A MODE line with several changes calls
    /// this once per change, in order.
    fn on_mode_change(
        &mut self,
        _client: &mut Client,
        _channel: &str,
        _change: &ModeChange,
        _by: &str,
    ) -> HandlerResult {
        Ok(())
    }

    /// `by` set the topic of `channel`; `None` means it was cleared.
    fn on_topic_change(
        &mut self,
        _client: &mut Client,
        _channel: &str,
        _topic: Option<&str>,
        _by: &str,
    ) -> HandlerResult {
        Ok(())
    }

    /// The server pinged us. The PONG has already been queued.
    fn on_ping(&mut self, _client: &mut Client, _server: &str) -> HandlerResult {
        Ok(())
    }

    /// Any reply numeric from 000 to 399, before its specific handling.
    fn on_response(
        &mut self,
        _client: &mut Client,
        _code: Numeric,
        _message: &Message,
    ) -> HandlerResult {
        Ok(())
    }

    /// An error numeric (400 to 599), decoded.
    fn on_error(&mut self, _client: &mut Client, _error: &ErrorReply) -> HandlerResult {
        Ok(())
    }

    /// A message no other method covers.
    fn on_unhandled(&mut self, _client: &mut Client, _message: &Message) -> HandlerResult {
        Ok(())
    }

    /// Something went wrong that the engine recovered from: a line that
    /// couldn't be parsed, or a handler method or task that failed.
    ///
    /// This cannot fail itself; a panic here is logged and dropped.
    fn on_fault(&mut self, _client: &mut Client, _error: &IrcError) {}

    /// The connection is gone. Tasks and channel state are cleared right
    /// after this returns.
    fn on_disconnect(&mut self, _client: &mut Client) -> HandlerResult {
        Ok(())
    }
}

/// A handler that ignores every event.
///
/// Useful for bots driven purely by scheduled tasks, and in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHandler;

impl Handler for NoopHandler {}
