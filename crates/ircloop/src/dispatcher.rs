//! Turns parsed messages into state updates and handler calls.
//!
//! For every message the registry and the session are updated first, then
//! the handler method runs, so the handler always sees the state after
//! the event. Handler calls and task callbacks are isolated: an `Err` or
//! a panic becomes a [`IrcError::MessageHandling`] fault and dispatch
//! carries on with the next event.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

use ircloop_protocol::{
    Command, ErrorReply, Message, MessageTarget, ModeChange, Numeric, ProtocolError, irc_eq,
    is_channel_name,
};
use ircloop_session::SessionState;
use tokio::time::Instant;
use tracing::{debug, error, trace, warn};

use crate::{Client, Handler, HandlerResult, IrcError};

/// What the engine does after a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    /// The server sent ERROR and is about to close the link.
    Disconnect(String),
}

/// Parses one framed line and dispatches it. A line that doesn't parse is
/// reported as a fault and produces no event.
pub(crate) fn handle_line<H: Handler>(
    client: &mut Client,
    handler: &mut H,
    line: Result<String, ProtocolError>,
) -> Flow {
    match line.and_then(|line| Message::parse(&line)) {
        Ok(msg) => {
            trace!(line = %msg, "received");
            dispatch(client, handler, &msg)
        }
        Err(e) => {
            report_fault(client, handler, IrcError::Protocol(e));
            Flow::Continue
        }
    }
}

/// Routes one message.
pub(crate) fn dispatch<H: Handler>(client: &mut Client, handler: &mut H, msg: &Message) -> Flow {
    if let Some(code) = msg.numeric() {
        numeric(client, handler, code, msg);
        return Flow::Continue;
    }
    match msg.command.as_str() {
        "PING" => ping(client, handler, msg),
        "PRIVMSG" => privmsg(client, handler, msg),
        "NOTICE" => notice(client, handler, msg),
        "JOIN" => join(client, handler, msg),
        "PART" => part(client, handler, msg),
        "KICK" => kick(client, handler, msg),
        "QUIT" => quit(client, handler, msg),
        "NICK" => nick(client, handler, msg),
        "MODE" => mode(client, handler, msg),
        "TOPIC" => topic(client, handler, msg),
        "ERROR" => {
            let reason = msg.param(0).unwrap_or("closing link").to_owned();
            warn!(%reason, "server sent ERROR");
            return Flow::Disconnect(reason);
        }
        _ => unhandled(client, handler, msg),
    }
    Flow::Continue
}

/// Fires every task that is due, in deadline order.
pub(crate) fn run_due_tasks<H: Handler>(client: &mut Client, handler: &mut H) {
    let now = Instant::now();
    while let Some(mut due) = client.tasks.pop_due(now) {
        client.set_current_task(Some(due.id()));
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| (due.payload)(&mut *client)));
        client.set_current_task(None);
        let id = due.id();
        client.tasks.complete(due);

        if let Some(reason) = failure_reason(outcome) {
            debug!(%id, "task failed");
            report_fault(client, handler, IrcError::MessageHandling {
                event: "task",
                reason,
            });
        }
        if client.session().termination_requested() {
            break;
        }
    }
}

/// Logs a recovered fault and hands it to [`Handler::on_fault`].
pub(crate) fn report_fault<H: Handler>(client: &mut Client, handler: &mut H, fault: IrcError) {
    warn!(kind = ?fault.kind(), error = %fault, "recovered fault");
    let reported = panic::catch_unwind(AssertUnwindSafe(|| {
        handler.on_fault(&mut *client, &fault);
    }));
    if reported.is_err() {
        error!(error = %fault, "on_fault panicked while reporting");
    }
}

/// Runs one handler method, turning an `Err` or a panic into a fault.
pub(crate) fn invoke<H, F>(client: &mut Client, handler: &mut H, event: &'static str, f: F)
where
    H: Handler,
    F: FnOnce(&mut H, &mut Client) -> HandlerResult,
{
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| f(&mut *handler, &mut *client)));
    if let Some(reason) = failure_reason(outcome) {
        report_fault(client, handler, IrcError::MessageHandling { event, reason });
    }
}

fn failure_reason(outcome: thread::Result<HandlerResult>) -> Option<String> {
    match outcome {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e.to_string()),
        Err(payload) => Some(format!("panicked: {}", panic_message(&*payload))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

fn is_self(client: &Client, nick: &str) -> bool {
    irc_eq(nick, client.nick())
}

fn channel_list(param: &str) -> impl Iterator<Item = &str> {
    param.split(',').filter(|c| !c.is_empty())
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn ping<H: Handler>(client: &mut Client, handler: &mut H, msg: &Message) {
    let token = msg
        .param(0)
        .or(msg.prefix.as_deref())
        .unwrap_or_default()
        .to_owned();
    if let Err(e) = client.send(Command::Pong(token.clone())) {
        warn!(error = %e, "could not answer PING");
    }
    invoke(client, handler, "on_ping", |h, c| h.on_ping(c, &token));
}

fn privmsg<H: Handler>(client: &mut Client, handler: &mut H, msg: &Message) {
    let (Some(targets), Some(text)) = (msg.param(0), msg.param(1)) else {
        return unhandled(client, handler, msg);
    };
    let sender = msg.source_nick().unwrap_or_default();
    if is_self(client, sender) {
        trace!("ignoring our own PRIVMSG");
        return;
    }

    let mut routed = false;
    for target in MessageTarget::parse_list(targets) {
        match &target {
            MessageTarget::Channel(channel) if client.is_on(channel) => {
                routed = true;
                invoke(client, handler, "on_channel_message", |h, c| {
                    h.on_channel_message(c, channel, text, sender)
                });
            }
            MessageTarget::Nick { nick, .. } if is_self(client, nick) => {
                routed = true;
                invoke(client, handler, "on_private_message", |h, c| {
                    h.on_private_message(c, text, sender)
                });
            }
            _ => debug!(?target, "PRIVMSG for a target we don't track"),
        }
    }
    if !routed {
        unhandled(client, handler, msg);
    }
}

fn notice<H: Handler>(client: &mut Client, handler: &mut H, msg: &Message) {
    let (Some(target), Some(text)) = (msg.param(0), msg.param(1)) else {
        return unhandled(client, handler, msg);
    };
    let sender = msg.source_nick().unwrap_or_default();
    invoke(client, handler, "on_notice", |h, c| {
        h.on_notice(c, target, text, sender)
    });
}

fn join<H: Handler>(client: &mut Client, handler: &mut H, msg: &Message) {
    let (Some(nick), Some(channels)) = (msg.source_nick(), msg.param(0)) else {
        return unhandled(client, handler, msg);
    };
    for channel in channel_list(channels) {
        if is_self(client, nick) {
            let registry = client.channels_mut();
            registry.join_self(channel);
            registry.add_member(channel, nick);
            invoke(client, handler, "on_own_join", |h, c| h.on_own_join(c, channel));
        } else {
            client.channels_mut().add_member(channel, nick);
            invoke(client, handler, "on_join", |h, c| h.on_join(c, channel, nick));
        }
    }
}

fn part<H: Handler>(client: &mut Client, handler: &mut H, msg: &Message) {
    let (Some(nick), Some(channels)) = (msg.source_nick(), msg.param(0)) else {
        return unhandled(client, handler, msg);
    };
    let message = msg.param(1);
    for channel in channel_list(channels) {
        if is_self(client, nick) {
            client.channels_mut().remove_channel(channel);
            invoke(client, handler, "on_own_part", |h, c| h.on_own_part(c, channel));
        } else {
            client.channels_mut().remove_member(channel, nick);
            invoke(client, handler, "on_part", |h, c| {
                h.on_part(c, channel, nick, message)
            });
        }
    }
}

fn kick<H: Handler>(client: &mut Client, handler: &mut H, msg: &Message) {
    let (Some(channel), Some(victims)) = (msg.param(0), msg.param(1)) else {
        return unhandled(client, handler, msg);
    };
    let by = msg.source_nick().unwrap_or_default();
    let reason = msg.param(2);
    for victim in channel_list(victims) {
        if is_self(client, victim) {
            client.channels_mut().remove_channel(channel);
            invoke(client, handler, "on_own_kick", |h, c| {
                h.on_own_kick(c, channel, by, reason)
            });
        } else {
            client.channels_mut().remove_member(channel, victim);
            invoke(client, handler, "on_kick", |h, c| {
                h.on_kick(c, channel, victim, by, reason)
            });
        }
    }
}

fn quit<H: Handler>(client: &mut Client, handler: &mut H, msg: &Message) {
    let Some(nick) = msg.source_nick() else {
        return unhandled(client, handler, msg);
    };
    let channels = client.channels_mut().quit(nick);
    invoke(client, handler, "on_quit", |h, c| {
        h.on_quit(c, nick, msg.param(0), &channels)
    });
}

fn nick<H: Handler>(client: &mut Client, handler: &mut H, msg: &Message) {
    let (Some(old), Some(new)) = (msg.source_nick(), msg.param(0)) else {
        return unhandled(client, handler, msg);
    };
    if is_self(client, old) {
        debug!(%old, %new, "our nick changed");
        client.session_mut().nick_changed(new);
    }
    client.channels_mut().rename(old, new);
    invoke(client, handler, "on_nick_change", |h, c| h.on_nick_change(c, old, new));
}

fn mode<H: Handler>(client: &mut Client, handler: &mut H, msg: &Message) {
    let Some(channel) = msg.param(0).filter(|t| is_channel_name(t)) else {
        // User modes aren't tracked.
        return unhandled(client, handler, msg);
    };
    let by = msg.source_nick().unwrap_or_default();
    let changes = ModeChange::parse_channel_with(&msg.params[1..], client.channel_modes());
    for change in changes {
        if let (Some(flag), Some(nick)) = (change.member_flag(), change.arg.as_deref()) {
            client.channels_mut().set_flag(channel, nick, flag, change.added);
        }
        invoke(client, handler, "on_mode_change", |h, c| {
            h.on_mode_change(c, channel, &change, by)
        });
    }
}

fn topic<H: Handler>(client: &mut Client, handler: &mut H, msg: &Message) {
    let Some(channel) = msg.param(0) else {
        return unhandled(client, handler, msg);
    };
    let by = msg.source_nick().unwrap_or_default();
    let topic = msg.param(1).filter(|t| !t.is_empty());
    client.channels_mut().set_topic(channel, topic);
    invoke(client, handler, "on_topic_change", |h, c| {
        h.on_topic_change(c, channel, topic, by)
    });
}

fn unhandled<H: Handler>(client: &mut Client, handler: &mut H, msg: &Message) {
    trace!(command = %msg.command, "unhandled message");
    invoke(client, handler, "on_unhandled", |h, c| h.on_unhandled(c, msg));
}

// ---------------------------------------------------------------------------
// Numerics
// ---------------------------------------------------------------------------

fn numeric<H: Handler>(client: &mut Client, handler: &mut H, code: Numeric, msg: &Message) {
    if code.is_response() {
        invoke(client, handler, "on_response", |h, c| h.on_response(c, code, msg));
        match code {
            Numeric::RPL_WELCOME => welcome(client, handler, msg),
            Numeric::RPL_ISUPPORT => client.channels_mut().apply_isupport(&msg.params),
            Numeric::RPL_TOPIC => {
                if let (Some(channel), Some(topic)) = (msg.param(1), msg.param(2)) {
                    client.channels_mut().set_topic(channel, Some(topic));
                }
            }
            Numeric::RPL_NAMREPLY => {
                // `<me> [=*@] <channel> :<names>`; the type symbol is
                // sometimes left out, so count from the end.
                if let [.., channel, names] = msg.params.as_slice() {
                    let added = client.channels_mut().add_names(channel, names);
                    trace!(%channel, added, "names reply");
                }
            }
            _ => {}
        }
    } else if code.is_error() {
        let Some(reply) = ErrorReply::from_message(msg) else {
            return;
        };
        if code.is_nick_refusal()
            && matches!(client.state(), SessionState::Registering | SessionState::Active)
        {
            if let Err(e) = client.session_mut().nick_rejected() {
                warn!(error = %e, "could not record rejected nick");
            }
        }
        debug!(error = %reply, "error reply");
        invoke(client, handler, "on_error", |h, c| h.on_error(c, &reply));
    } else {
        unhandled(client, handler, msg);
    }
}

fn welcome<H: Handler>(client: &mut Client, handler: &mut H, msg: &Message) {
    let nick = msg.param(0).unwrap_or(client.nick()).to_owned();
    match client.session_mut().registered(nick, msg.prefix.clone()) {
        Ok(()) => invoke(client, handler, "on_register", |h, c| h.on_register(c)),
        Err(e) => warn!(error = %e, "ignoring unexpected welcome reply"),
    }
}
