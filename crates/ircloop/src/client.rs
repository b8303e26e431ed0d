//! The handle handlers and tasks use to act on the connection.
//!
//! Outgoing operations never touch the socket. They validate, encode and
//! queue the line; the engine writes the queue out at the top of its next
//! loop iteration. That keeps handler code synchronous and lets every
//! operation fail early with a usage error instead of a broken line.

use std::collections::VecDeque;
use std::time::Duration;

use ircloop_channel::{ChannelInfo, ChannelRegistry};
use ircloop_protocol::{ChannelModes, Command, MemberFlag, ModeChange, ProtocolError};
use ircloop_session::{SessionMachine, SessionState};
use ircloop_task::{SchedulerMetrics, TaskId, TaskScheduler};
use tracing::{debug, info, trace};

use crate::{EngineConfig, HandlerResult, IrcError};

/// A scheduled callback.
pub type Task = Box<dyn FnMut(&mut Client) -> HandlerResult + Send>;

/// Session state, channel state, tasks and the outgoing queue of the one
/// connection an [`Engine`](crate::Engine) drives.
pub struct Client {
    session: SessionMachine,
    channels: ChannelRegistry,
    pub(crate) tasks: TaskScheduler<Task>,
    outbound: VecDeque<String>,
    current_task: Option<TaskId>,
    username: String,
    realname: String,
    max_line_len: usize,
}

impl Client {
    pub(crate) fn new(config: &EngineConfig) -> Self {
        Self {
            session: SessionMachine::new(config.nick.clone(), config.session.clone()),
            channels: ChannelRegistry::new(),
            tasks: TaskScheduler::default(),
            outbound: VecDeque::new(),
            current_task: None,
            username: config.username.clone(),
            realname: config.realname.clone(),
            max_line_len: config.max_line_len,
        }
    }

    // -- State --------------------------------------------------------------

    /// Our nick as the server last confirmed it.
    pub fn nick(&self) -> &str {
        self.session.nick()
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// The server name from the welcome reply.
    pub fn server(&self) -> Option<&str> {
        self.session.server()
    }

    /// Read access to the session, e.g. for the pending nick or retry count.
    pub fn session(&self) -> &SessionMachine {
        &self.session
    }

    /// Every channel we are on.
    pub fn channels(&self) -> impl Iterator<Item = &ChannelInfo> {
        self.channels.channels()
    }

    /// A snapshot of the topic and members of `name`, if we are on it.
    pub fn channel_info(&self, name: &str) -> Option<ChannelInfo> {
        self.channels.channel(name).cloned()
    }

    /// The channel modes the server advertised, or the RFC 2811 set.
    pub fn channel_modes(&self) -> &ChannelModes {
        self.channels.modes()
    }

    /// Whether we are on `channel`.
    pub fn is_on(&self, channel: &str) -> bool {
        self.channels.contains(channel)
    }

    /// The task whose callback is running right now.
    ///
    /// Lets a periodic callback cancel or reschedule itself.
    pub fn current_task(&self) -> Option<TaskId> {
        self.current_task
    }

    pub fn task_metrics(&self) -> &SchedulerMetrics {
        self.tasks.metrics()
    }

    // -- Channel operations -------------------------------------------------

    /// Joins `channel`, with an optional key.
    pub fn join(&mut self, channel: &str, key: Option<&str>) -> Result<(), IrcError> {
        self.session.require_active("join")?;
        self.send(Command::Join {
            channel: channel.to_owned(),
            key: key.map(str::to_owned),
        })
    }

    /// Leaves `channel`.
    pub fn part(&mut self, channel: &str, message: Option<&str>) -> Result<(), IrcError> {
        self.session.require_active("part")?;
        self.send(Command::Part {
            channel: channel.to_owned(),
            message: message.map(str::to_owned),
        })
    }

    /// Sends `text` to `channel`.
    pub fn send_message(&mut self, channel: &str, text: &str) -> Result<(), IrcError> {
        self.session.require_active("send_message")?;
        self.send(Command::Privmsg {
            target: channel.to_owned(),
            text: text.to_owned(),
        })
    }

    /// Sends `text` to `channel` after `delay`.
    ///
    /// The line is validated now. The returned id can be cancelled until it
    /// fires; a disconnect drops it.
    pub fn send_message_delayed(
        &mut self,
        channel: &str,
        text: &str,
        delay: Duration,
    ) -> Result<TaskId, IrcError> {
        self.session.require_active("send_message_delayed")?;
        let mut line = Some(self.encode(&Command::Privmsg {
            target: channel.to_owned(),
            text: text.to_owned(),
        })?);
        self.schedule(delay, move |client| {
            if let Some(line) = line.take() {
                client.enqueue(line);
            }
            Ok(())
        })
    }

    /// Sends `text` to `nick`.
    pub fn send_private_message(&mut self, nick: &str, text: &str) -> Result<(), IrcError> {
        self.session.require_active("send_private_message")?;
        self.send(Command::Privmsg {
            target: nick.to_owned(),
            text: text.to_owned(),
        })
    }

    /// Sends a NOTICE to a channel or nick.
    pub fn send_notice(&mut self, target: &str, text: &str) -> Result<(), IrcError> {
        self.session.require_active("send_notice")?;
        self.send(Command::Notice {
            target: target.to_owned(),
            text: text.to_owned(),
        })
    }

    /// Gives or takes op or voice.
    pub fn set_member_mode(
        &mut self,
        channel: &str,
        nick: &str,
        flag: MemberFlag,
        enabled: bool,
    ) -> Result<(), IrcError> {
        self.session.require_active("set_member_mode")?;
        self.send(Command::Mode {
            channel: channel.to_owned(),
            change: ModeChange {
                added: enabled,
                mode: flag.letter(),
                arg: Some(nick.to_owned()),
            },
        })
    }

    pub fn kick(&mut self, channel: &str, nick: &str, reason: Option<&str>) -> Result<(), IrcError> {
        self.session.require_active("kick")?;
        self.send(Command::Kick {
            channel: channel.to_owned(),
            nick: nick.to_owned(),
            reason: reason.map(str::to_owned),
        })
    }

    /// Sets the topic. An empty `topic` clears it.
    pub fn set_topic(&mut self, channel: &str, topic: &str) -> Result<(), IrcError> {
        self.session.require_active("set_topic")?;
        self.send(Command::Topic {
            channel: channel.to_owned(),
            topic: topic.to_owned(),
        })
    }

    // -- Nick ---------------------------------------------------------------

    /// Asks for a new nick. [`nick`](Self::nick) changes once the server
    /// confirms it.
    pub fn change_nick(&mut self, nick: &str) -> Result<(), IrcError> {
        self.session.require_connected("change_nick")?;
        self.send(Command::Nick(nick.to_owned()))?;
        self.session.nick_requested(nick);
        Ok(())
    }

    /// Retries registration with another nick, typically from `on_error`
    /// after the first one was taken.
    pub fn register(&mut self, nick: &str) -> Result<(), IrcError> {
        self.session.require_registering("register")?;
        self.send(Command::Nick(nick.to_owned()))?;
        self.session.nick_requested(nick);
        Ok(())
    }

    // -- Lifecycle ----------------------------------------------------------

    /// Ends the session: cancels every task, sends QUIT if connected, and
    /// makes [`Engine::run`](crate::Engine::run) return `Ok(())` after the
    /// current iteration. Calling it again does nothing.
    pub fn terminate(&mut self, message: Option<&str>) -> Result<(), IrcError> {
        if self.session.termination_requested() {
            return Ok(());
        }
        if self.state().is_connected() {
            self.send(Command::Quit(message.map(str::to_owned)))?;
        }
        self.tasks.clear();
        self.session.request_termination();
        info!(state = %self.state(), "terminating");
        Ok(())
    }

    // -- Tasks --------------------------------------------------------------

    /// Runs `f` once, `delay` from now.
    pub fn schedule<F>(&mut self, delay: Duration, f: F) -> Result<TaskId, IrcError>
    where
        F: FnMut(&mut Client) -> HandlerResult + Send + 'static,
    {
        self.session.require_connected("schedule")?;
        Ok(self.tasks.schedule(delay, Box::new(f))?)
    }

    /// Runs `f` every `interval`, first after one interval.
    pub fn schedule_periodic<F>(&mut self, interval: Duration, f: F) -> Result<TaskId, IrcError>
    where
        F: FnMut(&mut Client) -> HandlerResult + Send + 'static,
    {
        self.session.require_connected("schedule_periodic")?;
        Ok(self.tasks.schedule_periodic(interval, Box::new(f))?)
    }

    /// Cancels a task. Returns `false` if it already fired or was
    /// cancelled.
    pub fn cancel_task(&mut self, id: TaskId) -> bool {
        self.tasks.cancel(id)
    }

    /// Moves a pending task to fire `delay` from now.
    pub fn reschedule_task(&mut self, id: TaskId, delay: Duration) -> Result<(), IrcError> {
        Ok(self.tasks.reschedule(id, delay)?)
    }

    // -- Engine side --------------------------------------------------------

    pub(crate) fn session_mut(&mut self) -> &mut SessionMachine {
        &mut self.session
    }

    pub(crate) fn channels_mut(&mut self) -> &mut ChannelRegistry {
        &mut self.channels
    }

    pub(crate) fn set_current_task(&mut self, id: Option<TaskId>) {
        self.current_task = id;
    }

    /// Queues NICK and USER for a fresh connection.
    pub(crate) fn queue_registration(&mut self) -> Result<(), IrcError> {
        self.send(Command::Nick(self.session.nick().to_owned()))?;
        self.send(Command::User {
            user: self.username.clone(),
            realname: self.realname.clone(),
        })
    }

    /// Queues a command without checking the session state.
    pub(crate) fn send(&mut self, command: Command) -> Result<(), IrcError> {
        let line = self.encode(&command)?;
        self.enqueue(line);
        Ok(())
    }

    pub(crate) fn next_outbound(&mut self) -> Option<String> {
        self.outbound.pop_front()
    }

    /// Drops everything tied to the connection that just ended.
    pub(crate) fn reset_connection_state(&mut self) {
        self.channels.clear();
        self.tasks.clear();
        self.current_task = None;
        if !self.outbound.is_empty() {
            debug!(count = self.outbound.len(), "dropping unsent lines");
            self.outbound.clear();
        }
    }

    fn encode(&self, command: &Command) -> Result<String, IrcError> {
        command.encode(self.max_line_len).map_err(|e| {
            // An overlong outgoing line is the caller's mistake, not a
            // framing error on the wire.
            let e = match e {
                ProtocolError::LineTooLong { limit } => {
                    ProtocolError::InvalidParameter(format!("line would exceed {limit} bytes"))
                }
                other => other,
            };
            IrcError::Protocol(e)
        })
    }

    fn enqueue(&mut self, line: String) {
        trace!(line = line.trim_end(), "queued");
        self.outbound.push_back(line);
    }
}
