use std::time::Duration;

use ircloop::prelude::*;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Engine settings plus the channels to sit in.
///
/// ```json
/// { "server": "irc.libera.chat", "nick": "echo", "channels": ["#ircloop"] }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct BotConfig {
    #[serde(flatten)]
    engine: EngineConfig,
    #[serde(default)]
    channels: Vec<String>,
}

fn load_config() -> Result<BotConfig, Box<dyn std::error::Error>> {
    match std::env::args().nth(1) {
        Some(path) => Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?),
        None => Ok(BotConfig {
            engine: EngineConfig {
                nick: "echo-bot".into(),
                ..EngineConfig::default()
            },
            channels: vec!["#ircloop".into()],
        }),
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq)]
enum BotCommand<'a> {
    Echo(&'a str),
    Later(Duration, &'a str),
    Quit,
}

/// Parses `!echo <text>`, `!later <secs> <text>` and `!quit`.
fn parse_command(message: &str) -> Option<BotCommand<'_>> {
    let (word, rest) = message.split_once(' ').unwrap_or((message, ""));
    match word {
        "!echo" if !rest.is_empty() => Some(BotCommand::Echo(rest)),
        "!later" => {
            let (secs, text) = rest.split_once(' ')?;
            let secs: u64 = secs.parse().ok().filter(|s| (1..=3600).contains(s))?;
            Some(BotCommand::Later(Duration::from_secs(secs), text))
        }
        "!quit" => Some(BotCommand::Quit),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

struct EchoBot {
    channels: Vec<String>,
}

impl Handler for EchoBot {
    fn on_register(&mut self, client: &mut Client) -> HandlerResult {
        for channel in &self.channels {
            client.join(channel, None)?;
        }
        Ok(())
    }

    fn on_error(&mut self, client: &mut Client, error: &ErrorReply) -> HandlerResult {
        if let ErrorReply::NicknameInUse { nick, .. } = error {
            if client.state() == SessionState::Registering {
                client.register(&format!("{nick}_"))?;
            }
        }
        Ok(())
    }

    fn on_channel_message(
        &mut self,
        client: &mut Client,
        channel: &str,
        message: &str,
        sender: &str,
    ) -> HandlerResult {
        match parse_command(message) {
            Some(BotCommand::Echo(text)) => client.send_message(channel, text)?,
            Some(BotCommand::Later(delay, text)) => {
                client.send_message_delayed(channel, &format!("{sender}: {text}"), delay)?;
            }
            Some(BotCommand::Quit) => client.terminate(Some("asked to leave"))?,
            None => {}
        }
        Ok(())
    }

    fn on_private_message(&mut self, client: &mut Client, message: &str, sender: &str) -> HandlerResult {
        client.send_notice(sender, message)?;
        Ok(())
    }

    fn on_own_kick(
        &mut self,
        client: &mut Client,
        channel: &str,
        by: &str,
        _reason: Option<&str>,
    ) -> HandlerResult {
        tracing::info!(%channel, %by, "kicked, rejoining in 10s");
        let channel = channel.to_owned();
        client.schedule(Duration::from_secs(10), move |client| {
            client.join(&channel, None)?;
            Ok(())
        })?;
        Ok(())
    }

    fn on_fault(&mut self, _client: &mut Client, error: &IrcError) {
        tracing::warn!(kind = ?error.kind(), %error, "echo-bot fault");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_config()?;
    tracing::info!(addr = %config.engine.addr(), nick = %config.engine.nick, "starting echo-bot");

    let mut engine = Engine::builder().config(config.engine).build(EchoBot {
        channels: config.channels,
    });
    engine.run().await?;
    Ok(())
}
