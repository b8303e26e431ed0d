//! Numeric replies and the typed error-reply table.
//!
//! Every numeric the server sends has its own parameter layout. Instead of
//! handing those around as an untyped list, the error numerics (RFC 2812
//! §5.2) are decoded into [`ErrorReply`], one variant per code, each with
//! the named fields that code carries. Anything outside the table lands in
//! [`ErrorReply::Unknown`] with the raw parameters.

use std::fmt;

use tracing::warn;

use crate::Message;

/// A three-digit reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Numeric(pub u16);

impl Numeric {
    pub const RPL_WELCOME: Self = Self(1);
    pub const RPL_ISUPPORT: Self = Self(5);
    pub const RPL_TOPIC: Self = Self(332);
    pub const RPL_NAMREPLY: Self = Self(353);
    pub const ERR_ERRONEUSNICKNAME: Self = Self(432);
    pub const ERR_NICKNAMEINUSE: Self = Self(433);
    pub const ERR_NICKCOLLISION: Self = Self(436);

    /// Parses a command token that is exactly three ASCII digits.
    pub fn from_command(command: &str) -> Option<Self> {
        if command.len() == 3 && command.bytes().all(|b| b.is_ascii_digit()) {
            command.parse().ok().map(Self)
        } else {
            None
        }
    }

    /// Command responses and status replies (000–399).
    pub fn is_response(self) -> bool {
        self.0 <= 399
    }

    /// The server refused a NICK (432, 433 or 436).
    pub fn is_nick_refusal(self) -> bool {
        matches!(
            self,
            Self::ERR_ERRONEUSNICKNAME | Self::ERR_NICKNAMEINUSE | Self::ERR_NICKCOLLISION
        )
    }

    /// Error replies (400–599).
    pub fn is_error(self) -> bool {
        (400..=599).contains(&self.0)
    }
}

impl fmt::Display for Numeric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}", self.0)
    }
}

macro_rules! error_replies {
    ($( $code:literal => $variant:ident { $($field:ident),* } ),* $(,)?) => {
        /// An error numeric decoded into its named fields.
        ///
        /// The numeric's first parameter (the client's own nick) is not
        /// included. Every variant ends with the human-readable `message`.
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub enum ErrorReply {
            $(
                $variant { $($field: String,)* message: String },
            )*
            /// A code outside the table; `params` are kept verbatim.
            Unknown { code: u16, params: Vec<String> },
        }

        impl ErrorReply {
            /// The numeric code.
            pub fn code(&self) -> u16 {
                match self {
                    $( Self::$variant { .. } => $code, )*
                    Self::Unknown { code, .. } => *code,
                }
            }

            /// The variant name, e.g. `"NicknameInUse"`.
            pub fn name(&self) -> &'static str {
                match self {
                    $( Self::$variant { .. } => stringify!($variant), )*
                    Self::Unknown { .. } => "Unknown",
                }
            }

            /// The fields as `(name, value)` pairs, in wire order.
            pub fn params(&self) -> Vec<(&'static str, &str)> {
                match self {
                    $(
                        Self::$variant { $($field,)* message } => vec![
                            $( (stringify!($field), $field.as_str()), )*
                            ("message", message.as_str()),
                        ],
                    )*
                    Self::Unknown { params, .. } => {
                        params.iter().map(|p| ("param", p.as_str())).collect()
                    }
                }
            }

            /// Decodes `params` (without the leading target nick) for `code`.
            ///
            /// Fields are filled from the front. Whatever is left is joined
            /// into `message`. Missing fields are left empty and logged,
            /// since servers don't always follow the RFC layout.
            pub fn from_params(code: u16, params: &[String]) -> Self {
                match code {
                    $(
                        $code => {
                            let names: &[&str] = &[$(stringify!($field)),*];
                            if params.len() < names.len() + 1 {
                                warn!(
                                    code,
                                    expected = names.len() + 1,
                                    got = params.len(),
                                    "error reply with too few parameters"
                                );
                            }
                            let it = &mut params.iter();
                            $( let $field = it.next().cloned().unwrap_or_default(); )*
                            let message = it.map(String::as_str).collect::<Vec<_>>().join(" ");
                            Self::$variant { $($field,)* message }
                        }
                    )*
                    _ => Self::Unknown { code, params: params.to_vec() },
                }
            }
        }
    };
}

error_replies! {
    401 => NoSuchNick { nick },
    402 => NoSuchServer { server },
    403 => NoSuchChannel { channel },
    404 => CannotSendToChan { channel },
    405 => TooManyChannels { channel },
    406 => WasNoSuchNick { nick },
    407 => TooManyTargets { target },
    408 => NoSuchService { service },
    409 => NoOrigin {},
    411 => NoRecipient {},
    412 => NoTextToSend {},
    413 => NoTopLevel { mask },
    414 => WildTopLevel { mask },
    415 => BadMask { mask },
    421 => UnknownCommand { command },
    422 => NoMotd {},
    423 => NoAdminInfo { server },
    424 => FileError {},
    431 => NoNicknameGiven {},
    432 => ErroneousNickname { nick },
    433 => NicknameInUse { nick },
    436 => NickCollision { nick },
    437 => UnavailResource { target },
    441 => UserNotInChannel { nick, channel },
    442 => NotOnChannel { channel },
    443 => UserOnChannel { user, channel },
    444 => NoLogin { user },
    445 => SummonDisabled {},
    446 => UsersDisabled {},
    451 => NotRegistered {},
    461 => NeedMoreParams { command },
    462 => AlreadyRegistered {},
    463 => NoPermForHost {},
    464 => PasswdMismatch {},
    465 => YoureBannedCreep {},
    466 => YouWillBeBanned {},
    467 => KeySet { channel },
    471 => ChannelIsFull { channel },
    472 => UnknownMode { mode },
    473 => InviteOnlyChan { channel },
    474 => BannedFromChan { channel },
    475 => BadChannelKey { channel },
    476 => BadChanMask { channel },
    477 => NoChanModes { channel },
    478 => BanListFull { channel, mode },
    481 => NoPrivileges {},
    482 => ChanOPrivsNeeded { channel },
    483 => CantKillServer {},
    484 => Restricted {},
    485 => UniqOpPrivsNeeded {},
    491 => NoOperHost {},
    501 => UModeUnknownFlag {},
    502 => UsersDontMatch {},
}

impl ErrorReply {
    /// Decodes an incoming error numeric, or `None` if `msg` isn't one.
    pub fn from_message(msg: &Message) -> Option<Self> {
        let numeric = msg.numeric().filter(|n| n.is_error())?;
        let params = msg.params.get(1..).unwrap_or_default();
        Some(Self::from_params(numeric.0, params))
    }

    /// The human-readable text the server attached.
    pub fn message(&self) -> &str {
        match self.params().last() {
            Some(&("message", text)) => text,
            _ => "",
        }
    }
}

impl fmt::Display for ErrorReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", Numeric(self.code()), self.name())?;
        for (name, value) in self.params() {
            write!(f, " {name}={value:?}")?;
        }
        Ok(())
    }
}
