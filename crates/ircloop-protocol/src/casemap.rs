//! RFC 1459 case mapping for nicks and channel names.
//!
//! IRC treats `[]\~` as the upper-case forms of `{}|^`, on top of ordinary
//! ASCII case folding. Two nicks that differ only in those characters are
//! the same user as far as the server is concerned, so every comparison the
//! client makes on nicks or channel names goes through this module.

use std::fmt;
use std::hash::{Hash, Hasher};

/// Lower-cases a single character using RFC 1459 rules.
#[inline]
pub const fn irc_lower_char(c: char) -> char {
    match c {
        '[' => '{',
        ']' => '}',
        '\\' => '|',
        '~' => '^',
        'A'..='Z' => (c as u8 + 32) as char,
        _ => c,
    }
}

/// Lower-cases a string using RFC 1459 rules.
pub fn irc_to_lower(s: &str) -> String {
    s.chars().map(irc_lower_char).collect()
}

/// Case-insensitive comparison using RFC 1459 rules.
pub fn irc_eq(a: &str, b: &str) -> bool {
    a.len() == b.len()
        && a
            .chars()
            .zip(b.chars())
            .all(|(ca, cb)| irc_lower_char(ca) == irc_lower_char(cb))
}

// ---------------------------------------------------------------------------
// Nick
// ---------------------------------------------------------------------------

/// A nickname that compares and hashes case-insensitively.
///
/// The original spelling is kept for display, so `Nick::from("Alice")`
/// prints as `Alice` but is equal to (and hashes like) `Nick::from("alice")`.
/// This is what makes it safe as a `HashMap` key for channel membership.
#[derive(Debug, Clone, Eq)]
pub struct Nick {
    display: String,
    folded: String,
}

impl Nick {
    /// Creates a nick from its display form.
    pub fn new(nick: impl Into<String>) -> Self {
        let display = nick.into();
        let folded = irc_to_lower(&display);
        Self { display, folded }
    }

    /// The nick as the server spelled it.
    pub fn as_str(&self) -> &str {
        &self.display
    }

    /// The case-folded form used for comparisons.
    pub fn folded(&self) -> &str {
        &self.folded
    }

    /// Case-insensitive comparison against a plain string.
    pub fn matches(&self, other: &str) -> bool {
        irc_eq(&self.display, other)
    }
}

impl PartialEq for Nick {
    fn eq(&self, other: &Self) -> bool {
        self.folded == other.folded
    }
}

impl Hash for Nick {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.folded.hash(state);
    }
}

impl fmt::Display for Nick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

impl From<&str> for Nick {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Nick {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}
