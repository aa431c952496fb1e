//! Styled terminal text for CLI output.
//!
//! Styles render as ANSI escapes only when stdout is a terminal and
//! `NO_COLOR` is unset; otherwise text passes through untouched, so piped
//! output stays plain.

use std::fmt;
use std::io::{self, IsTerminal, Write};
use std::sync::OnceLock;

/// What a piece of text means, not how it looks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Heading,
    Muted,
    Success,
    Warning,
    Error,
    Label,
}

impl Style {
    fn code(self) -> &'static str {
        match self {
            Self::Heading => "\x1b[1m",
            Self::Muted => "\x1b[2m",
            Self::Success => "\x1b[32m",
            Self::Warning => "\x1b[33m",
            Self::Error => "\x1b[31m",
            Self::Label => "\x1b[36m",
        }
    }

    /// Wrap `text` so it displays in this style.
    pub fn paint<T: fmt::Display>(self, text: T) -> Painted<T> {
        Painted {
            style: self,
            text,
            enabled: enabled(),
        }
    }
}

/// Text with a style attached, see [`Style::paint`].
pub struct Painted<T> {
    style: Style,
    text: T,
    enabled: bool,
}

impl<T: fmt::Display> fmt::Display for Painted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.enabled {
            write!(f, "{}{}\x1b[0m", self.style.code(), self.text)
        } else {
            write!(f, "{}", self.text)
        }
    }
}

fn enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| std::env::var_os("NO_COLOR").is_none() && io::stdout().is_terminal())
}

/// Flush stdout so partial lines show up immediately.
pub fn flush_stdout() {
    io::stdout().flush().ok();
}
