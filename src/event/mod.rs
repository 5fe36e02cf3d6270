//! Event Hub: fan-out of external event streams to subscribed actors.
//!
//! Sources (terminal input, tickers, subprocesses, filesystem watchers)
//! publish plain [`Message`]s; the hub routes each one by its name prefix
//! to the actors subscribed to that [`SourceKind`]. Neither side knows the
//! other.
//!
//! ```text
//! ┌──────────────┐  input.key   ┌──────────┐  input.key  ┌──────────────┐
//! │ InputSource  │ ───────────▶ │          │ ──────────▶ │ KeymapActor  │
//! └──────────────┘              │ hub actor│             └──────────────┘
//! ┌──────────────┐  timer.tick  │          │  timer.tick ┌──────────────┐
//! │ TickerSource │ ───────────▶ │          │ ──────────▶ │ editor root  │
//! └──────────────┘              └──────────┘             └──────────────┘
//! ```

mod hub;
mod input;
mod process;
mod ticker;

pub use hub::{EventHub, SUBSCRIBE, UNSUBSCRIBE};
pub use input::{InputSource, FOCUS, KEY, PASTE, RESIZE};
pub use process::{ProcessChannel, PROCESS_ERROR, PROCESS_EXIT, PROCESS_MESSAGE};
pub use ticker::{TickerSource, TICK};

use crate::actor::RuntimeError;
use crate::message::EncodingError;
use std::fmt;
use thiserror::Error;

/// Class of external events, derived from a message name prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// `input.*`: terminal keys, resizes, pastes and focus changes.
    Input,
    /// `timer.*`: periodic ticks.
    Timer,
    /// `process.*`: subprocess output and exits.
    Process,
    /// `fs.*`: filesystem notifications.
    Fs,
    /// Any other prefix.
    Custom(String),
}

impl SourceKind {
    /// The kind a message with this name belongs to.
    pub fn of(name: &str) -> Self {
        let prefix = name.split_once('.').map_or(name, |(prefix, _)| prefix);
        Self::from_prefix(prefix)
    }

    /// The kind for a bare prefix such as `"input"`.
    pub fn from_prefix(prefix: &str) -> Self {
        match prefix {
            "input" => Self::Input,
            "timer" => Self::Timer,
            "process" => Self::Process,
            "fs" => Self::Fs,
            other => Self::Custom(other.to_string()),
        }
    }

    /// The message name prefix, without the dot.
    pub fn prefix(&self) -> &str {
        match self {
            Self::Input => "input",
            Self::Timer => "timer",
            Self::Process => "process",
            Self::Fs => "fs",
            Self::Custom(prefix) => prefix,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Handle returned by [`EventHub::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub(crate) const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw numeric id.
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// Failures of event sources and the hub handle.
#[derive(Debug, Error)]
pub enum EventError {
    /// The hub (or another target) is gone.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    /// A message could not be framed for a subprocess.
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    /// Spawning or talking to a thread or subprocess failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The subprocess has already exited or closed its input.
    #[error("channel {0} is closed")]
    Closed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_kind_routing() {
        assert_eq!(SourceKind::of("input.key"), SourceKind::Input);
        assert_eq!(SourceKind::of("timer.tick"), SourceKind::Timer);
        assert_eq!(SourceKind::of("process.exit"), SourceKind::Process);
        assert_eq!(SourceKind::of("fs.changed"), SourceKind::Fs);
        assert_eq!(
            SourceKind::of("lsp.diagnostics"),
            SourceKind::Custom("lsp".to_string())
        );
        assert_eq!(SourceKind::of("bare"), SourceKind::Custom("bare".to_string()));
        assert_eq!(SourceKind::from_prefix(SourceKind::Fs.prefix()), SourceKind::Fs);
    }
}
