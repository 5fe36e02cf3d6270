//! Supervision: links, exit reasons and `Down` notifications.
//!
//! A link is a directed interest of one actor in the termination of
//! another. `Monitor` links only deliver a [`Down`]; `Bidirectional` links
//! additionally take the peer down when either side exits abnormally.

use super::ActorId;
use crate::message::{Message, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// How a link reacts to the peer terminating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkMode {
    /// Receive a [`Down`] only.
    Monitor,
    /// Receive a [`Down`] and terminate with
    /// [`ExitReason::LinkedExit`] if the peer exits abnormally.
    Bidirectional,
}

/// Why an actor terminated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// Handler returned [`Flow::Stop`](super::Flow::Stop).
    Normal,
    /// Handler failed or panicked.
    Error(String),
    /// Force-stopped via `kill`, parent exit or runtime shutdown.
    Killed,
    /// A bidirectionally linked peer exited abnormally.
    LinkedExit {
        /// The peer whose exit propagated.
        peer: ActorId,
    },
}

impl ExitReason {
    /// Whether this is a normal exit.
    pub const fn is_normal(&self) -> bool {
        matches!(self, Self::Normal)
    }

    /// Process exit code used when a root actor exits for this reason.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Normal => 0,
            Self::Error(_) => 1,
            Self::Killed => 2,
            Self::LinkedExit { .. } => 3,
        }
    }

    /// Short label: `normal`, `error`, `killed` or `linked_exit`.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Error(_) => "error",
            Self::Killed => "killed",
            Self::LinkedExit { .. } => "linked_exit",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(detail) => write!(f, "error: {detail}"),
            Self::LinkedExit { peer } => write!(f, "linked_exit from {peer}"),
            other => f.write_str(other.label()),
        }
    }
}

/// Termination notice delivered to every watcher of an actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Down {
    /// The actor that terminated.
    pub id: ActorId,
    /// Why it terminated.
    pub reason: ExitReason,
}

impl Down {
    /// Message name used when a `Down` travels as a plain [`Message`].
    pub const MESSAGE: &'static str = "actor.down";

    /// Encode as `actor.down(id, label[, detail])`.
    pub fn to_message(&self) -> Message {
        let mut values = vec![Value::from(self.id), Value::from(self.reason.label())];
        match &self.reason {
            ExitReason::Error(detail) => values.push(Value::from(detail.as_str())),
            ExitReason::LinkedExit { peer } => values.push(Value::from(*peer)),
            ExitReason::Normal | ExitReason::Killed => {}
        }
        Message::new(Self::MESSAGE, values)
    }

    /// Parse a message produced by [`Down::to_message`].
    pub fn from_message(message: &Message) -> Option<Self> {
        if !message.is(Self::MESSAGE) {
            return None;
        }
        let id = ActorId::from_value(message.arg(0)?)?;
        let reason = match message.str_arg(1)? {
            "normal" => ExitReason::Normal,
            "killed" => ExitReason::Killed,
            "error" => ExitReason::Error(message.str_arg(2)?.to_string()),
            "linked_exit" => ExitReason::LinkedExit {
                peer: ActorId::from_value(message.arg(2)?)?,
            },
            _ => return None,
        };
        Some(Self { id, reason })
    }
}

/// Per-actor link bookkeeping, stored in the lifecycle registry.
#[derive(Debug, Default)]
pub(crate) struct Links {
    /// Actors notified when this one terminates.
    pub watchers: HashMap<ActorId, LinkMode>,
    /// Actors whose `watchers` contain this one.
    pub watching: HashSet<ActorId>,
    /// Children spawned from this actor's context.
    pub children: HashSet<ActorId>,
    /// Set once termination has collected the links.
    pub closed: bool,
}

impl Links {
    /// Register `id` as a watcher. A bidirectional link is never downgraded.
    pub fn add_watcher(&mut self, id: ActorId, mode: LinkMode) {
        let entry = self.watchers.entry(id).or_insert(mode);
        if mode == LinkMode::Bidirectional {
            *entry = LinkMode::Bidirectional;
        }
    }

    /// Drop every relation with `id`.
    pub fn forget(&mut self, id: ActorId) {
        self.watchers.remove(&id);
        self.watching.remove(&id);
    }

    /// Every actor linked in either direction.
    pub fn peers(&self) -> HashSet<ActorId> {
        self.watchers
            .keys()
            .chain(self.watching.iter())
            .copied()
            .collect()
    }

    /// Close and take everything. Later `link` attempts see `closed`.
    pub fn close(&mut self) -> Self {
        self.closed = true;
        Self {
            watchers: std::mem::take(&mut self.watchers),
            watching: std::mem::take(&mut self.watching),
            children: std::mem::take(&mut self.children),
            closed: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_down_message_roundtrip() {
        let peer = ActorId::from_raw(9);
        for reason in [
            ExitReason::Normal,
            ExitReason::Killed,
            ExitReason::Error("disk full".to_string()),
            ExitReason::LinkedExit { peer },
        ] {
            let down = Down {
                id: ActorId::from_raw(3),
                reason,
            };
            assert_eq!(Down::from_message(&down.to_message()), Some(down));
        }
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(ExitReason::Normal.exit_code(), 0);
        assert_ne!(ExitReason::Killed.exit_code(), 0);
        assert_ne!(ExitReason::Error(String::new()).exit_code(), 0);
    }

    #[test]
    fn test_bidirectional_not_downgraded() {
        let mut links = Links::default();
        let id = ActorId::from_raw(1);
        links.add_watcher(id, LinkMode::Bidirectional);
        links.add_watcher(id, LinkMode::Monitor);
        assert_eq!(links.watchers[&id], LinkMode::Bidirectional);
    }
}
