//! Chord accumulation state machine.
//!
//! ```text
//!            key: prefix
//!        ┌──────────────────┐
//!        │                  ▼
//!    ┌──────┐  key: prefix ┌──────────────┐ key: prefix (deadline reset)
//!    │ Idle │ ───────────▶ │ Accumulating │ ◀──────┐
//!    └──────┘              └──────────────┘ ───────┘
//!        ▲                        │
//!        └── exact / no match / expiry
//! ```
//!
//! The resolver takes the current time as an argument and never reads a
//! clock, which keeps it deterministic under test.

use super::{Chord, KeyPress, KeyTable, KeymapError, Lookup};
use crate::message::Value;
use std::time::{Duration, Instant};

/// Default time allowed between the keys of a chord.
pub const DEFAULT_CHORD_TIMEOUT: Duration = Duration::from_millis(1000);

/// Where the resolver is in a chord.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolverState {
    /// No keys buffered.
    Idle,
    /// A strict prefix of at least one rule has been typed.
    Accumulating {
        /// Keys typed so far.
        chord: Chord,
        /// Mode the chord started in.
        mode: String,
        /// When the chord is abandoned.
        deadline: Instant,
    },
}

/// A resolved command invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    /// Command to dispatch.
    pub command: String,
    /// Literal arguments from the rule.
    pub args: Vec<Value>,
    /// Mode the chord was resolved in.
    pub mode: String,
    /// The full chord.
    pub chord: Chord,
}

/// What one key press did.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The chord completed a rule; the resolver is idle again.
    Dispatch(Invocation),
    /// More keys are needed before `deadline`.
    Pending {
        /// When the chord will be abandoned.
        deadline: Instant,
    },
    /// Nothing matches; the keys were dropped.
    NoMatch(Chord),
}

/// Stateful chord matcher.
#[derive(Debug, Clone)]
pub struct Resolver {
    mode: String,
    timeout: Duration,
    state: ResolverState,
}

impl Resolver {
    /// An idle resolver in `mode`.
    pub fn new(mode: impl Into<String>, timeout: Duration) -> Self {
        Self {
            mode: mode.into(),
            timeout,
            state: ResolverState::Idle,
        }
    }

    /// Active mode.
    pub fn mode(&self) -> &str {
        &self.mode
    }

    /// Current state.
    pub const fn state(&self) -> &ResolverState {
        &self.state
    }

    /// Whether a chord is being accumulated.
    pub const fn is_idle(&self) -> bool {
        matches!(self.state, ResolverState::Idle)
    }

    /// Switch mode. Any partial chord is discarded.
    ///
    /// # Errors
    ///
    /// [`KeymapError::UnknownMode`] if `table` does not declare `mode`.
    pub fn set_mode(&mut self, table: &KeyTable, mode: &str) -> Result<(), KeymapError> {
        if !table.has_mode(mode) {
            return Err(KeymapError::UnknownMode(mode.to_string()));
        }
        mode.clone_into(&mut self.mode);
        self.state = ResolverState::Idle;
        Ok(())
    }

    /// Feed one key press at time `now`.
    pub fn feed(&mut self, table: &KeyTable, key: KeyPress, now: Instant) -> Resolution {
        // A key after the deadline starts a new chord.
        self.expire(now);

        let (mut chord, mode) = match std::mem::replace(&mut self.state, ResolverState::Idle) {
            ResolverState::Idle => (Chord::default(), self.mode.clone()),
            ResolverState::Accumulating { chord, mode, .. } => (chord, mode),
        };
        chord.push(key);

        match table.lookup(&mode, &chord) {
            Lookup::Exact { rule, mode } => Resolution::Dispatch(Invocation {
                command: rule.command.clone(),
                args: rule.args.clone(),
                mode: mode.to_string(),
                chord,
            }),
            Lookup::Prefix => {
                let deadline = now + self.timeout;
                self.state = ResolverState::Accumulating {
                    chord,
                    mode,
                    deadline,
                };
                Resolution::Pending { deadline }
            }
            Lookup::None => Resolution::NoMatch(chord),
        }
    }

    /// Abandon a chord whose deadline has passed. Returns whether one was.
    pub fn expire(&mut self, now: Instant) -> bool {
        match &self.state {
            ResolverState::Accumulating { deadline, .. } if now >= *deadline => {
                self.state = ResolverState::Idle;
                true
            }
            _ => false,
        }
    }

    /// Discard any partial chord.
    pub fn reset(&mut self) {
        self.state = ResolverState::Idle;
    }
}
