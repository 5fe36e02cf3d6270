//! Identifiers for actors and suspended operations.

use crate::message::Value;
use std::fmt;

/// Address of an actor.
///
/// Identifiers are allocated from a monotonically increasing counter and are
/// never reused, so a stale id can only ever fail with `NoSuchActor`; it can
/// never reach a newer actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(u64);

impl ActorId {
    /// Wrap a raw id, e.g. one carried inside a message.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw numeric id.
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Read an id from an integer value.
    pub fn from_value(value: &Value) -> Option<Self> {
        value.as_int().and_then(|i| u64::try_from(i).ok()).map(Self)
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actor#{}", self.0)
    }
}

impl From<ActorId> for Value {
    #[allow(clippy::cast_possible_wrap)]
    fn from(id: ActorId) -> Self {
        Self::Int(id.0 as i64)
    }
}

/// Handle for a suspended operation (timer, subprocess request, ...).
///
/// The owning actor registers interest with
/// [`Context::begin_operation`](super::Context::begin_operation); a result
/// delivered for an operation that is no longer pending is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpId(u64);

impl OpId {
    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw numeric id.
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op#{}", self.0)
    }
}
