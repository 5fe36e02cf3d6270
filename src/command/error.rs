//! Why a command did not run.

use super::shape::{arity, ArgKind};
use crate::message::ValueKind;
use thiserror::Error;

/// Dispatch failures.
///
/// Validation errors are returned before the handler runs. All variants
/// are surfaced to the triggering context; none of them is fatal.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// No command registered under this name.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// Wrong number of arguments.
    #[error("{command}: expected {} argument(s), got {got}", arity(*.min, *.max))]
    ArityMismatch {
        /// Command name.
        command: String,
        /// Declared minimum.
        min: usize,
        /// Declared maximum.
        max: Option<usize>,
        /// Supplied count.
        got: usize,
    },

    /// An argument has the wrong kind.
    #[error("{command}: argument {index} must be {expected}, got {got}")]
    ArgKindMismatch {
        /// Command name.
        command: String,
        /// Zero-based argument position.
        index: usize,
        /// Declared kind.
        expected: ArgKind,
        /// Supplied kind.
        got: ValueKind,
    },

    /// The handler ran and failed.
    #[error("{command} failed: {detail}")]
    Failed {
        /// Command name.
        command: String,
        /// Handler error rendered for display.
        detail: String,
    },
}

impl CommandError {
    /// Name of the command the error refers to.
    pub fn command(&self) -> &str {
        match self {
            Self::UnknownCommand(command)
            | Self::ArityMismatch { command, .. }
            | Self::ArgKindMismatch { command, .. }
            | Self::Failed { command, .. } => command,
        }
    }

    /// Whether the handler was never invoked.
    pub const fn is_validation(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }
}
