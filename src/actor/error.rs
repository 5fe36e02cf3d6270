//! Runtime and handler errors.

use super::ActorId;
use crate::command::CommandError;
use crate::message::{DecodingError, EncodingError};
use thiserror::Error;

/// Errors returned by runtime operations.
///
/// All of these are recoverable at the call site: a failed send to a
/// terminated actor never affects the sender.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// The target actor has terminated (or never existed).
    #[error("no such actor: {0}")]
    NoSuchActor(ActorId),

    /// A reply was requested but the current message has no sender.
    #[error("message has no sender to reply to")]
    NoSender,

    /// The runtime no longer accepts new actors.
    #[error("runtime is shutting down")]
    ShuttingDown,

    /// A worker or service thread could not be started.
    #[error("failed to start thread: {0}")]
    Thread(String),
}

/// Failure of an actor's handler.
///
/// Returning any of these from a handler terminates the actor with
/// [`ExitReason::Error`](super::ExitReason::Error), which linked actors
/// observe through their `Down` notification.
#[derive(Debug, Error)]
pub enum ActorError {
    /// Free-form failure detail.
    #[error("{0}")]
    Failed(String),

    /// A message the actor cannot handle in its current state.
    #[error("unexpected message: {0}")]
    Unexpected(String),

    /// Runtime operation failed.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    /// Command dispatch failed.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// A message could not be encoded.
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    /// Bytes could not be decoded.
    #[error(transparent)]
    Decoding(#[from] DecodingError),

    /// I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ActorError {
    /// Build a [`ActorError::Failed`] from any displayable detail.
    pub fn failed(detail: impl std::fmt::Display) -> Self {
        Self::Failed(detail.to_string())
    }
}
