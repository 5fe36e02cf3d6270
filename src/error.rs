//! Crate-level error aggregating every module's error type.

use crate::actor::{ActorError, RuntimeError};
use crate::command::CommandError;
use crate::config::ConfigError;
use crate::event::EventError;
use crate::keymap::KeymapError;
use crate::message::{DecodingError, EncodingError};
use thiserror::Error;

/// Any error the library can return.
#[derive(Debug, Error)]
pub enum Error {
    /// Runtime operation failed.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    /// An actor failed.
    #[error(transparent)]
    Actor(#[from] ActorError),

    /// Command dispatch failed.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Keybinding table or key syntax error.
    #[error(transparent)]
    Keymap(#[from] KeymapError),

    /// Configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Event source failure.
    #[error(transparent)]
    Event(#[from] EventError),

    /// A message could not be encoded.
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    /// Bytes could not be decoded.
    #[error(transparent)]
    Decoding(#[from] DecodingError),

    /// The editor did not come up.
    #[error("startup failed: {0}")]
    Startup(String),

    /// I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result alias using [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;
