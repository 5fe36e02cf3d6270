//! Actor Model: isolated units of state scheduled across a worker pool.
//!
//! Every component of the editor (input loop, keymap, status line, search
//! workers, ...) is an actor: it owns its state, receives [`Message`]s in a
//! private mailbox, and handles them one per turn. Actors never share mutable
//! state; they only exchange messages through the [`RuntimeHandle`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   send(id, msg)   ┌─────────────┐
//! │ Actor A      │ ────────────────▶ │ mailbox B   │
//! └──────────────┘                   └─────────────┘
//!        ▲                                  │ scheduled
//!        │ Down / LinkedExit                ▼
//! ┌──────────────┐                   ┌─────────────┐
//! │ Registry     │ ◀──── terminate ─ │ worker pool │
//! └──────────────┘                   └─────────────┘
//!                                           ▲
//!                                           │ completions
//!                                    ┌─────────────┐
//!                                    │ timer thread│
//!                                    └─────────────┘
//! ```
//!
//! # Guarantees
//!
//! - One message per turn, and turns of one actor never overlap.
//! - Messages from one sender to one recipient arrive in send order.
//! - Termination is always observed: every watcher receives a [`Down`],
//!   enqueued before the id leaves the registry.
//! - Ids are never reused, so sends to a stale id fail with
//!   [`RuntimeError::NoSuchActor`] instead of reaching another actor.
//!
//! [`Message`]: crate::message::Message

mod behavior;
mod cell;
mod context;
mod error;
mod id;
mod lifecycle;
mod link;
mod runtime;
mod timer;

pub use behavior::{Actor, Flow, HandlerResult};
pub use context::Context;
pub use error::{ActorError, RuntimeError};
pub use id::{ActorId, OpId};
pub use lifecycle::Lifecycle;
pub use link::{Down, ExitReason, LinkMode};
pub use runtime::{ExitStatus, Runtime, RuntimeConfig, RuntimeHandle};

#[cfg(test)]
mod tests;
