//! # Keel
//!
//! Actor substrate, command dispatch and keybinding resolution for a
//! terminal text editor.
//!
//! Editor components run as independently scheduled actors that never
//! share mutable state. They talk through messages, watch each other
//! through supervision links and reach the outside world through an event
//! hub.
//!
//! ## Core Concepts
//!
//! - **Actors**: private state, ordered inbox, one message per turn
//! - **Supervision**: `Down` notifications, bidirectional links, parent/child
//! - **Event hub**: subscriptions by source kind (`input.`, `timer.`, `process.`)
//! - **Command registry**: one funnel for keybindings, scripts and actors
//! - **Keymap**: mode-scoped chords with inheritance and timeouts
//!
//! ## Example
//!
//! ```rust,no_run
//! use keel::{message, Flow, Runtime};
//!
//! let rt = Runtime::new()?;
//! let echo = rt.spawn(|_ctx| Ok(0u64), |count: &mut u64, ctx, msg| {
//!     *count += 1;
//!     ctx.reply(msg)?;
//!     Ok(Flow::Continue)
//! })?;
//! rt.send(echo, message!("ping", 1))?;
//! # Ok::<(), keel::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod actor;
pub mod app;
pub mod command;
pub mod config;
pub mod error;
pub mod event;
pub mod keymap;
pub mod logging;
pub mod message;
pub mod swap;
pub mod terminal;

// Re-exports for convenience
pub use actor::{
    Actor, ActorId, Context, Down, ExitReason, ExitStatus, Flow, LinkMode, Runtime,
    RuntimeConfig, RuntimeHandle,
};
pub use command::{ArgKind, ArgShape, CommandError, CommandRegistry, Trigger};
pub use config::Config;
pub use error::{Error, Result};
pub use event::{EventHub, SourceKind};
pub use keymap::{Chord, KeyPress, KeyTable, KeymapActor, Resolver};
pub use message::{Message, Value};
