//! Keybinding Resolver: chords, mode-scoped rule tables and the matcher.
//!
//! ```text
//!   input.key ──► KeymapActor ──► Resolver::feed ──► Dispatch ──► CommandRegistry
//!                      │                 │
//!                      │                 └── Pending ──► send_after(keymap.expire)
//!                      └── keymap.set_mode
//! ```
//!
//! A [`KeyTable`] is immutable once built and shared through
//! [`Published`](crate::swap::Published), so reloading the configuration
//! swaps the whole table while chords in flight keep the one they started with.
//!
//! Key syntax follows the configuration file: `ctrl+k`, `ctrl+shift+tab`,
//! `alt+x`, `f5`, `esc`, or any single grapheme. Chords separate keys with
//! whitespace (`ctrl+k ctrl+k`).

mod actor;
mod error;
mod key;
mod resolver;
mod table;

pub use actor::{KeymapActor, EXPIRE, MODE_CHANGED};
pub use error::KeymapError;
pub use key::{Chord, KeyCode, KeyPress, Modifiers};
pub use resolver::{Invocation, Resolution, Resolver, ResolverState, DEFAULT_CHORD_TIMEOUT};
pub use table::{KeyTable, KeyTableBuilder, Lookup, Rule};
