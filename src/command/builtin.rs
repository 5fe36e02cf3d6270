//! Commands every editor session starts with.

use super::{ArgKind, ArgShape, CommandDescriptor, CommandRegistry};
use crate::actor::{ActorId, RuntimeHandle};
use crate::message::{Message, Value};

/// Message the keymap actor accepts to change mode.
pub const SET_MODE: &str = "keymap.set_mode";

/// Message the status actor accepts to show a line of text.
pub const STATUS_SHOW: &str = "status.show";

/// Where the builtin commands deliver their effects.
#[derive(Clone)]
pub struct Builtins {
    /// Runtime to shut down on `quit`.
    pub runtime: RuntimeHandle,
    /// Receives `keymap.set_mode`.
    pub keymap: Option<ActorId>,
    /// Receives `status.show`.
    pub status: Option<ActorId>,
}

impl Builtins {
    /// Register `quit`, `set_mode`, `status` and `noop`.
    ///
    /// Calling this again (e.g. once the keymap actor exists) rebinds them.
    pub fn install(&self, registry: &CommandRegistry) {
        let runtime = self.runtime.clone();
        registry.register_descriptor(
            CommandDescriptor::new("quit", ArgShape::none(), move |_ctx, _args| {
                runtime.shutdown();
                Ok(())
            })
            .describe("Leave the editor"),
        );

        let runtime = self.runtime.clone();
        let keymap = self.keymap;
        registry.register_descriptor(
            CommandDescriptor::new("set_mode", ArgShape::of(&[ArgKind::Str]), move |_ctx, args| {
                let target = keymap.ok_or("no keymap is running")?;
                runtime.send(target, Message::new(SET_MODE, args.to_vec()))?;
                Ok(())
            })
            .describe("Switch the active keybinding mode"),
        );

        let runtime = self.runtime.clone();
        let status = self.status;
        registry.register_descriptor(
            CommandDescriptor::new(
                "status",
                ArgShape::at_least(1).with_kinds(&[ArgKind::Str]),
                move |_ctx, args| {
                    let target = status.ok_or("no status line is running")?;
                    let text = args
                        .iter()
                        .map(|value| match value {
                            Value::Str(s) => s.clone(),
                            other => other.to_string(),
                        })
                        .collect::<Vec<_>>()
                        .join(" ");
                    runtime.send(target, Message::new(STATUS_SHOW, vec![Value::Str(text)]))?;
                    Ok(())
                },
            )
            .describe("Show a message on the status line"),
        );

        registry.register_descriptor(
            CommandDescriptor::new("noop", ArgShape::at_least(0), |_ctx, _args| Ok(()))
                .describe("Do nothing (unbinds a key in a child mode)"),
        );
    }
}
