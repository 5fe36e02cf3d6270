//! The command catalog and its single dispatch funnel.

use super::{ArgShape, CommandError};
use crate::actor::ActorId;
use crate::message::{Message, Value};
use crate::swap::Published;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Error type handlers may fail with.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result of running a handler.
pub type CommandResult = Result<(), HandlerError>;

type Handler = dyn Fn(&CommandContext<'_>, &[Value]) -> CommandResult + Send + Sync;

/// What caused a dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// A resolved key chord.
    Keybinding {
        /// Mode the chord was resolved in.
        mode: String,
    },
    /// Direct call from outside the actor system (startup scripts, tests).
    Programmatic,
    /// Invocation from inside an actor's turn.
    Actor(ActorId),
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keybinding { mode } => write!(f, "keybinding[{mode}]"),
            Self::Programmatic => f.write_str("programmatic"),
            Self::Actor(id) => write!(f, "{id}"),
        }
    }
}

/// Passed to every handler.
#[derive(Debug, Clone, Copy)]
pub struct CommandContext<'a> {
    /// The command being run.
    pub name: &'a str,
    /// What caused it.
    pub trigger: &'a Trigger,
}

/// A registered command.
#[derive(Clone)]
pub struct CommandDescriptor {
    name: String,
    description: String,
    shape: ArgShape,
    handler: Arc<Handler>,
}

impl CommandDescriptor {
    /// Bind `handler` to `name` with the given argument shape.
    pub fn new<F>(name: impl Into<String>, shape: ArgShape, handler: F) -> Self
    where
        F: Fn(&CommandContext<'_>, &[Value]) -> CommandResult + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: String::new(),
            shape,
            handler: Arc::new(handler),
        }
    }

    /// Attach a one-line description.
    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Command name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// One-line description, possibly empty.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Declared argument shape.
    pub const fn shape(&self) -> &ArgShape {
        &self.shape
    }
}

impl fmt::Debug for CommandDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDescriptor")
            .field("name", &self.name)
            .field("shape", &self.shape)
            .finish_non_exhaustive()
    }
}

/// Process-wide command catalog.
///
/// The table is published as an immutable snapshot: `dispatch` works on the
/// snapshot it loaded, so a concurrent `register` is seen either entirely or
/// not at all. The registry is shared as `Arc<CommandRegistry>`.
#[derive(Default)]
pub struct CommandRegistry {
    table: Published<HashMap<String, Arc<CommandDescriptor>>>,
}

impl CommandRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`, replacing any earlier binding.
    pub fn register<F>(&self, name: impl Into<String>, handler: F, shape: ArgShape)
    where
        F: Fn(&CommandContext<'_>, &[Value]) -> CommandResult + Send + Sync + 'static,
    {
        self.register_descriptor(CommandDescriptor::new(name, shape, handler));
    }

    /// Register a fully built descriptor, replacing any earlier binding.
    pub fn register_descriptor(&self, descriptor: CommandDescriptor) {
        let name = descriptor.name.clone();
        let replaced = self.table.update(|table| {
            table
                .insert(name.clone(), Arc::new(descriptor))
                .is_some()
        });
        debug!(command = %name, replaced, "command registered");
    }

    /// Remove a command. Returns whether it existed.
    pub fn unregister(&self, name: &str) -> bool {
        self.table.update(|table| table.remove(name).is_some())
    }

    /// Validate `args` and run the handler for `name`.
    ///
    /// Every trigger goes through here, so this is also the single place
    /// invocations are logged.
    ///
    /// # Errors
    ///
    /// - [`CommandError::UnknownCommand`] if nothing is registered.
    /// - [`CommandError::ArityMismatch`] / [`CommandError::ArgKindMismatch`]
    ///   if `args` violate the declared shape; the handler does not run.
    /// - [`CommandError::Failed`] if the handler returns an error.
    pub fn dispatch(
        &self,
        name: &str,
        args: &[Value],
        trigger: &Trigger,
    ) -> Result<(), CommandError> {
        let descriptor = self.lookup(name).ok_or_else(|| {
            warn!(command = name, %trigger, "unknown command");
            CommandError::UnknownCommand(name.to_string())
        })?;

        if let Err(err) = descriptor.shape.validate(name, args) {
            warn!(command = name, %trigger, error = %err, "rejected command arguments");
            return Err(err);
        }

        debug!(command = name, %trigger, args = args.len(), "dispatch");
        let ctx = CommandContext { name, trigger };
        (descriptor.handler)(&ctx, args).map_err(|err| {
            warn!(command = name, %trigger, error = %err, "command failed");
            CommandError::Failed {
                command: name.to_string(),
                detail: err.to_string(),
            }
        })
    }

    /// Dispatch a message: its name is the command, its values the arguments.
    ///
    /// # Errors
    ///
    /// As [`CommandRegistry::dispatch`].
    pub fn dispatch_message(
        &self,
        message: &Message,
        trigger: &Trigger,
    ) -> Result<(), CommandError> {
        self.dispatch(message.name(), message.values(), trigger)
    }

    /// The descriptor currently bound to `name`.
    pub fn describe(&self, name: &str) -> Option<Arc<CommandDescriptor>> {
        self.lookup(name)
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.table.load().contains_key(name)
    }

    /// Every registered name, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.table.load().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    fn lookup(&self, name: &str) -> Option<Arc<CommandDescriptor>> {
        self.table.load().get(name).cloned()
    }
}

impl fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::ArgKind;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::thread;

    fn counting(
        counter: &Arc<AtomicUsize>,
    ) -> impl Fn(&CommandContext<'_>, &[Value]) -> CommandResult + Send + Sync + 'static {
        let counter = Arc::clone(counter);
        move |_ctx, _args| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_dispatch_runs_handler() {
        let registry = CommandRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        registry.register("duplicate_line", counting(&calls), ArgShape::none());

        registry
            .dispatch("duplicate_line", &[], &Trigger::Programmatic)
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unknown_command() {
        let registry = CommandRegistry::new();
        assert_eq!(
            registry.dispatch("nope", &[], &Trigger::Programmatic),
            Err(CommandError::UnknownCommand("nope".to_string()))
        );
    }

    #[test]
    fn test_shape_violation_never_runs_handler() {
        let registry = CommandRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        registry.register(
            "goto_line",
            counting(&calls),
            ArgShape::of(&[ArgKind::Int]),
        );

        let arity = registry.dispatch("goto_line", &[], &Trigger::Programmatic);
        assert!(matches!(arity, Err(CommandError::ArityMismatch { .. })));

        let kind = registry.dispatch("goto_line", &[Value::from("ten")], &Trigger::Programmatic);
        assert!(matches!(kind, Err(CommandError::ArgKindMismatch { index: 0, .. })));

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_handler_failure_is_reported() {
        let registry = CommandRegistry::new();
        registry.register(
            "save",
            |_ctx: &CommandContext<'_>, _args: &[Value]| -> CommandResult {
                Err("read-only buffer".into())
            },
            ArgShape::none(),
        );
        let err = registry
            .dispatch("save", &[], &Trigger::Keybinding { mode: "edit".into() })
            .unwrap_err();
        assert_eq!(err.to_string(), "save failed: read-only buffer");
        assert!(!err.is_validation());
    }

    #[test]
    fn test_reregistration_replaces() {
        let registry = CommandRegistry::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        registry.register("c", counting(&first), ArgShape::none());
        registry.register("c", counting(&second), ArgShape::none());
        registry.dispatch("c", &[], &Trigger::Programmatic).unwrap();
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(registry.names(), vec!["c".to_string()]);
    }

    #[test]
    fn test_dispatch_message_and_trigger_visible() {
        let registry = CommandRegistry::new();
        let seen = Arc::new(parking_lot::Mutex::new(None));
        let sink = Arc::clone(&seen);
        registry.register(
            "open",
            move |ctx: &CommandContext<'_>, args: &[Value]| -> CommandResult {
                *sink.lock() = Some((ctx.trigger.clone(), args.to_vec()));
                Ok(())
            },
            ArgShape::of(&[ArgKind::Str]),
        );
        let trigger = Trigger::Actor(ActorId::from_raw(7));
        registry
            .dispatch_message(&crate::message!("open", "a.rs"), &trigger)
            .unwrap();
        assert_eq!(*seen.lock(), Some((trigger, vec![Value::from("a.rs")])));
    }

    #[test]
    fn test_describe() {
        let registry = CommandRegistry::new();
        registry.register_descriptor(
            CommandDescriptor::new(
                "quit",
                ArgShape::none(),
                |_ctx: &CommandContext<'_>, _args: &[Value]| -> CommandResult { Ok(()) },
            )
            .describe("Leave the editor"),
        );
        let descriptor = registry.describe("quit").unwrap();
        assert_eq!(descriptor.description(), "Leave the editor");
        assert_eq!(descriptor.shape(), &ArgShape::none());
        assert!(registry.describe("missing").is_none());
    }

    #[test]
    fn test_concurrent_reregistration_never_tears() {
        // Version 1 takes one argument, version 2 takes two. A torn read
        // would pair one version's shape with the other's handler.
        let registry = Arc::new(CommandRegistry::new());
        let torn = Arc::new(AtomicBool::new(false));

        let install = |registry: &CommandRegistry, arity: usize, torn: &Arc<AtomicBool>| {
            let torn = Arc::clone(torn);
            registry.register(
                "flip",
                move |_ctx: &CommandContext<'_>, args: &[Value]| -> CommandResult {
                    if args.len() != arity {
                        torn.store(true, Ordering::SeqCst);
                    }
                    Ok(())
                },
                ArgShape::exactly(arity),
            );
        };
        install(&registry, 1, &torn);

        let writer = {
            let registry = Arc::clone(&registry);
            let torn = Arc::clone(&torn);
            thread::spawn(move || {
                for i in 0..2_000 {
                    install(&registry, 1 + i % 2, &torn);
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for _ in 0..2_000 {
                        match registry.dispatch("flip", &[Value::Int(1)], &Trigger::Programmatic) {
                            Ok(()) | Err(CommandError::ArityMismatch { .. }) => {}
                            Err(other) => panic!("unexpected {other}"),
                        }
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert!(!torn.load(Ordering::SeqCst));
    }
}
