use super::{KeyPress, KeyTable, Resolution, Resolver};
use crate::actor::{Actor, ActorError, ActorId, Context, Flow, HandlerResult, OpId};
use crate::command::{CommandRegistry, Trigger, SET_MODE, STATUS_SHOW};
use crate::event::KEY;
use crate::message::{Message, Value};
use crate::swap::Published;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Timer message abandoning a partial chord.
pub const EXPIRE: &str = "keymap.expire";

/// Sent to the status actor after every mode change: `status.mode(name)`.
pub const MODE_CHANGED: &str = "status.mode";

/// Actor turning `input.key` events into command dispatches.
///
/// Whoever spawns it subscribes it to [`SourceKind::Input`](crate::event::SourceKind)
/// before publishing keys, so no key can overtake the subscription.
///
/// Chord deadlines are timer operations: every key cancels the pending
/// expiry, so an expiry that does arrive always belongs to the current chord.
pub struct KeymapActor {
    table: Arc<Published<KeyTable>>,
    registry: Arc<CommandRegistry>,
    resolver: Resolver,
    status: Option<ActorId>,
    expiry: Option<OpId>,
}

impl KeymapActor {
    /// A keymap starting in `mode`.
    pub fn new(
        table: Arc<Published<KeyTable>>,
        registry: Arc<CommandRegistry>,
        mode: &str,
        chord_timeout: Duration,
    ) -> Self {
        Self {
            table,
            registry,
            resolver: Resolver::new(mode, chord_timeout),
            status: None,
            expiry: None,
        }
    }

    /// Report mode changes and dispatch failures to `status`.
    #[must_use]
    pub const fn with_status(mut self, status: ActorId) -> Self {
        self.status = Some(status);
        self
    }

    fn on_key(&mut self, ctx: &mut Context<'_>, message: &Message) {
        let Some(key) = message.str_arg(0).and_then(|s| s.parse::<KeyPress>().ok()) else {
            warn!(%message, "unreadable key event");
            return;
        };
        if let Some(op) = self.expiry.take() {
            ctx.cancel(op);
        }

        let now = Instant::now();
        let table = self.table.load();
        match self.resolver.feed(&table, key, now) {
            Resolution::Dispatch(invocation) => {
                let trigger = Trigger::Keybinding {
                    mode: invocation.mode,
                };
                if let Err(err) = self
                    .registry
                    .dispatch(&invocation.command, &invocation.args, &trigger)
                {
                    self.report(ctx, &err.to_string());
                }
            }
            Resolution::Pending { deadline } => {
                trace!(%key, "chord pending");
                let delay = deadline.saturating_duration_since(now);
                self.expiry = Some(ctx.send_after(delay, Message::signal(EXPIRE)));
            }
            Resolution::NoMatch(chord) => {
                debug!(%chord, mode = self.resolver.mode(), "unbound chord");
            }
        }
    }

    fn on_set_mode(&mut self, ctx: &mut Context<'_>, message: &Message) {
        let Some(mode) = message.str_arg(0) else {
            warn!(%message, "set_mode without a mode name");
            return;
        };
        let table = self.table.load();
        match self.resolver.set_mode(&table, mode) {
            Ok(()) => {
                if let Some(op) = self.expiry.take() {
                    ctx.cancel(op);
                }
                debug!(mode, "mode changed");
                self.notify_mode(ctx);
            }
            Err(err) => self.report(ctx, &err.to_string()),
        }
    }

    fn notify_mode(&self, ctx: &Context<'_>) {
        if let Some(status) = self.status {
            let mode = Value::from(self.resolver.mode());
            let _ = ctx.send(status, Message::new(MODE_CHANGED, vec![mode]));
        }
    }

    fn report(&self, ctx: &Context<'_>, text: &str) {
        warn!(mode = self.resolver.mode(), "{text}");
        if let Some(status) = self.status {
            let _ = ctx.send(status, Message::new(STATUS_SHOW, vec![Value::from(text)]));
        }
    }
}

impl Actor for KeymapActor {
    fn name(&self) -> &'static str {
        "keymap"
    }

    fn started(&mut self, ctx: &mut Context<'_>) -> HandlerResult {
        if !self.table.load().has_mode(self.resolver.mode()) {
            return Err(ActorError::failed(format!(
                "keymap has no mode {:?}",
                self.resolver.mode()
            )));
        }
        self.notify_mode(ctx);
        Ok(Flow::Continue)
    }

    fn handle(&mut self, ctx: &mut Context<'_>, message: Message) -> HandlerResult {
        match message.name() {
            KEY => self.on_key(ctx, &message),
            EXPIRE => {
                // Only the live expiry is ever delivered; cancelled ones are dropped.
                self.expiry = None;
                self.resolver.reset();
                trace!("chord expired");
            }
            SET_MODE => self.on_set_mode(ctx, &message),
            _ => {}
        }
        Ok(Flow::Continue)
    }
}
