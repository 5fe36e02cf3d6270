//! The [`Actor`] trait and the closure-based actor used by `spawn`.

use super::{ActorError, Context, Down, ExitReason};
use crate::message::Message;

/// What the runtime should do after a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep the actor alive.
    Continue,
    /// Terminate with [`ExitReason::Normal`].
    Stop,
}

/// Result of a single actor turn.
pub type HandlerResult = Result<Flow, ActorError>;

/// Behaviour of an actor.
///
/// An actor owns its state exclusively. The runtime calls these methods one
/// at a time, each call being one turn, so `&mut self` needs no locking.
/// A handler must return promptly; anything long-running is modelled as a
/// suspended operation that completes with a later message.
pub trait Actor: Send + 'static {
    /// Short label used in log records.
    fn name(&self) -> &'static str {
        "actor"
    }

    /// First turn, before any message.
    ///
    /// # Errors
    ///
    /// Failing here terminates the actor with [`ExitReason::Error`].
    fn started(&mut self, ctx: &mut Context<'_>) -> HandlerResult {
        let _ = ctx;
        Ok(Flow::Continue)
    }

    /// Handle one message.
    ///
    /// # Errors
    ///
    /// Failing terminates the actor with [`ExitReason::Error`].
    fn handle(&mut self, ctx: &mut Context<'_>, message: Message) -> HandlerResult;

    /// A watched actor terminated.
    ///
    /// # Errors
    ///
    /// Failing terminates the actor with [`ExitReason::Error`].
    fn on_down(&mut self, ctx: &mut Context<'_>, down: Down) -> HandlerResult {
        let _ = (ctx, down);
        Ok(Flow::Continue)
    }

    /// Last call before the actor is removed. Messages sent from here are
    /// still delivered.
    fn stopped(&mut self, ctx: &mut Context<'_>, reason: &ExitReason) {
        let _ = (ctx, reason);
    }
}

/// Actor built from an `init` closure and a message handler.
///
/// `Down` notifications reach the handler as `actor.down` messages (see
/// [`Down::to_message`]).
pub(crate) struct FnActor<S, I, H> {
    init: Option<I>,
    state: Option<S>,
    handler: H,
}

impl<S, I, H> FnActor<S, I, H> {
    pub const fn new(init: I, handler: H) -> Self {
        Self {
            init: Some(init),
            state: None,
            handler,
        }
    }
}

impl<S, I, H> Actor for FnActor<S, I, H>
where
    S: Send + 'static,
    I: FnOnce(&mut Context<'_>) -> Result<S, ActorError> + Send + 'static,
    H: FnMut(&mut S, &mut Context<'_>, Message) -> HandlerResult + Send + 'static,
{
    fn started(&mut self, ctx: &mut Context<'_>) -> HandlerResult {
        let init = self
            .init
            .take()
            .ok_or_else(|| ActorError::failed("actor initialised twice"))?;
        self.state = Some(init(ctx)?);
        Ok(Flow::Continue)
    }

    fn handle(&mut self, ctx: &mut Context<'_>, message: Message) -> HandlerResult {
        let state = self
            .state
            .as_mut()
            .ok_or_else(|| ActorError::failed("message before initialisation"))?;
        (self.handler)(state, ctx, message)
    }

    fn on_down(&mut self, ctx: &mut Context<'_>, down: Down) -> HandlerResult {
        self.handle(ctx, down.to_message())
    }
}
