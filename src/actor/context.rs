//! Per-turn context handed to actor handlers.

use super::behavior::FnActor;
use super::runtime::RuntimeHandle;
use super::{Actor, ActorError, ActorId, HandlerResult, LinkMode, OpId, RuntimeError};
use crate::message::Message;
use std::collections::HashSet;
use std::time::Duration;

/// What an actor can do during its turn.
///
/// Every send made through the context carries the actor's id as sender,
/// which is what gives per-sender FIFO ordering its meaning.
pub struct Context<'a> {
    handle: &'a RuntimeHandle,
    id: ActorId,
    sender: Option<ActorId>,
    operation: Option<OpId>,
    pending: &'a mut HashSet<OpId>,
}

impl<'a> Context<'a> {
    pub(crate) fn new(
        handle: &'a RuntimeHandle,
        id: ActorId,
        pending: &'a mut HashSet<OpId>,
    ) -> Self {
        Self {
            handle,
            id,
            sender: None,
            operation: None,
            pending,
        }
    }

    pub(crate) fn set_sender(&mut self, sender: Option<ActorId>) {
        self.sender = sender;
    }

    pub(crate) fn set_operation(&mut self, op: OpId) {
        self.operation = Some(op);
    }

    pub(crate) fn take_pending(&mut self, op: OpId) -> bool {
        self.pending.remove(&op)
    }

    /// This actor's id.
    pub const fn id(&self) -> ActorId {
        self.id
    }

    /// Sender of the message being handled, if it came from an actor.
    pub const fn sender(&self) -> Option<ActorId> {
        self.sender
    }

    /// The operation whose result is being handled, if any.
    pub const fn operation(&self) -> Option<OpId> {
        self.operation
    }

    /// The runtime, for handing to code that lives outside the turn.
    pub const fn runtime(&self) -> &RuntimeHandle {
        self.handle
    }

    /// Send a message to `to`.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::NoSuchActor`] if the target has terminated.
    pub fn send(&self, to: ActorId, message: Message) -> Result<(), RuntimeError> {
        self.handle.send_from(Some(self.id), to, message)
    }

    /// Send a message back to the sender of the current message.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::NoSender`] if the message came from outside the
    /// runtime, or [`RuntimeError::NoSuchActor`] if the sender is gone.
    pub fn reply(&self, message: Message) -> Result<(), RuntimeError> {
        let to = self.sender.ok_or(RuntimeError::NoSender)?;
        self.send(to, message)
    }

    /// Send to every actor linked with this one. Returns how many received it.
    pub fn broadcast(&self, message: &Message) -> usize {
        self.handle.broadcast_from(self.id, message)
    }

    /// Spawn a child actor from closures. See [`RuntimeHandle::spawn`].
    ///
    /// The child is monitored by this actor and killed when it terminates.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::ShuttingDown`] once the runtime is stopping.
    pub fn spawn<S, I, H>(&self, init: I, handler: H) -> Result<ActorId, RuntimeError>
    where
        S: Send + 'static,
        I: FnOnce(&mut Context<'_>) -> Result<S, ActorError> + Send + 'static,
        H: FnMut(&mut S, &mut Context<'_>, Message) -> HandlerResult + Send + 'static,
    {
        self.spawn_actor(FnActor::new(init, handler))
    }

    /// Spawn a child actor.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::ShuttingDown`] once the runtime is stopping.
    pub fn spawn_actor<A: Actor>(&self, actor: A) -> Result<ActorId, RuntimeError> {
        self.handle.spawn_boxed(Box::new(actor), Some(self.id))
    }

    /// Link this actor to `peer`: this actor is notified when `peer` exits.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::NoSuchActor`] if `peer` is gone.
    pub fn link(&self, peer: ActorId, mode: LinkMode) -> Result<(), RuntimeError> {
        self.handle.link(self.id, peer, mode)
    }

    /// Remove any link between this actor and `peer`.
    pub fn unlink(&self, peer: ActorId) {
        self.handle.unlink(self.id, peer);
    }

    /// Force-stop `target` with `Killed`.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::NoSuchActor`] if the target is gone.
    pub fn kill(&self, target: ActorId) -> Result<(), RuntimeError> {
        self.handle.kill(target)
    }

    /// Register interest in a result that will arrive later.
    ///
    /// Whoever produces the result calls [`RuntimeHandle::complete`] with
    /// this actor's id and the returned [`OpId`].
    pub fn begin_operation(&mut self) -> OpId {
        let op = self.handle.next_op();
        self.pending.insert(op);
        op
    }

    /// Whether `op` is still awaited.
    pub fn is_pending(&self, op: OpId) -> bool {
        self.pending.contains(&op)
    }

    /// Stop waiting for `op`. A result arriving later is ignored.
    pub fn cancel(&mut self, op: OpId) {
        if self.pending.remove(&op) {
            self.handle.cancel_timer(op);
        }
    }

    /// Deliver `message` to this actor after `delay`, as the result of a
    /// new operation. Cancelling the returned id suppresses delivery.
    pub fn send_after(&mut self, delay: Duration, message: Message) -> OpId {
        let op = self.begin_operation();
        self.handle.schedule_timer(op, self.id, delay, message);
        op
    }
}
