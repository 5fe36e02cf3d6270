//! Actor record: mailbox, scheduling flag and the owned behaviour slot.

use super::context::Context;
use super::link::Links;
use super::runtime::RuntimeHandle;
use super::{Actor, ActorId, Down, ExitReason, Flow, HandlerResult, Lifecycle, OpId};
use crate::message::Message;
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use tracing::trace;

/// Everything that can sit in a mailbox.
pub(crate) enum Envelope {
    /// Runs `Actor::started`. Always the first envelope.
    Start,
    /// Ordinary message.
    User {
        sender: Option<ActorId>,
        message: Message,
    },
    /// Result of a suspended operation.
    Completion { op: OpId, message: Message },
    /// Cancellation request for a suspended operation.
    Cancel(OpId),
    /// A watched actor terminated.
    Down(Down),
}

/// The part of an actor only its own turn may touch.
pub(crate) struct Slot {
    actor: Box<dyn Actor>,
    pending: HashSet<OpId>,
}

impl Slot {
    pub fn new(actor: Box<dyn Actor>) -> Self {
        Self {
            actor,
            pending: HashSet::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.actor.name()
    }

    pub fn deliver(
        &mut self,
        handle: &RuntimeHandle,
        cell: &ActorCell,
        envelope: Envelope,
    ) -> HandlerResult {
        let mut ctx = Context::new(handle, cell.id, &mut self.pending);
        match envelope {
            Envelope::Start => {
                let flow = self.actor.started(&mut ctx);
                cell.set_lifecycle(Lifecycle::Running);
                flow
            }
            Envelope::User { sender, message } => {
                ctx.set_sender(sender);
                self.actor.handle(&mut ctx, message)
            }
            Envelope::Completion { op, message } => {
                if ctx.take_pending(op) {
                    ctx.set_operation(op);
                    self.actor.handle(&mut ctx, message)
                } else {
                    trace!(
                        actor = %cell.id,
                        %op,
                        name = message.name(),
                        "dropping result of cancelled operation"
                    );
                    Ok(Flow::Continue)
                }
            }
            Envelope::Cancel(op) => {
                ctx.cancel(op);
                Ok(Flow::Continue)
            }
            Envelope::Down(down) => self.actor.on_down(&mut ctx, down),
        }
    }

    /// Run the `stopped` hook and hand back the operations still pending.
    pub fn stop(mut self, handle: &RuntimeHandle, id: ActorId, reason: &ExitReason) -> Vec<OpId> {
        let pending: Vec<OpId> = self.pending.drain().collect();
        let mut scratch = HashSet::new();
        let mut ctx = Context::new(handle, id, &mut scratch);
        self.actor.stopped(&mut ctx, reason);
        pending
    }
}

/// A live actor as seen by the runtime.
pub(crate) struct ActorCell {
    pub id: ActorId,
    pub parent: Option<ActorId>,
    pub name: &'static str,
    tx: Sender<Envelope>,
    rx: Receiver<Envelope>,
    scheduled: AtomicBool,
    lifecycle: AtomicU8,
    pending_exit: Mutex<Option<ExitReason>>,
    pub slot: Mutex<Option<Slot>>,
    pub links: Mutex<Links>,
}

impl ActorCell {
    pub fn new(id: ActorId, parent: Option<ActorId>, actor: Box<dyn Actor>) -> Self {
        let (tx, rx) = unbounded();
        let slot = Slot::new(actor);
        Self {
            id,
            parent,
            name: slot.name(),
            tx,
            rx,
            scheduled: AtomicBool::new(false),
            lifecycle: AtomicU8::new(Lifecycle::Starting as u8),
            pending_exit: Mutex::new(None),
            slot: Mutex::new(Some(slot)),
            links: Mutex::new(Links::default()),
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        Lifecycle::from_u8(self.lifecycle.load(Ordering::SeqCst))
    }

    pub fn set_lifecycle(&self, state: Lifecycle) {
        // Never move backwards: `Start` may finish after a kill was requested.
        self.lifecycle.fetch_max(state as u8, Ordering::SeqCst);
    }

    /// Move into `Stopping`. Returns `false` if already stopping or gone.
    pub fn begin_stopping(&self) -> bool {
        self.lifecycle.fetch_max(Lifecycle::Stopping as u8, Ordering::SeqCst)
            < Lifecycle::Stopping as u8
    }

    pub fn enqueue(&self, envelope: Envelope) {
        // The cell owns the receiver, so the channel cannot be disconnected.
        let _ = self.tx.send(envelope);
    }

    pub fn next_envelope(&self) -> Option<Envelope> {
        self.rx.try_recv().ok()
    }

    pub fn drain(&self) -> usize {
        self.rx.try_iter().count()
    }

    /// Request termination. The first reason wins.
    pub fn request_exit(&self, reason: ExitReason) {
        let mut pending = self.pending_exit.lock();
        if pending.is_none() {
            *pending = Some(reason);
        }
    }

    pub fn take_pending_exit(&self) -> Option<ExitReason> {
        self.pending_exit.lock().take()
    }

    pub fn has_work(&self) -> bool {
        !self.rx.is_empty() || self.pending_exit.lock().is_some()
    }

    /// Claim the right to enqueue this cell on the run queue.
    pub fn try_schedule(&self) -> bool {
        !self.scheduled.swap(true, Ordering::SeqCst)
    }

    pub fn unschedule(&self) {
        self.scheduled.store(false, Ordering::SeqCst);
    }
}
