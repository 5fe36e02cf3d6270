//! Timer service: dedicated thread turning deadlines into completions.
//!
//! Actors never sleep. `Context::send_after` registers a deadline here and
//! yields; when it passes, the timer thread delivers the message as the
//! result of the suspended operation. Cancelled timers are removed from the
//! queue, and anything that slips through is discarded by the owner's
//! pending-operation set.

use super::runtime::{RuntimeHandle, Shared};
use super::{ActorId, OpId};
use crate::message::Message;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::io;
use std::sync::Weak;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::trace;

/// Requests to the timer thread.
pub(crate) enum TimerCommand {
    Schedule {
        op: OpId,
        target: ActorId,
        deadline: Instant,
        message: Message,
    },
    Cancel(OpId),
    Shutdown,
}

struct Entry {
    target: ActorId,
    message: Message,
}

/// Spawn the timer thread.
pub(crate) fn spawn(
    commands: Receiver<TimerCommand>,
    shared: Weak<Shared>,
    name: String,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(name)
        .spawn(move || run_loop(&commands, &shared))
}

fn run_loop(commands: &Receiver<TimerCommand>, shared: &Weak<Shared>) {
    let mut queue: BinaryHeap<Reverse<(Instant, OpId)>> = BinaryHeap::new();
    let mut entries: HashMap<OpId, Entry> = HashMap::new();

    loop {
        // Fire everything that is due
        let now = Instant::now();
        while let Some(Reverse((deadline, op))) = queue.peek().copied() {
            if deadline > now {
                break;
            }
            queue.pop();
            if let Some(entry) = entries.remove(&op) {
                let Some(shared) = shared.upgrade() else {
                    return;
                };
                let handle = RuntimeHandle::from_shared(shared);
                if handle.complete(entry.target, op, entry.message).is_err() {
                    trace!(%op, target = %entry.target, "timer target is gone");
                }
            }
        }

        let command = match queue.peek() {
            Some(Reverse((deadline, _))) => match commands.recv_deadline(*deadline) {
                Ok(command) => command,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return,
            },
            None => match commands.recv() {
                Ok(command) => command,
                Err(_) => return,
            },
        };

        match command {
            TimerCommand::Schedule {
                op,
                target,
                deadline,
                message,
            } => {
                queue.push(Reverse((deadline, op)));
                entries.insert(op, Entry { target, message });
            }
            TimerCommand::Cancel(op) => {
                // The heap slot is skipped when it surfaces.
                entries.remove(&op);
            }
            TimerCommand::Shutdown => return,
        }
    }
}
