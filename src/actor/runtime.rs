//! Runtime: worker pool, run queue and termination handling.
//!
//! # Scheduling
//!
//! ```text
//!  send ──▶ mailbox ──▶ (first message?) ──▶ run queue ──▶ worker
//!                                                            │
//!              ┌─────────── more mail? ◀── one turn ◀────────┘
//!              ▼
//!          run queue
//! ```
//!
//! A cell is on the run queue at most once, guarded by its `scheduled`
//! flag. A worker that pops it runs exactly one envelope, then clears the
//! flag and re-queues the cell if more work arrived. Turns of one actor
//! therefore never overlap, while different actors run on different workers.

use super::behavior::FnActor;
use super::cell::{ActorCell, Envelope};
use super::lifecycle::Registry;
use super::timer::{self, TimerCommand};
use super::{
    Actor, ActorError, ActorId, Context, Down, ExitReason, Flow, HandlerResult, Lifecycle,
    LinkMode, OpId, RuntimeError,
};
use crate::message::Message;
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Configuration for the [`Runtime`].
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Number of worker threads (at least one).
    pub workers: usize,
    /// Whether the exit of a root actor (one without a parent) shuts the
    /// runtime down.
    pub shutdown_on_root_exit: bool,
    /// Prefix for worker and service thread names.
    pub thread_name: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            workers: thread::available_parallelism().map_or(2, |n| n.get().min(8)),
            shutdown_on_root_exit: true,
            thread_name: "keel".to_string(),
        }
    }
}

/// How the runtime ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitStatus {
    reason: ExitReason,
}

impl ExitStatus {
    /// The reason that triggered shutdown.
    pub const fn reason(&self) -> &ExitReason {
        &self.reason
    }

    /// Process exit code: `0` for a normal shutdown.
    pub const fn code(&self) -> i32 {
        self.reason.exit_code()
    }

    /// Whether shutdown was normal.
    pub const fn success(&self) -> bool {
        self.reason.is_normal()
    }
}

enum Job {
    Run(Arc<ActorCell>),
    Stop,
}

pub(crate) struct Shared {
    config: RuntimeConfig,
    registry: Registry,
    run_tx: Sender<Job>,
    run_rx: Receiver<Job>,
    timer_tx: Sender<TimerCommand>,
    next_op: AtomicU64,
    stopping: AtomicBool,
    finished: AtomicBool,
    exit: Mutex<Option<ExitReason>>,
    done_tx: Sender<()>,
}

/// Cloneable handle to a running runtime.
///
/// This is what actors (through [`Context::runtime`]), event sources and
/// command handlers hold to reach mailboxes.
#[derive(Clone)]
pub struct RuntimeHandle {
    shared: Arc<Shared>,
}

/// Owner of the worker pool.
///
/// Dropping the runtime kills every remaining actor and joins the workers.
pub struct Runtime {
    handle: RuntimeHandle,
    threads: Vec<JoinHandle<()>>,
    done_rx: Receiver<()>,
}

impl Runtime {
    /// Start a runtime with the default configuration.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::Thread`] if a worker thread cannot be spawned.
    pub fn new() -> Result<Self, RuntimeError> {
        Self::with_config(RuntimeConfig::default())
    }

    /// Start a runtime with a custom configuration.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::Thread`] if a worker thread cannot be spawned.
    pub fn with_config(mut config: RuntimeConfig) -> Result<Self, RuntimeError> {
        config.workers = config.workers.max(1);

        let (run_tx, run_rx) = unbounded();
        let (timer_tx, timer_rx) = unbounded();
        let (done_tx, done_rx) = bounded(1);

        let shared = Arc::new(Shared {
            config,
            registry: Registry::new(),
            run_tx,
            run_rx,
            timer_tx,
            next_op: AtomicU64::new(1),
            stopping: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            exit: Mutex::new(None),
            done_tx,
        });
        let handle = RuntimeHandle { shared };
        let mut runtime = Self {
            handle: handle.clone(),
            threads: Vec::new(),
            done_rx,
        };

        let prefix = handle.shared.config.thread_name.clone();
        let timer = timer::spawn(
            timer_rx,
            Arc::downgrade(&handle.shared),
            format!("{prefix}-timer"),
        )
        .map_err(|e| RuntimeError::Thread(e.to_string()))?;
        runtime.threads.push(timer);

        for index in 0..handle.shared.config.workers {
            let worker = handle.clone();
            let thread = thread::Builder::new()
                .name(format!("{prefix}-worker-{index}"))
                .spawn(move || worker.worker_loop())
                .map_err(|e| RuntimeError::Thread(e.to_string()))?;
            runtime.threads.push(thread);
        }

        debug!(workers = handle.shared.config.workers, "runtime started");
        Ok(runtime)
    }

    /// A handle for spawning and sending.
    pub fn handle(&self) -> RuntimeHandle {
        self.handle.clone()
    }

    /// Block until the runtime has shut down.
    pub fn wait(mut self) -> ExitStatus {
        let _ = self.done_rx.recv();
        self.join_threads();
        self.handle.exit_status()
    }

    /// Like [`Runtime::wait`], giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns the runtime back if it is still running.
    pub fn wait_timeout(mut self, timeout: Duration) -> Result<ExitStatus, Self> {
        match self.done_rx.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                self.join_threads();
                Ok(self.handle.exit_status())
            }
            Err(RecvTimeoutError::Timeout) => Err(self),
        }
    }

    fn join_threads(&mut self) {
        for thread in self.threads.drain(..) {
            let _ = thread.join();
        }
    }
}

impl std::ops::Deref for Runtime {
    type Target = RuntimeHandle;

    fn deref(&self) -> &Self::Target {
        &self.handle
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        if self.threads.is_empty() {
            return;
        }
        self.handle.begin_shutdown(ExitReason::Killed);
        self.join_threads();
    }
}

impl RuntimeHandle {
    pub(crate) const fn from_shared(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    // ----------------------------------------------------------------------
    // Spawning
    // ----------------------------------------------------------------------

    /// Spawn a root actor from an `init` closure and a message handler.
    ///
    /// `init` runs on the actor's first turn and builds its private state;
    /// `handler` then receives every message with that state.
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
        self.spawn_boxed(Box::new(FnActor::new(init, handler)), None)
    }

    /// Spawn a root actor.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::ShuttingDown`] once the runtime is stopping.
    pub fn spawn_actor<A: Actor>(&self, actor: A) -> Result<ActorId, RuntimeError> {
        self.spawn_boxed(Box::new(actor), None)
    }

    pub(crate) fn spawn_boxed(
        &self,
        actor: Box<dyn Actor>,
        parent: Option<ActorId>,
    ) -> Result<ActorId, RuntimeError> {
        if self.is_stopping() {
            return Err(RuntimeError::ShuttingDown);
        }

        let id = self.shared.registry.allocate();
        let cell = Arc::new(ActorCell::new(id, parent, actor));

        if let Some(parent_id) = parent {
            let parent_cell = self
                .shared
                .registry
                .get(parent_id)
                .ok_or(RuntimeError::NoSuchActor(parent_id))?;
            let mut parent_links = parent_cell.links.lock();
            if parent_links.closed {
                return Err(RuntimeError::NoSuchActor(parent_id));
            }
            parent_links.children.insert(id);
            parent_links.watching.insert(id);
            cell.links.lock().add_watcher(parent_id, LinkMode::Monitor);
        }

        self.shared.registry.insert(Arc::clone(&cell));
        cell.enqueue(Envelope::Start);
        debug!(actor = %id, name = cell.name, parent = ?parent, "actor spawned");

        // Lost a race with `begin_shutdown`: make sure this one is collected too.
        if self.is_stopping() {
            cell.request_exit(ExitReason::Killed);
        }
        self.schedule(&cell);
        Ok(id)
    }

    // ----------------------------------------------------------------------
    // Messaging
    // ----------------------------------------------------------------------

    /// Send a message from outside any actor.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::NoSuchActor`] if the target has terminated.
    pub fn send(&self, to: ActorId, message: Message) -> Result<(), RuntimeError> {
        self.send_from(None, to, message)
    }

    pub(crate) fn send_from(
        &self,
        sender: Option<ActorId>,
        to: ActorId,
        message: Message,
    ) -> Result<(), RuntimeError> {
        self.deliver(to, Envelope::User { sender, message })
    }

    /// Send `message` to every actor linked with `from`.
    pub fn broadcast_from(&self, from: ActorId, message: &Message) -> usize {
        let Some(cell) = self.shared.registry.get(from) else {
            return 0;
        };
        let peers = cell.links.lock().peers();
        peers
            .into_iter()
            .filter(|peer| self.send_from(Some(from), *peer, message.clone()).is_ok())
            .count()
    }

    /// Deliver the result of operation `op` to `target`.
    ///
    /// The result is handled only if `target` still awaits `op`.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::NoSuchActor`] if the target has terminated.
    pub fn complete(
        &self,
        target: ActorId,
        op: OpId,
        message: Message,
    ) -> Result<(), RuntimeError> {
        self.deliver(target, Envelope::Completion { op, message })
    }

    /// Ask `target` to stop waiting for `op`.
    ///
    /// Handled in mailbox order: a result already queued before the request
    /// is still handled, anything arriving after it is dropped.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::NoSuchActor`] if the target has terminated.
    pub fn cancel(&self, target: ActorId, op: OpId) -> Result<(), RuntimeError> {
        self.deliver(target, Envelope::Cancel(op))
    }

    fn deliver(&self, to: ActorId, envelope: Envelope) -> Result<(), RuntimeError> {
        let cell = self
            .shared
            .registry
            .get(to)
            .filter(|cell| cell.lifecycle().is_alive())
            .ok_or(RuntimeError::NoSuchActor(to))?;
        cell.enqueue(envelope);
        self.schedule(&cell);
        Ok(())
    }

    pub(crate) fn next_op(&self) -> OpId {
        OpId::new(self.shared.next_op.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn schedule_timer(
        &self,
        op: OpId,
        target: ActorId,
        delay: Duration,
        message: Message,
    ) {
        let _ = self.shared.timer_tx.send(TimerCommand::Schedule {
            op,
            target,
            deadline: Instant::now() + delay,
            message,
        });
    }

    pub(crate) fn cancel_timer(&self, op: OpId) {
        let _ = self.shared.timer_tx.send(TimerCommand::Cancel(op));
    }

    // ----------------------------------------------------------------------
    // Supervision
    // ----------------------------------------------------------------------

    /// Make `watcher` observe the termination of `target`.
    ///
    /// With [`LinkMode::Bidirectional`] both sides observe each other, and
    /// an abnormal exit of either takes the other down with
    /// [`ExitReason::LinkedExit`].
    ///
    /// # Errors
    ///
    /// [`RuntimeError::NoSuchActor`] if either actor is gone.
    pub fn link(
        &self,
        watcher: ActorId,
        target: ActorId,
        mode: LinkMode,
    ) -> Result<(), RuntimeError> {
        if watcher == target {
            return Ok(());
        }
        let watcher_cell = self
            .shared
            .registry
            .get(watcher)
            .ok_or(RuntimeError::NoSuchActor(watcher))?;
        let target_cell = self
            .shared
            .registry
            .get(target)
            .ok_or(RuntimeError::NoSuchActor(target))?;

        {
            let mut links = target_cell.links.lock();
            if links.closed {
                return Err(RuntimeError::NoSuchActor(target));
            }
            links.add_watcher(watcher, mode);
            if mode == LinkMode::Bidirectional {
                links.watching.insert(watcher);
            }
        }
        {
            let mut links = watcher_cell.links.lock();
            if links.closed {
                return Err(RuntimeError::NoSuchActor(watcher));
            }
            links.watching.insert(target);
            if mode == LinkMode::Bidirectional {
                links.add_watcher(target, mode);
            }
        }
        debug!(%watcher, %target, ?mode, "linked");
        Ok(())
    }

    /// Remove every link between `a` and `b`.
    pub fn unlink(&self, a: ActorId, b: ActorId) {
        for (this, other) in [(a, b), (b, a)] {
            if let Some(cell) = self.shared.registry.get(this) {
                cell.links.lock().forget(other);
            }
        }
    }

    /// Force-stop an actor with [`ExitReason::Killed`].
    ///
    /// The kill preempts messages already queued.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::NoSuchActor`] if the actor is gone.
    pub fn kill(&self, id: ActorId) -> Result<(), RuntimeError> {
        self.exit(id, ExitReason::Killed)
    }

    fn exit(&self, id: ActorId, reason: ExitReason) -> Result<(), RuntimeError> {
        let cell = self
            .shared
            .registry
            .get(id)
            .ok_or(RuntimeError::NoSuchActor(id))?;
        cell.request_exit(reason);
        self.schedule(&cell);
        Ok(())
    }

    /// Lifecycle state of `id`. `None` if the id was never allocated.
    pub fn lifecycle(&self, id: ActorId) -> Option<Lifecycle> {
        match self.shared.registry.get(id) {
            Some(cell) => Some(cell.lifecycle()),
            None if self.shared.registry.was_allocated(id) => Some(Lifecycle::Terminated),
            None => None,
        }
    }

    /// Whether `id` is alive.
    pub fn is_alive(&self, id: ActorId) -> bool {
        self.lifecycle(id).is_some_and(Lifecycle::is_alive)
    }

    /// Number of actors not yet removed.
    pub fn actor_count(&self) -> usize {
        self.shared.registry.len()
    }

    /// Begin a normal shutdown: every actor is killed, then workers stop.
    ///
    /// Has no effect on the recorded exit status once shutdown has begun.
    pub fn shutdown(&self) {
        self.begin_shutdown(ExitReason::Normal);
    }

    /// Whether shutdown has begun.
    pub fn is_stopping(&self) -> bool {
        self.shared.stopping.load(Ordering::SeqCst)
    }

    // ----------------------------------------------------------------------
    // Workers
    // ----------------------------------------------------------------------

    fn schedule(&self, cell: &Arc<ActorCell>) {
        if cell.try_schedule() {
            let _ = self.shared.run_tx.send(Job::Run(Arc::clone(cell)));
        }
    }

    fn release(&self, cell: &Arc<ActorCell>) {
        cell.unschedule();
        if cell.has_work() {
            self.schedule(cell);
        }
    }

    fn worker_loop(&self) {
        let jobs = self.shared.run_rx.clone();
        while let Ok(job) = jobs.recv() {
            match job {
                Job::Run(cell) => self.run_turn(&cell),
                Job::Stop => break,
            }
        }
    }

    fn run_turn(&self, cell: &Arc<ActorCell>) {
        if cell.lifecycle() == Lifecycle::Terminated {
            return;
        }
        if let Some(reason) = cell.take_pending_exit() {
            self.terminate(cell, reason);
            return;
        }
        let Some(envelope) = cell.next_envelope() else {
            self.release(cell);
            return;
        };

        let outcome = {
            let mut slot = cell.slot.lock();
            let Some(slot) = slot.as_mut() else {
                return;
            };
            catch_unwind(AssertUnwindSafe(|| slot.deliver(self, cell, envelope)))
        };

        match outcome {
            Ok(Ok(Flow::Continue)) => self.release(cell),
            Ok(Ok(Flow::Stop)) => self.terminate(cell, ExitReason::Normal),
            Ok(Err(err)) => {
                warn!(actor = %cell.id, name = cell.name, error = %err, "actor failed");
                self.terminate(cell, ExitReason::Error(err.to_string()));
            }
            Err(panic) => {
                let detail = panic_detail(panic.as_ref());
                warn!(actor = %cell.id, name = cell.name, panic = %detail, "actor panicked");
                self.terminate(cell, ExitReason::Error(format!("panicked: {detail}")));
            }
        }
    }

    /// Tear an actor down and notify its links.
    ///
    /// Must run on the worker that owns the cell's current turn.
    fn terminate(&self, cell: &Arc<ActorCell>, reason: ExitReason) {
        if !cell.begin_stopping() {
            return;
        }

        let slot = cell.slot.lock().take();
        if let Some(slot) = slot {
            let outcome = catch_unwind(AssertUnwindSafe(|| slot.stop(self, cell.id, &reason)));
            match outcome {
                Ok(pending) => {
                    for op in pending {
                        self.cancel_timer(op);
                    }
                }
                Err(panic) => {
                    let detail = panic_detail(panic.as_ref());
                    warn!(actor = %cell.id, panic = %detail, "stopped hook panicked");
                }
            }
        }

        let links = cell.links.lock().close();
        cell.set_lifecycle(Lifecycle::Terminated);
        let dropped = cell.drain();
        info!(actor = %cell.id, name = cell.name, %reason, dropped, "actor terminated");

        // Notifications go out before the record leaves the registry.
        for (watcher, mode) in links.watchers {
            if let Some(watcher_cell) = self.shared.registry.get(watcher) {
                watcher_cell.links.lock().forget(cell.id);
            }
            let down = Down {
                id: cell.id,
                reason: reason.clone(),
            };
            let _ = self.deliver(watcher, Envelope::Down(down));
            if mode == LinkMode::Bidirectional && !reason.is_normal() {
                let _ = self.exit(watcher, ExitReason::LinkedExit { peer: cell.id });
            }
        }
        for watched in links.watching {
            if let Some(watched_cell) = self.shared.registry.get(watched) {
                watched_cell.links.lock().forget(cell.id);
            }
        }
        for child in links.children {
            let _ = self.exit(child, ExitReason::Killed);
        }
        if let Some(parent) = cell.parent.and_then(|p| self.shared.registry.get(p)) {
            parent.links.lock().children.remove(&cell.id);
        }

        self.shared.registry.remove(cell.id);

        if cell.parent.is_none() && self.shared.config.shutdown_on_root_exit {
            self.begin_shutdown(reason);
        }
        self.maybe_finish();
    }

    fn begin_shutdown(&self, reason: ExitReason) {
        {
            let mut exit = self.shared.exit.lock();
            if exit.is_none() {
                *exit = Some(reason);
            }
        }
        if self.shared.stopping.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(actors = self.shared.registry.len(), "runtime shutting down");
        for id in self.shared.registry.ids() {
            let _ = self.exit(id, ExitReason::Killed);
        }
        self.maybe_finish();
    }

    fn maybe_finish(&self) {
        if !self.is_stopping() || !self.shared.registry.is_empty() {
            return;
        }
        if self.shared.finished.swap(true, Ordering::SeqCst) {
            return;
        }
        for _ in 0..self.shared.config.workers {
            let _ = self.shared.run_tx.send(Job::Stop);
        }
        let _ = self.shared.timer_tx.send(TimerCommand::Shutdown);
        let _ = self.shared.done_tx.try_send(());
        debug!("runtime finished");
    }

    fn exit_status(&self) -> ExitStatus {
        ExitStatus {
            reason: self.shared.exit.lock().clone().unwrap_or(ExitReason::Normal),
        }
    }
}

fn panic_detail(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
