//! The editor shell: root actor, status line and their wiring.
//!
//! ```text
//!   Editor (root)
//!     ├── event hub      ◄── InputSource / TickerSource
//!     ├── status line    (input.resize, timer.tick, status.*)
//!     └── keymap         (input.key) ──► CommandRegistry
//! ```
//!
//! Any child exiting abnormally takes the editor down with an error, so the
//! runtime ends with exit code 1 whatever the child's own reason was.

use crate::actor::{
    Actor, ActorError, ActorId, Context, Down, Flow, HandlerResult, RuntimeHandle,
};
use crate::command::{Builtins, CommandRegistry, Trigger, STATUS_SHOW};
use crate::config::Config;
use crate::event::{EventHub, SourceKind, RESIZE, TICK};
use crate::keymap::{KeyTable, KeymapActor, MODE_CHANGED};
use crate::message::{Message, Value};
use crate::swap::Published;
use crate::terminal::OutputBuffer;
use crate::{Error, Result};
use crossbeam_channel::{bounded, Sender};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Programmatic command request: `editor.run(command, args...)`.
pub const RUN: &str = "editor.run";

/// Ticks a status message stays visible.
const STATUS_TICKS: i64 = 3;

/// Status line on the terminal's bottom row.
pub struct StatusActor<W> {
    out: W,
    buffer: OutputBuffer,
    width: u16,
    height: u16,
    mode: String,
    text: String,
    last_tick: i64,
    clear_at: Option<i64>,
}

impl<W: Write + Send + 'static> StatusActor<W> {
    /// A status line drawn into `out` for a `width` x `height` terminal.
    pub fn new(out: W, (width, height): (u16, u16)) -> Self {
        Self {
            out,
            buffer: OutputBuffer::new(),
            width,
            height,
            mode: String::new(),
            text: String::new(),
            last_tick: 0,
            clear_at: None,
        }
    }

    fn render(&mut self) -> std::io::Result<()> {
        let width = usize::from(self.width);
        self.buffer.clear();
        self.buffer.cursor_move(0, self.height.saturating_sub(1));
        self.buffer.clear_line();
        self.buffer.reverse();
        let mut used = self.buffer.write_clipped(" ", width);
        used += self.buffer.write_clipped(&self.mode.to_uppercase(), width - used);
        used += self.buffer.write_clipped(" ", width - used);
        self.buffer.reset_attrs();
        if !self.text.is_empty() {
            used += self.buffer.write_clipped(" ", width - used);
            used += self.buffer.write_clipped(&self.text, width - used);
        }
        self.buffer.pad(width - used);
        self.buffer.flush_to(&mut self.out)
    }
}

impl<W: Write + Send + 'static> Actor for StatusActor<W> {
    fn name(&self) -> &'static str {
        "status"
    }

    fn handle(&mut self, _ctx: &mut Context<'_>, message: Message) -> HandlerResult {
        match message.name() {
            STATUS_SHOW => {
                self.text = message.str_arg(0).unwrap_or_default().to_string();
                self.clear_at = Some(self.last_tick + STATUS_TICKS);
            }
            MODE_CHANGED => {
                self.mode = message.str_arg(0).unwrap_or_default().to_string();
            }
            RESIZE => {
                let size = (message.int_arg(0), message.int_arg(1));
                if let (Some(w), Some(h)) = size {
                    self.width = u16::try_from(w).unwrap_or(self.width);
                    self.height = u16::try_from(h).unwrap_or(self.height);
                }
            }
            TICK => {
                self.last_tick = message.int_arg(0).unwrap_or(self.last_tick);
                match self.clear_at {
                    Some(at) if self.last_tick >= at => {
                        self.clear_at = None;
                        self.text.clear();
                    }
                    _ => return Ok(Flow::Continue),
                }
            }
            _ => return Ok(Flow::Continue),
        }
        self.render()?;
        Ok(Flow::Continue)
    }
}

/// Handles returned by [`Editor::launch`].
pub struct Launched {
    /// The root actor.
    pub editor: ActorId,
    /// Hub the event sources publish to.
    pub hub: EventHub,
    /// The command catalog.
    pub registry: Arc<CommandRegistry>,
    /// Published keybinding table; store a new one to reload.
    pub keymap: Arc<Published<KeyTable>>,
}

/// Root actor owning the hub, the status line and the keymap.
pub struct Editor<W> {
    registry: Arc<CommandRegistry>,
    table: Arc<Published<KeyTable>>,
    initial_mode: String,
    chord_timeout: Duration,
    size: (u16, u16),
    status_out: Option<W>,
    ready: Option<Sender<EventHub>>,
    status: Option<ActorId>,
}

impl<W: Write + Send + 'static> Editor<W> {
    /// Build the keymap from `config`, spawn the editor on `runtime` and wait
    /// until its children are wired.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for an invalid keymap, [`Error::Runtime`] if the
    /// runtime is stopping, [`Error::Startup`] if the editor failed to start.
    pub fn launch(
        runtime: &RuntimeHandle,
        config: &Config,
        size: (u16, u16),
        out: W,
    ) -> Result<Launched> {
        let table = Arc::new(Published::new(config.key_table()?));
        let registry = Arc::new(CommandRegistry::new());
        let (ready, hub_rx) = bounded(1);
        let editor = runtime.spawn_actor(Self {
            registry: Arc::clone(&registry),
            table: Arc::clone(&table),
            initial_mode: config.initial_mode.clone(),
            chord_timeout: config.chord_timeout(),
            size,
            status_out: Some(out),
            ready: Some(ready),
            status: None,
        })?;
        // A failed start drops the sender.
        let hub = hub_rx
            .recv_timeout(Duration::from_secs(5))
            .map_err(|_| Error::Startup("editor did not start".to_string()))?;
        info!(%editor, "editor started");
        Ok(Launched {
            editor,
            hub,
            registry,
            keymap: table,
        })
    }

    fn run(&self, ctx: &Context<'_>, message: &Message) {
        let Some(command) = message.str_arg(0) else {
            warn!(%message, "editor.run without a command");
            return;
        };
        let trigger = Trigger::Actor(ctx.sender().unwrap_or_else(|| ctx.id()));
        let result = self.registry.dispatch(command, &message.values()[1..], &trigger);
        if let (Err(err), Some(status)) = (result, self.status) {
            let report = Message::new(STATUS_SHOW, vec![Value::Str(err.to_string())]);
            let _ = ctx.send(status, report);
        }
    }
}

impl<W: Write + Send + 'static> Actor for Editor<W> {
    fn name(&self) -> &'static str {
        "editor"
    }

    fn started(&mut self, ctx: &mut Context<'_>) -> HandlerResult {
        let out = self
            .status_out
            .take()
            .ok_or_else(|| ActorError::failed("status output already taken"))?;
        let hub = EventHub::spawn_child(ctx)?;

        let status = ctx.spawn_actor(StatusActor::new(out, self.size))?;
        hub.subscribe(SourceKind::Input, status)?;
        hub.subscribe(SourceKind::Timer, status)?;

        let keymap = ctx.spawn_actor(
            KeymapActor::new(
                Arc::clone(&self.table),
                Arc::clone(&self.registry),
                &self.initial_mode,
                self.chord_timeout,
            )
            .with_status(status),
        )?;
        hub.subscribe(SourceKind::Input, keymap)?;

        Builtins {
            runtime: ctx.runtime().clone(),
            keymap: Some(keymap),
            status: Some(status),
        }
        .install(&self.registry);
        self.status = Some(status);
        debug!(hub = %hub.id(), %status, %keymap, "editor wired");

        if let Some(ready) = self.ready.take() {
            let _ = ready.send(hub);
        }
        Ok(Flow::Continue)
    }

    fn handle(&mut self, ctx: &mut Context<'_>, message: Message) -> HandlerResult {
        if message.is(RUN) {
            self.run(ctx, &message);
        }
        Ok(Flow::Continue)
    }

    fn on_down(&mut self, _ctx: &mut Context<'_>, down: Down) -> HandlerResult {
        if down.reason.is_normal() {
            return Ok(Flow::Continue);
        }
        Err(ActorError::failed(format!("child {} exited: {}", down.id, down.reason)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{Runtime, RuntimeConfig};
    use parking_lot::Mutex;
    use std::thread;

    #[derive(Clone, Default)]
    struct Screen(Arc<Mutex<Vec<u8>>>);

    impl Screen {
        fn last_line(&self) -> String {
            let bytes = self.0.lock();
            let text = String::from_utf8_lossy(&bytes);
            // Each render starts by clearing the line.
            text.rsplit("\x1b[2K").next().unwrap_or_default().to_string()
        }
    }

    impl Write for Screen {
        fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(data);
            Ok(data.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn wait_for(screen: &Screen, needle: &str) -> bool {
        for _ in 0..100 {
            if screen.last_line().contains(needle) {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn test_status_line_layout() {
        let mut status = StatusActor::new(Vec::new(), (20, 5));
        status.mode = "edit".into();
        status.text = "saved all buffers".into();
        status.render().unwrap();
        let text = String::from_utf8(status.out).unwrap();
        assert!(text.starts_with("\x1b[5;1H\x1b[2K\x1b[7m EDIT \x1b[0m"));
        assert!(text.ends_with("\x1b[0m saved all buf"));
    }

    #[test]
    fn test_keys_switch_mode_and_quit() {
        let rt = Runtime::with_config(RuntimeConfig {
            workers: 2,
            ..RuntimeConfig::default()
        })
        .unwrap();
        let screen = Screen::default();
        let launched =
            Editor::launch(&rt.handle(), &Config::default(), (40, 10), screen.clone()).unwrap();
        assert!(wait_for(&screen, "NORMAL"));

        launched.hub.publish(crate::message!("input.key", "i")).unwrap();
        assert!(wait_for(&screen, "EDIT"));

        rt.send(launched.editor, crate::message!(RUN, "status", "hello")).unwrap();
        assert!(wait_for(&screen, "hello"));

        // esc is edit's own binding; ctrl+q comes from normal.
        launched.hub.publish(crate::message!("input.key", "ctrl+q")).unwrap();
        let status = rt.wait_timeout(Duration::from_secs(5)).ok().unwrap();
        assert!(status.success());
    }

    struct Unplugged;

    impl Write for Unplugged {
        fn write(&mut self, _data: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "unplugged"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_failed_child_ends_runtime_with_error() {
        let rt = Runtime::with_config(RuntimeConfig {
            workers: 2,
            ..RuntimeConfig::default()
        })
        .unwrap();
        // The first mode notification makes the status line write and fail.
        Editor::launch(&rt.handle(), &Config::default(), (40, 10), Unplugged).unwrap();
        let status = rt.wait_timeout(Duration::from_secs(5)).ok().unwrap();
        assert_eq!(status.code(), 1);
        assert!(status.reason().to_string().contains("exited"));
    }

    #[test]
    fn test_unknown_command_is_reported() {
        let rt = Runtime::with_config(RuntimeConfig {
            workers: 2,
            ..RuntimeConfig::default()
        })
        .unwrap();
        let screen = Screen::default();
        let launched =
            Editor::launch(&rt.handle(), &Config::default(), (60, 10), screen.clone()).unwrap();
        rt.send(launched.editor, crate::message!(RUN, "frobnicate")).unwrap();
        assert!(wait_for(&screen, "unknown command: frobnicate"));
        assert_eq!(launched.registry.names(), ["noop", "quit", "set_mode", "status"]);
    }
}
