//! Subprocess channel: a long-lived child speaking framed messages.
//!
//! Requests are written to the child's stdin as length-prefixed encoded
//! messages. A reader thread decodes the child's stdout and publishes to the
//! hub:
//!
//! - `process.message(channel, name, args)` for every decoded message,
//! - `process.error(channel, detail)` for a malformed frame (the frame is
//!   dropped and reading continues),
//! - `process.exit(channel, code)` once stdout closes and the child exits.

use super::{EventError, EventHub};
use crate::message::{encode_frame, FrameDecoder, Message, Value};
use parking_lot::Mutex;
use std::io::{Read, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// `process.message(channel, name, args)`.
pub const PROCESS_MESSAGE: &str = "process.message";
/// `process.error(channel, detail)`.
pub const PROCESS_ERROR: &str = "process.error";
/// `process.exit(channel, code)`; `code` is `-1` when killed by a signal.
pub const PROCESS_EXIT: &str = "process.exit";

const READ_CHUNK: usize = 8 * 1024;

/// Handle to a running subprocess.
pub struct ProcessChannel {
    name: String,
    stdin: Mutex<Option<ChildStdin>>,
    child: Arc<Mutex<Child>>,
    reader: Option<JoinHandle<()>>,
}

impl ProcessChannel {
    /// Start `command` with piped stdin/stdout and begin publishing its
    /// output under the channel `name`.
    ///
    /// # Errors
    ///
    /// [`EventError::Io`] if the process or the reader thread cannot start.
    pub fn spawn(
        name: impl Into<String>,
        command: &mut Command,
        hub: EventHub,
    ) -> Result<Self, EventError> {
        let name = name.into();
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()?;
        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EventError::Closed(name.clone()))?;
        debug!(channel = %name, pid = child.id(), "process started");

        let child = Arc::new(Mutex::new(child));
        let reader = {
            let name = name.clone();
            let child = Arc::clone(&child);
            thread::Builder::new()
                .name(format!("keel-process-{name}"))
                .spawn(move || read_loop(&name, stdout, &child, &hub))?
        };

        Ok(Self {
            name,
            stdin: Mutex::new(stdin),
            child,
            reader: Some(reader),
        })
    }

    /// Channel name used in published events.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Write one framed message to the child's stdin.
    ///
    /// # Errors
    ///
    /// [`EventError::Encoding`] if the message cannot be encoded,
    /// [`EventError::Closed`] after [`ProcessChannel::close_stdin`], or
    /// [`EventError::Io`] if the pipe is broken.
    pub fn send(&self, message: &Message) -> Result<(), EventError> {
        let frame = encode_frame(message)?;
        let mut stdin = self.stdin.lock();
        let pipe = stdin
            .as_mut()
            .ok_or_else(|| EventError::Closed(self.name.clone()))?;
        pipe.write_all(&frame)?;
        pipe.flush()?;
        Ok(())
    }

    /// Close the child's stdin, signalling end of input.
    pub fn close_stdin(&self) {
        self.stdin.lock().take();
    }

    /// Kill the child. Its `process.exit` still gets published.
    ///
    /// # Errors
    ///
    /// [`EventError::Io`] if the signal cannot be delivered.
    pub fn kill(&self) -> Result<(), EventError> {
        self.close_stdin();
        let mut child = self.child.lock();
        if child.try_wait()?.is_none() {
            child.kill()?;
        }
        Ok(())
    }

    /// Wait for the reader thread, i.e. until `process.exit` was published.
    pub fn join(mut self) {
        self.close_stdin();
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
    }

    /// Split a `process.message` event into its channel and inner message.
    pub fn unwrap_message(event: &Message) -> Option<(&str, Message)> {
        if !event.is(PROCESS_MESSAGE) {
            return None;
        }
        let channel = event.str_arg(0)?;
        let name = event.str_arg(1)?;
        let args = event.arg(2).and_then(Value::as_seq)?;
        Some((channel, Message::new(name, args.to_vec())))
    }
}

impl Drop for ProcessChannel {
    fn drop(&mut self) {
        if self.reader.is_some() {
            if let Err(e) = self.kill() {
                debug!(channel = %self.name, error = %e, "kill on drop failed");
            }
        }
    }
}

fn read_loop(name: &str, mut stdout: ChildStdout, child: &Mutex<Child>, hub: &EventHub) {
    let mut decoder = FrameDecoder::new();
    let mut chunk = vec![0u8; READ_CHUNK];

    'read: loop {
        let n = match stdout.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!(channel = name, error = %e, "read from process failed");
                break;
            }
        };
        decoder.extend(&chunk[..n]);

        loop {
            let event = match decoder.next_message() {
                Ok(Some(message)) => Message::new(
                    PROCESS_MESSAGE,
                    vec![
                        Value::from(name),
                        Value::from(message.name()),
                        Value::Seq(message.values().to_vec()),
                    ],
                ),
                Ok(None) => break,
                Err(e) => {
                    warn!(channel = name, error = %e, "dropping malformed frame");
                    Message::new(PROCESS_ERROR, vec![Value::from(name), Value::Str(e.to_string())])
                }
            };
            if hub.publish(event).is_err() {
                break 'read;
            }
        }
    }

    let code = wait_for_exit(child);
    debug!(channel = name, code, "process exited");
    let _ = hub.publish(Message::new(
        PROCESS_EXIT,
        vec![Value::from(name), Value::Int(i64::from(code))],
    ));
}

/// Poll without holding the lock across a blocking `wait`, so `kill` stays
/// usable while the child lingers after closing stdout.
fn wait_for_exit(child: &Mutex<Child>) -> i32 {
    loop {
        match child.lock().try_wait() {
            Ok(Some(status)) => return status.code().unwrap_or(-1),
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "waiting for process failed");
                return -1;
            }
        }
        thread::sleep(Duration::from_millis(5));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{Flow, Runtime, RuntimeConfig};
    use crate::event::SourceKind;
    use crossbeam_channel::{unbounded, Receiver, Sender};

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn setup() -> (Runtime, EventHub, Receiver<Message>) {
        let rt = Runtime::with_config(RuntimeConfig {
            workers: 2,
            shutdown_on_root_exit: false,
            ..RuntimeConfig::default()
        })
        .unwrap();
        let hub = EventHub::spawn(&rt.handle()).unwrap();
        let (tx, rx) = unbounded();
        let sub = rt
            .spawn(move |_ctx| Ok(tx), |tx: &mut Sender<Message>, _ctx, message| {
                let _ = tx.send(message);
                Ok(Flow::Continue)
            })
            .unwrap();
        hub.subscribe(SourceKind::Process, sub).unwrap();
        thread::sleep(Duration::from_millis(20));
        (rt, hub, rx)
    }

    #[test]
    fn test_echo_through_cat() {
        let (_rt, hub, rx) = setup();
        let channel = ProcessChannel::spawn("echo", &mut Command::new("cat"), hub).unwrap();

        channel.send(&crate::message!("search.query", "needle", 3)).unwrap();
        let event = rx.recv_timeout(TIMEOUT).unwrap();
        let (name, inner) = ProcessChannel::unwrap_message(&event).unwrap();
        assert_eq!(name, "echo");
        assert_eq!(inner, crate::message!("search.query", "needle", 3));

        channel.close_stdin();
        let exit = rx.recv_timeout(TIMEOUT).unwrap();
        assert!(exit.is(PROCESS_EXIT));
        assert_eq!(exit.int_arg(1), Some(0));
        assert!(matches!(
            channel.send(&Message::signal("late")),
            Err(EventError::Closed(_))
        ));
        channel.join();
    }

    #[test]
    fn test_malformed_frame_reports_error() {
        let (_rt, hub, rx) = setup();
        // Frame of two bytes holding an unknown tag.
        let mut command = Command::new("sh");
        command.args(["-c", r"printf '\000\000\000\002\377\377'"]);
        let channel = ProcessChannel::spawn("bad", &mut command, hub).unwrap();

        let error = rx.recv_timeout(TIMEOUT).unwrap();
        assert!(error.is(PROCESS_ERROR));
        assert_eq!(error.str_arg(0), Some("bad"));
        let exit = rx.recv_timeout(TIMEOUT).unwrap();
        assert!(exit.is(PROCESS_EXIT));
        channel.join();
    }

    #[test]
    fn test_kill_publishes_exit() {
        let (_rt, hub, rx) = setup();
        let mut command = Command::new("sleep");
        command.arg("30");
        let channel = ProcessChannel::spawn("sleeper", &mut command, hub).unwrap();
        channel.kill().unwrap();
        let exit = rx.recv_timeout(TIMEOUT).unwrap();
        assert!(exit.is(PROCESS_EXIT));
        assert_eq!(exit.int_arg(1), Some(-1));
        channel.join();
    }
}
