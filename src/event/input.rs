//! Input source: dedicated thread polling terminal events.
//!
//! Runs crossterm's event polling on its own thread and publishes every
//! event to the hub, so no worker ever blocks on the terminal.

use super::{EventError, EventHub};
use crate::keymap::{KeyCode, KeyPress, Modifiers};
use crate::message::{Message, Value};
use crossterm::event::{self, Event, KeyEventKind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// `input.key(key)`, where `key` is the [`KeyPress`] in config syntax.
pub const KEY: &str = "input.key";
/// `input.resize(width, height)`.
pub const RESIZE: &str = "input.resize";
/// `input.paste(text)`.
pub const PASTE: &str = "input.paste";
/// `input.focus(gained)`.
pub const FOCUS: &str = "input.focus";

/// Input source that polls terminal events.
pub struct InputSource {
    /// Handle to the input thread.
    handle: Option<JoinHandle<()>>,
    /// Flag to signal shutdown.
    shutdown: Arc<AtomicBool>,
}

impl InputSource {
    /// Spawn the input thread.
    ///
    /// `poll_timeout` bounds how long a shutdown request can go unnoticed.
    ///
    /// # Errors
    ///
    /// [`EventError::Io`] if the thread cannot be spawned.
    pub fn spawn(hub: EventHub, poll_timeout: Duration) -> Result<Self, EventError> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = Arc::clone(&shutdown);

        let handle = thread::Builder::new()
            .name("keel-input".to_string())
            .spawn(move || Self::run_loop(&hub, &shutdown_clone, poll_timeout))?;

        Ok(Self {
            handle: Some(handle),
            shutdown,
        })
    }

    /// Signal the input thread to shutdown.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Wait for the input thread to finish.
    pub fn join(mut self) {
        self.shutdown();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    fn run_loop(hub: &EventHub, shutdown: &AtomicBool, poll_timeout: Duration) {
        while !shutdown.load(Ordering::Relaxed) {
            match event::poll(poll_timeout) {
                Ok(true) => match event::read() {
                    Ok(event) => {
                        let Some(message) = convert_event(event) else {
                            continue;
                        };
                        if hub.publish(message).is_err() {
                            // Hub gone: nobody is listening any more.
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "failed to read terminal event"),
                },
                Ok(false) => {}
                Err(e) => {
                    warn!(error = %e, "terminal polling failed");
                    break;
                }
            }
        }
        debug!("input source stopped");
    }
}

impl Drop for InputSource {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Convert a crossterm event to an `input.*` message.
pub(crate) fn convert_event(event: Event) -> Option<Message> {
    match event {
        Event::Key(key_event) => {
            // Only key presses (also reported as release/repeat with the
            // kitty protocol).
            if key_event.kind != KeyEventKind::Press {
                return None;
            }
            let key = convert_key(key_event.code, key_event.modifiers)?;
            Some(Message::new(KEY, vec![Value::Str(key.to_string())]))
        }
        Event::Resize(width, height) => Some(Message::new(
            RESIZE,
            vec![Value::from(width), Value::from(height)],
        )),
        Event::FocusGained => Some(Message::new(FOCUS, vec![Value::Bool(true)])),
        Event::FocusLost => Some(Message::new(FOCUS, vec![Value::Bool(false)])),
        Event::Paste(text) => Some(Message::new(PASTE, vec![Value::Str(text)])),
        Event::Mouse(_) => None,
    }
}

/// Convert a crossterm key code plus modifiers to a [`KeyPress`].
pub(crate) fn convert_key(code: event::KeyCode, mods: event::KeyModifiers) -> Option<KeyPress> {
    let code = match code {
        event::KeyCode::Char(c) => KeyCode::Char(c),
        event::KeyCode::F(n) => KeyCode::F(n),
        event::KeyCode::Backspace => KeyCode::Backspace,
        event::KeyCode::Enter => KeyCode::Enter,
        event::KeyCode::Left => KeyCode::Left,
        event::KeyCode::Right => KeyCode::Right,
        event::KeyCode::Up => KeyCode::Up,
        event::KeyCode::Down => KeyCode::Down,
        event::KeyCode::Home => KeyCode::Home,
        event::KeyCode::End => KeyCode::End,
        event::KeyCode::PageUp => KeyCode::PageUp,
        event::KeyCode::PageDown => KeyCode::PageDown,
        event::KeyCode::Tab => KeyCode::Tab,
        event::KeyCode::BackTab => KeyCode::BackTab,
        event::KeyCode::Delete => KeyCode::Delete,
        event::KeyCode::Insert => KeyCode::Insert,
        event::KeyCode::Esc => KeyCode::Esc,
        _ => return None, // Ignore other key codes
    };

    let mut modifiers = Modifiers::empty();
    modifiers.set(Modifiers::SHIFT, mods.contains(event::KeyModifiers::SHIFT));
    modifiers.set(Modifiers::CONTROL, mods.contains(event::KeyModifiers::CONTROL));
    modifiers.set(Modifiers::ALT, mods.contains(event::KeyModifiers::ALT));
    modifiers.set(Modifiers::SUPER, mods.contains(event::KeyModifiers::SUPER));
    Some(KeyPress::new(code, modifiers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEvent, KeyEventState, KeyModifiers};

    fn press(code: event::KeyCode, modifiers: KeyModifiers) -> Event {
        Event::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        })
    }

    #[test]
    fn test_key_events_use_config_syntax() {
        let m = convert_event(press(event::KeyCode::Char('k'), KeyModifiers::CONTROL)).unwrap();
        assert!(m.is(KEY));
        assert_eq!(m.str_arg(0), Some("ctrl+k"));

        let m = convert_event(press(
            event::KeyCode::BackTab,
            KeyModifiers::SHIFT | KeyModifiers::CONTROL,
        ))
        .unwrap();
        assert_eq!(m.str_arg(0), Some("ctrl+shift+tab"));
        assert_eq!(
            m.str_arg(0).unwrap().parse::<KeyPress>().unwrap(),
            KeyPress::new(KeyCode::BackTab, Modifiers::CONTROL)
        );
    }

    #[test]
    fn test_releases_are_ignored() {
        let release = Event::Key(KeyEvent {
            code: event::KeyCode::Char('a'),
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Release,
            state: KeyEventState::NONE,
        });
        assert!(convert_event(release).is_none());
    }

    #[test]
    fn test_other_events() {
        let m = convert_event(Event::Resize(80, 24)).unwrap();
        assert!(m.is(RESIZE));
        assert_eq!((m.int_arg(0), m.int_arg(1)), (Some(80), Some(24)));
        assert_eq!(
            convert_event(Event::FocusLost).unwrap().arg(0),
            Some(&Value::Bool(false))
        );
        let m = convert_event(Event::Paste("hello".into())).unwrap();
        assert_eq!(m.str_arg(0), Some("hello"));
    }
}
