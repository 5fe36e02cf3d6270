//! Raw-mode terminal session, restored on drop.

use crossterm::{
    cursor, execute,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use std::io;

/// How the terminal is set up.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Whether to use alternate screen buffer.
    pub alternate_screen: bool,
    /// Whether to report bracketed pastes as `input.paste`.
    pub bracketed_paste: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            alternate_screen: true,
            bracketed_paste: true,
        }
    }
}

/// Guard owning the terminal's raw mode.
pub struct TerminalSession {
    config: SessionConfig,
    width: u16,
    height: u16,
}

impl TerminalSession {
    /// Enter raw mode with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if terminal setup fails.
    pub fn enter() -> io::Result<Self> {
        Self::with_config(SessionConfig::default())
    }

    /// Enter raw mode.
    ///
    /// # Errors
    ///
    /// Returns an error if terminal setup fails; the terminal is restored
    /// before returning.
    pub fn with_config(config: SessionConfig) -> io::Result<Self> {
        let (width, height) = terminal::size()?;
        terminal::enable_raw_mode()?;
        // From here on, Drop undoes whatever succeeded.
        let session = Self {
            config,
            width,
            height,
        };

        let mut stdout = io::stdout();
        if session.config.alternate_screen {
            execute!(stdout, EnterAlternateScreen)?;
        }
        if session.config.bracketed_paste {
            execute!(stdout, crossterm::event::EnableBracketedPaste)?;
        }
        execute!(stdout, cursor::Hide)?;
        Ok(session)
    }

    /// Terminal size when the session started.
    pub const fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        let mut stdout = io::stdout();
        let _ = execute!(stdout, cursor::Show);
        if self.config.bracketed_paste {
            let _ = execute!(stdout, crossterm::event::DisableBracketedPaste);
        }
        if self.config.alternate_screen {
            let _ = execute!(stdout, LeaveAlternateScreen);
        }
        let _ = terminal::disable_raw_mode();
    }
}
