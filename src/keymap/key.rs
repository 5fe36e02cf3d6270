//! Key presses and chords, with the textual syntax used in config files.
//!
//! ```text
//! key     := (modifier "+")* name
//! chord   := key (" " key)*
//!
//! ctrl+k          ctrl+shift+tab      alt+x
//! f5              esc                 ctrl+k ctrl+k
//! ```
//!
//! For character keys the terminal already reports the shifted character,
//! so `shift+a` and `A` are the same key. `shift+tab` is `backtab`.

use super::KeymapError;
use bitflags::bitflags;
use std::fmt;
use std::str::FromStr;
use unicode_segmentation::UnicodeSegmentation;

/// Key codes for keyboard input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// A printable character.
    Char(char),
    /// Function key (F1-F24).
    F(u8),
    /// Backspace key.
    Backspace,
    /// Enter/Return key.
    Enter,
    /// Left arrow.
    Left,
    /// Right arrow.
    Right,
    /// Up arrow.
    Up,
    /// Down arrow.
    Down,
    /// Home key.
    Home,
    /// End key.
    End,
    /// Page Up.
    PageUp,
    /// Page Down.
    PageDown,
    /// Tab key.
    Tab,
    /// Backtab (Shift+Tab).
    BackTab,
    /// Delete key.
    Delete,
    /// Insert key.
    Insert,
    /// Escape key.
    Esc,
}

const NAMED: &[(&str, KeyCode)] = &[
    ("esc", KeyCode::Esc),
    ("escape", KeyCode::Esc),
    ("enter", KeyCode::Enter),
    ("return", KeyCode::Enter),
    ("tab", KeyCode::Tab),
    ("backtab", KeyCode::BackTab),
    ("backspace", KeyCode::Backspace),
    ("bs", KeyCode::Backspace),
    ("delete", KeyCode::Delete),
    ("del", KeyCode::Delete),
    ("insert", KeyCode::Insert),
    ("ins", KeyCode::Insert),
    ("home", KeyCode::Home),
    ("end", KeyCode::End),
    ("pageup", KeyCode::PageUp),
    ("pgup", KeyCode::PageUp),
    ("pagedown", KeyCode::PageDown),
    ("pgdn", KeyCode::PageDown),
    ("up", KeyCode::Up),
    ("down", KeyCode::Down),
    ("left", KeyCode::Left),
    ("right", KeyCode::Right),
    ("space", KeyCode::Char(' ')),
];

impl KeyCode {
    fn parse(name: &str) -> Result<Self, KeymapError> {
        let lower = name.to_ascii_lowercase();
        if let Some((_, code)) = NAMED.iter().find(|(n, _)| *n == lower) {
            return Ok(*code);
        }
        if let Some(n) = lower.strip_prefix('f').and_then(|n| n.parse::<u8>().ok()) {
            if (1..=24).contains(&n) {
                return Ok(Self::F(n));
            }
        }

        let mut graphemes = name.graphemes(true);
        let (Some(grapheme), None) = (graphemes.next(), graphemes.next()) else {
            return Err(KeymapError::UnknownKey(name.to_string()));
        };
        let mut chars = grapheme.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if !c.is_whitespace() => Ok(Self::Char(c)),
            // Combining sequences cannot be reported as one key press.
            _ => Err(KeymapError::UnknownKey(name.to_string())),
        }
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Char(' ') => f.write_str("space"),
            Self::Char(c) => write!(f, "{c}"),
            Self::F(n) => write!(f, "f{n}"),
            Self::BackTab => f.write_str("tab"),
            other => {
                let name = NAMED
                    .iter()
                    .find(|(_, code)| code == other)
                    .map_or("?", |(name, _)| *name);
                f.write_str(name)
            }
        }
    }
}

bitflags! {
    /// Key modifiers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        /// Shift key held.
        const SHIFT = 0b0001;
        /// Control key held.
        const CONTROL = 0b0010;
        /// Alt/Option key held.
        const ALT = 0b0100;
        /// Super/Command/Windows key held.
        const SUPER = 0b1000;
    }
}

impl Modifiers {
    fn parse(name: &str) -> Result<Self, KeymapError> {
        Ok(match name.to_ascii_lowercase().as_str() {
            "ctrl" | "control" | "c" => Self::CONTROL,
            "alt" | "meta" | "opt" | "option" | "m" => Self::ALT,
            "shift" | "s" => Self::SHIFT,
            "super" | "cmd" | "win" => Self::SUPER,
            _ => return Err(KeymapError::UnknownModifier(name.to_string())),
        })
    }
}

/// One key press: a code plus the modifiers held.
///
/// Always normalized (see the module docs), so two presses that a terminal
/// cannot tell apart compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyPress {
    code: KeyCode,
    modifiers: Modifiers,
}

impl KeyPress {
    /// Build and normalize a key press.
    pub fn new(code: KeyCode, modifiers: Modifiers) -> Self {
        let mut key = Self { code, modifiers };
        match key.code {
            KeyCode::Char(_) | KeyCode::BackTab => key.modifiers.remove(Modifiers::SHIFT),
            KeyCode::Tab if key.modifiers.contains(Modifiers::SHIFT) => {
                key.code = KeyCode::BackTab;
                key.modifiers.remove(Modifiers::SHIFT);
            }
            _ => {}
        }
        if let KeyCode::Char(c) = key.code {
            // `shift+a` names the same press as `A`.
            if modifiers.contains(Modifiers::SHIFT) && c.is_lowercase() {
                key.code = KeyCode::Char(c.to_uppercase().next().unwrap_or(c));
            }
        }
        key
    }

    /// A press without modifiers.
    pub fn plain(code: KeyCode) -> Self {
        Self::new(code, Modifiers::empty())
    }

    /// `ctrl+<c>`.
    pub fn ctrl(c: char) -> Self {
        Self::new(KeyCode::Char(c), Modifiers::CONTROL)
    }

    /// The key code.
    pub const fn code(&self) -> KeyCode {
        self.code
    }

    /// The modifiers.
    pub const fn modifiers(&self) -> Modifiers {
        self.modifiers
    }
}

impl FromStr for KeyPress {
    type Err = KeymapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(KeymapError::EmptyChord);
        }
        // A trailing `+` after a separator is the plus key itself.
        let (mods, key) = if s == "+" {
            ("", "+")
        } else if let Some(mods) = s.strip_suffix("++") {
            (mods, "+")
        } else {
            s.rsplit_once('+').unwrap_or(("", s))
        };

        let mut modifiers = Modifiers::empty();
        for name in mods.split('+').filter(|m| !m.is_empty()) {
            modifiers |= Modifiers::parse(name.trim())?;
        }
        Ok(Self::new(KeyCode::parse(key.trim())?, modifiers))
    }
}

impl fmt::Display for KeyPress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifiers.contains(Modifiers::CONTROL) {
            f.write_str("ctrl+")?;
        }
        if self.modifiers.contains(Modifiers::ALT) {
            f.write_str("alt+")?;
        }
        if self.modifiers.contains(Modifiers::SUPER) {
            f.write_str("super+")?;
        }
        if self.modifiers.contains(Modifiers::SHIFT) || self.code == KeyCode::BackTab {
            f.write_str("shift+")?;
        }
        write!(f, "{}", self.code)
    }
}

/// An ordered sequence of key presses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Chord(Vec<KeyPress>);

impl Chord {
    /// A chord of the given presses.
    pub fn new(keys: Vec<KeyPress>) -> Self {
        Self(keys)
    }

    /// The presses in order.
    pub fn keys(&self) -> &[KeyPress] {
        &self.0
    }

    /// Number of presses.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the chord has no presses.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append a press.
    pub fn push(&mut self, key: KeyPress) {
        self.0.push(key);
    }

    /// Whether `prefix` is a strict prefix of this chord.
    pub fn extends(&self, prefix: &Self) -> bool {
        self.0.len() > prefix.0.len() && self.0.starts_with(&prefix.0)
    }
}

impl From<KeyPress> for Chord {
    fn from(key: KeyPress) -> Self {
        Self(vec![key])
    }
}

impl FromStr for Chord {
    type Err = KeymapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let keys = s
            .split_whitespace()
            .map(str::parse)
            .collect::<Result<Vec<KeyPress>, _>>()?;
        if keys.is_empty() {
            return Err(KeymapError::EmptyChord);
        }
        Ok(Self(keys))
    }
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, key) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{key}")?;
        }
        Ok(())
    }
}
