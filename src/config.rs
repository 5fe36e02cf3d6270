//! TOML configuration file.
//!
//! Location: `~/.config/keel/config.toml`, or the path given with `--config`.
//! Every key is optional; an absent `[[modes]]` list falls back to the
//! builtin keymap.

use crate::keymap::{KeyTable, KeymapError, DEFAULT_CHORD_TIMEOUT};
use crate::message::Value;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors loading or applying the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The file is not valid TOML or has the wrong shape.
    #[error("invalid config {}: {source}", path.display())]
    Parse {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: toml::de::Error,
    },

    /// A binding could not be turned into a rule.
    #[error("mode {mode}, binding {keys:?}: {source}")]
    Binding {
        /// Mode holding the binding.
        mode: String,
        /// The binding's key string.
        keys: String,
        /// What was wrong with it.
        source: KeymapError,
    },

    /// The mode list is inconsistent.
    #[error(transparent)]
    Keymap(#[from] KeymapError),

    /// A value is out of range.
    #[error("{0}")]
    Invalid(String),
}

/// One `[[modes.bindings]]` entry.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct BindingEntry {
    /// Chord, e.g. `"ctrl+k ctrl+k"`.
    pub keys: String,
    /// Command name.
    pub command: String,
    /// Literal arguments passed to the command.
    #[serde(default)]
    pub args: Vec<toml::Value>,
}

/// One `[[modes]]` entry.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct ModeEntry {
    /// Mode name.
    pub name: String,
    /// Mode consulted when no rule here matches.
    #[serde(default)]
    pub parent: Option<String>,
    /// Rules in priority order.
    #[serde(default)]
    pub bindings: Vec<BindingEntry>,
}

/// User-facing config parsed from TOML.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Worker threads; the runtime default when absent.
    pub workers: Option<usize>,
    /// Milliseconds a partial chord waits for its next key.
    pub chord_timeout_ms: u64,
    /// Default log filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Log file; logging is off when absent.
    pub log_file: Option<PathBuf>,
    /// Mode the keymap starts in.
    pub initial_mode: String,
    /// Keybinding modes.
    pub modes: Vec<ModeEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: None,
            chord_timeout_ms: u64::try_from(DEFAULT_CHORD_TIMEOUT.as_millis()).unwrap_or(1000),
            log_level: "info".to_string(),
            log_file: None,
            initial_mode: "normal".to_string(),
            modes: default_modes(),
        }
    }
}

impl Config {
    /// `~/.config/keel/config.toml`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("keel").join("config.toml"))
    }

    /// Load `path`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`], [`ConfigError::Parse`], or
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load an explicit `path`, else the default file when it exists, else
    /// defaults.
    ///
    /// # Errors
    ///
    /// As [`Config::load`]; a missing explicit file is an error.
    pub fn discover(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == Some(0) {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        if self.chord_timeout_ms == 0 {
            return Err(ConfigError::Invalid("chord-timeout-ms must be positive".into()));
        }
        Ok(())
    }

    /// Partial chord timeout.
    pub const fn chord_timeout(&self) -> Duration {
        Duration::from_millis(self.chord_timeout_ms)
    }

    /// Build the keybinding table and check the initial mode exists.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Binding`] for an unparsable chord,
    /// [`ConfigError::Keymap`] for duplicate, dangling or cyclic modes.
    pub fn key_table(&self) -> Result<KeyTable, ConfigError> {
        let mut builder = KeyTable::builder();
        for mode in &self.modes {
            builder.mode(&mode.name, mode.parent.as_deref())?;
        }
        for mode in &self.modes {
            for binding in &mode.bindings {
                let args = binding.args.iter().map(toml_to_value).collect();
                builder
                    .bind(&mode.name, &binding.keys, &binding.command, args)
                    .map_err(|source| ConfigError::Binding {
                        mode: mode.name.clone(),
                        keys: binding.keys.clone(),
                        source,
                    })?;
            }
        }
        let table = builder.build()?;
        if !table.has_mode(&self.initial_mode) {
            return Err(KeymapError::UnknownMode(self.initial_mode.clone()).into());
        }
        Ok(table)
    }
}

/// TOML literal to message value. Datetimes become their RFC 3339 string.
pub fn toml_to_value(value: &toml::Value) -> Value {
    match value {
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Integer(i) => Value::Int(*i),
        toml::Value::Float(f) => Value::Float(*f),
        toml::Value::String(s) => Value::Str(s.clone()),
        toml::Value::Datetime(d) => Value::Str(d.to_string()),
        toml::Value::Array(items) => Value::Seq(items.iter().map(toml_to_value).collect()),
        toml::Value::Table(table) => Value::Map(
            table
                .iter()
                .map(|(k, v)| (Value::Str(k.clone()), toml_to_value(v)))
                .collect(),
        ),
    }
}

fn binding(keys: &str, command: &str, args: &[&str]) -> BindingEntry {
    BindingEntry {
        keys: keys.to_string(),
        command: command.to_string(),
        args: args.iter().map(|a| toml::Value::String((*a).to_string())).collect(),
    }
}

fn default_modes() -> Vec<ModeEntry> {
    vec![
        ModeEntry {
            name: "normal".to_string(),
            parent: None,
            bindings: vec![
                binding("ctrl+q", "quit", &[]),
                binding("i", "set_mode", &["edit"]),
                binding("ctrl+x ctrl+s", "status", &["nothing to save"]),
            ],
        },
        ModeEntry {
            name: "edit".to_string(),
            parent: Some("normal".to_string()),
            bindings: vec![binding("esc", "set_mode", &["normal"])],
        },
    ]
}
