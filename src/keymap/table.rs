//! Mode-scoped, ordered keybinding rules with mode inheritance.

use super::{Chord, KeymapError};
use crate::message::Value;
use std::collections::HashMap;

/// `chord -> command + literal arguments`.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    /// Keys to press.
    pub chord: Chord,
    /// Command to dispatch.
    pub command: String,
    /// Literal arguments passed to the command.
    pub args: Vec<Value>,
}

#[derive(Debug, Clone)]
struct Mode {
    parent: Option<String>,
    rules: Vec<Rule>,
}

/// Outcome of looking a chord up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookup<'a> {
    /// A rule matches exactly.
    Exact {
        /// The matching rule.
        rule: &'a Rule,
        /// Mode the rule was declared in.
        mode: &'a str,
    },
    /// Some rule starts with the chord; more keys may complete it.
    Prefix,
    /// Nothing matches or can match.
    None,
}

/// Immutable keybinding table.
///
/// Built once by [`KeyTableBuilder`] and published by swapping the whole
/// table, so a lookup never sees a half-applied reload.
#[derive(Debug, Clone, Default)]
pub struct KeyTable {
    modes: HashMap<String, Mode>,
}

impl KeyTable {
    /// Start building a table.
    pub fn builder() -> KeyTableBuilder {
        KeyTableBuilder::default()
    }

    /// Whether `mode` is declared.
    pub fn has_mode(&self, mode: &str) -> bool {
        self.modes.contains_key(mode)
    }

    /// Declared mode names, sorted.
    pub fn modes(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.modes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Parent of `mode`, if it has one.
    pub fn parent(&self, mode: &str) -> Option<&str> {
        self.modes.get(mode)?.parent.as_deref()
    }

    /// Rules declared directly in `mode`, in declaration order.
    pub fn rules(&self, mode: &str) -> &[Rule] {
        self.modes.get(mode).map_or(&[], |m| m.rules.as_slice())
    }

    /// Resolve `chord` in `mode`.
    ///
    /// Each level is checked for an exact match first (earliest declared
    /// rule wins), then for a rule the chord is a strict prefix of. Only when
    /// a level has neither does the lookup move on to the parent mode, so a
    /// binding in a child mode shadows the parent's.
    pub fn lookup<'a>(&'a self, mode: &str, chord: &Chord) -> Lookup<'a> {
        let mut current = self.modes.get_key_value(mode);
        while let Some((name, level)) = current {
            if let Some(rule) = level.rules.iter().find(|rule| rule.chord == *chord) {
                return Lookup::Exact { rule, mode: name };
            }
            if level.rules.iter().any(|rule| rule.chord.extends(chord)) {
                return Lookup::Prefix;
            }
            current = level
                .parent
                .as_deref()
                .and_then(|parent| self.modes.get_key_value(parent));
        }
        Lookup::None
    }
}

/// Incremental construction of a [`KeyTable`].
#[derive(Debug, Default)]
pub struct KeyTableBuilder {
    order: Vec<String>,
    modes: HashMap<String, Mode>,
}

impl KeyTableBuilder {
    /// Declare a mode.
    ///
    /// # Errors
    ///
    /// [`KeymapError::DuplicateMode`] if `name` was already declared.
    pub fn mode(&mut self, name: &str, parent: Option<&str>) -> Result<&mut Self, KeymapError> {
        if self.modes.contains_key(name) {
            return Err(KeymapError::DuplicateMode(name.to_string()));
        }
        self.order.push(name.to_string());
        self.modes.insert(
            name.to_string(),
            Mode {
                parent: parent.map(str::to_string),
                rules: Vec::new(),
            },
        );
        Ok(self)
    }

    /// Append a rule to `mode`, parsing `keys` as a chord.
    ///
    /// # Errors
    ///
    /// [`KeymapError::UnknownMode`] or any chord syntax error.
    pub fn bind(
        &mut self,
        mode: &str,
        keys: &str,
        command: &str,
        args: Vec<Value>,
    ) -> Result<&mut Self, KeymapError> {
        let chord = keys.parse()?;
        self.rule(
            mode,
            Rule {
                chord,
                command: command.to_string(),
                args,
            },
        )
    }

    /// Append an already parsed rule to `mode`.
    ///
    /// # Errors
    ///
    /// [`KeymapError::UnknownMode`] if `mode` was not declared.
    pub fn rule(&mut self, mode: &str, rule: Rule) -> Result<&mut Self, KeymapError> {
        self.modes
            .get_mut(mode)
            .ok_or_else(|| KeymapError::UnknownMode(mode.to_string()))?
            .rules
            .push(rule);
        Ok(self)
    }

    /// Validate inheritance and freeze the table.
    ///
    /// # Errors
    ///
    /// [`KeymapError::DanglingParent`] or [`KeymapError::InheritanceCycle`].
    pub fn build(&mut self) -> Result<KeyTable, KeymapError> {
        for name in &self.order {
            let mut path = vec![name.clone()];
            let mut current = name;
            while let Some(parent) = self.modes.get(current).and_then(|m| m.parent.as_ref()) {
                if !self.modes.contains_key(parent) {
                    return Err(KeymapError::DanglingParent {
                        mode: current.clone(),
                        parent: parent.clone(),
                    });
                }
                if path.contains(parent) {
                    path.push(parent.clone());
                    return Err(KeymapError::InheritanceCycle(path));
                }
                path.push(parent.clone());
                current = parent;
            }
        }
        self.order.clear();
        Ok(KeyTable {
            modes: std::mem::take(&mut self.modes),
        })
    }
}
