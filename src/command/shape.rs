//! Declared argument shapes, checked before any handler runs.

use super::CommandError;
use crate::message::{Value, ValueKind};
use std::fmt;

/// Accepted kind of one positional argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgKind {
    /// Anything.
    Any,
    /// [`Value::Bool`].
    Bool,
    /// [`Value::Int`].
    Int,
    /// [`Value::Float`].
    Float,
    /// [`Value::Int`] or [`Value::Float`].
    Number,
    /// [`Value::Str`].
    Str,
    /// [`Value::Bytes`].
    Bytes,
    /// [`Value::Seq`].
    Seq,
    /// [`Value::Map`].
    Map,
}

impl ArgKind {
    /// Whether `value` satisfies this kind.
    pub const fn accepts(self, value: &Value) -> bool {
        match self {
            Self::Any => true,
            Self::Bool => matches!(value, Value::Bool(_)),
            Self::Int => matches!(value, Value::Int(_)),
            Self::Float => matches!(value, Value::Float(_)),
            Self::Number => matches!(value, Value::Int(_) | Value::Float(_)),
            Self::Str => matches!(value, Value::Str(_)),
            Self::Bytes => matches!(value, Value::Bytes(_)),
            Self::Seq => matches!(value, Value::Seq(_)),
            Self::Map => matches!(value, Value::Map(_)),
        }
    }

    /// Lowercase name, as used in error messages.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Number => "number",
            Self::Str => "str",
            Self::Bytes => "bytes",
            Self::Seq => "seq",
            Self::Map => "map",
        }
    }
}

impl fmt::Display for ArgKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<ValueKind> for ArgKind {
    fn from(kind: ValueKind) -> Self {
        match kind {
            ValueKind::Bool => Self::Bool,
            ValueKind::Int => Self::Int,
            ValueKind::Float => Self::Float,
            ValueKind::Bytes => Self::Bytes,
            ValueKind::Str => Self::Str,
            ValueKind::Seq => Self::Seq,
            ValueKind::Map => Self::Map,
        }
    }
}

/// Argument count bounds plus per-position kind hints.
///
/// `kinds[i]` constrains argument `i`; arguments past the end of `kinds`
/// are unconstrained.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ArgShape {
    /// Minimum number of arguments.
    pub min: usize,
    /// Maximum number of arguments, `None` for unbounded.
    pub max: Option<usize>,
    /// Kind hints by position.
    pub kinds: Vec<ArgKind>,
}

impl ArgShape {
    /// No arguments at all.
    pub const fn none() -> Self {
        Self {
            min: 0,
            max: Some(0),
            kinds: Vec::new(),
        }
    }

    /// Exactly `n` arguments of any kind.
    pub const fn exactly(n: usize) -> Self {
        Self::range(n, n)
    }

    /// Between `min` and `max` arguments, inclusive.
    pub const fn range(min: usize, max: usize) -> Self {
        Self {
            min,
            max: Some(max),
            kinds: Vec::new(),
        }
    }

    /// At least `min` arguments.
    pub const fn at_least(min: usize) -> Self {
        Self {
            min,
            max: None,
            kinds: Vec::new(),
        }
    }

    /// Exactly one argument per kind given.
    pub fn of(kinds: &[ArgKind]) -> Self {
        Self::exactly(kinds.len()).with_kinds(kinds)
    }

    /// Attach per-position kind hints.
    #[must_use]
    pub fn with_kinds(mut self, kinds: &[ArgKind]) -> Self {
        self.kinds = kinds.to_vec();
        self
    }

    /// Check `args` against the shape.
    ///
    /// # Errors
    ///
    /// [`CommandError::ArityMismatch`] or [`CommandError::ArgKindMismatch`],
    /// attributed to `command`.
    pub fn validate(&self, command: &str, args: &[Value]) -> Result<(), CommandError> {
        let got = args.len();
        if got < self.min || self.max.is_some_and(|max| got > max) {
            return Err(CommandError::ArityMismatch {
                command: command.to_string(),
                min: self.min,
                max: self.max,
                got,
            });
        }
        for (index, (kind, value)) in self.kinds.iter().zip(args).enumerate() {
            if !kind.accepts(value) {
                return Err(CommandError::ArgKindMismatch {
                    command: command.to_string(),
                    index,
                    expected: *kind,
                    got: value.kind(),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Display for ArgShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&arity(self.min, self.max))?;
        if !self.kinds.is_empty() {
            f.write_str(" (")?;
            for (i, kind) in self.kinds.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{kind}")?;
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}

/// Human-readable argument count: `2`, `0..=1`, `1+`.
pub(crate) fn arity(min: usize, max: Option<usize>) -> String {
    match max {
        Some(max) if max == min => min.to_string(),
        Some(max) => format!("{min}..={max}"),
        None => format!("{min}+"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity_bounds() {
        let shape = ArgShape::range(1, 2);
        assert!(shape.validate("c", &[Value::Int(1)]).is_ok());
        assert!(shape.validate("c", &[Value::Int(1), Value::Int(2)]).is_ok());
        assert!(matches!(
            shape.validate("c", &[]),
            Err(CommandError::ArityMismatch { got: 0, .. })
        ));
        assert!(matches!(
            shape.validate("c", &[Value::Int(1), Value::Int(2), Value::Int(3)]),
            Err(CommandError::ArityMismatch { got: 3, .. })
        ));
        assert!(ArgShape::at_least(0)
            .validate("c", &vec![Value::Bool(true); 50])
            .is_ok());
    }

    #[test]
    fn test_kind_mismatch_reports_position() {
        let shape = ArgShape::of(&[ArgKind::Str, ArgKind::Number]);
        assert!(shape
            .validate("goto", &[Value::from("a.rs"), Value::Float(1.5)])
            .is_ok());
        let err = shape
            .validate("goto", &[Value::from("a.rs"), Value::from("x")])
            .unwrap_err();
        assert_eq!(
            err,
            CommandError::ArgKindMismatch {
                command: "goto".to_string(),
                index: 1,
                expected: ArgKind::Number,
                got: ValueKind::Str,
            }
        );
    }

    #[test]
    fn test_unhinted_positions_accept_anything() {
        let shape = ArgShape::at_least(1).with_kinds(&[ArgKind::Int]);
        assert!(shape
            .validate("c", &[Value::Int(1), Value::from("s"), Value::Bool(false)])
            .is_ok());
    }

    #[test]
    fn test_display() {
        assert_eq!(ArgShape::none().to_string(), "0");
        assert_eq!(ArgShape::at_least(1).to_string(), "1+");
        assert_eq!(
            ArgShape::of(&[ArgKind::Str, ArgKind::Int]).to_string(),
            "2 (str, int)"
        );
    }
}
