use thiserror::Error;

/// Errors building a key table or parsing key syntax.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeymapError {
    /// A key name that is neither a named key nor a single character.
    #[error("unknown key: {0:?}")]
    UnknownKey(String),

    /// A modifier other than ctrl, alt, shift or super.
    #[error("unknown modifier: {0:?}")]
    UnknownModifier(String),

    /// A chord with no keys.
    #[error("empty key chord")]
    EmptyChord,

    /// A mode was referenced but never declared.
    #[error("unknown mode: {0}")]
    UnknownMode(String),

    /// A mode was declared twice.
    #[error("mode declared twice: {0}")]
    DuplicateMode(String),

    /// A mode names a parent that does not exist.
    #[error("mode {mode} inherits from undeclared mode {parent}")]
    DanglingParent {
        /// The child mode.
        mode: String,
        /// The missing parent.
        parent: String,
    },

    /// Mode inheritance loops back on itself.
    #[error("mode inheritance cycle: {}", .0.join(" -> "))]
    InheritanceCycle(Vec<String>),
}
