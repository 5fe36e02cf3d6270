//! Terminal shell: raw-mode session and status-line output.

mod output;
mod session;

pub use output::OutputBuffer;
pub use session::{SessionConfig, TerminalSession};
