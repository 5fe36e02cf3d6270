//! `OutputBuffer`: one-syscall output for the status line.

use std::fmt::Write as _;
use std::io::Write;
use unicode_segmentation::UnicodeSegmentation;

/// Pre-allocated buffer for building ANSI escape sequences.
///
/// A whole status line is accumulated here, then flushed in a single
/// `write()` so the terminal never shows a half-drawn line.
pub struct OutputBuffer {
    data: String,
}

impl OutputBuffer {
    /// Create a new output buffer with the given capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: String::with_capacity(capacity),
        }
    }

    /// A buffer sized for a few status lines.
    pub fn new() -> Self {
        Self::with_capacity(512)
    }

    /// Clear the buffer for reuse.
    #[inline]
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Get the buffer contents.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.data
    }

    /// Check if buffer is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Move cursor to (x, y) position (0-indexed; ANSI is 1-indexed).
    #[inline]
    pub fn cursor_move(&mut self, x: u16, y: u16) {
        // CSI row ; col H
        let _ = write!(
            self.data,
            "\x1b[{};{}H",
            u32::from(y) + 1,
            u32::from(x) + 1
        );
    }

    /// Erase the line under the cursor.
    #[inline]
    pub fn clear_line(&mut self) {
        self.data.push_str("\x1b[2K");
    }

    /// Swap foreground and background.
    #[inline]
    pub fn reverse(&mut self) {
        self.data.push_str("\x1b[7m");
    }

    /// Reset all attributes.
    #[inline]
    pub fn reset_attrs(&mut self) {
        self.data.push_str("\x1b[0m");
    }

    /// Write at most `width` graphemes of `text`, returning how many were
    /// written. Control characters are dropped.
    pub fn write_clipped(&mut self, text: &str, width: usize) -> usize {
        let mut written = 0;
        for grapheme in text.graphemes(true) {
            if written == width {
                break;
            }
            if grapheme.chars().any(char::is_control) {
                continue;
            }
            self.data.push_str(grapheme);
            written += 1;
        }
        written
    }

    /// Pad with spaces.
    pub fn pad(&mut self, count: usize) {
        self.data.extend(std::iter::repeat(' ').take(count));
    }

    /// Flush to a writer in a single syscall.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying writer fails.
    pub fn flush_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(self.data.as_bytes())?;
        writer.flush()
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clipping_counts_graphemes() {
        let mut out = OutputBuffer::new();
        assert_eq!(out.write_clipped("e\u{301}tude", 3), 3);
        assert_eq!(out.as_str(), "e\u{301}tu");

        out.clear();
        assert_eq!(out.write_clipped("a\tb\x1b[2Jc", 10), 6);
        assert_eq!(out.as_str(), "ab[2Jc");
    }

    #[test]
    fn test_escape_sequences() {
        let mut out = OutputBuffer::new();
        out.cursor_move(0, 23);
        out.clear_line();
        out.reverse();
        out.reset_attrs();
        assert_eq!(out.as_str(), "\x1b[24;1H\x1b[2K\x1b[7m\x1b[0m");

        let mut sink = Vec::new();
        out.flush_to(&mut sink).unwrap();
        assert_eq!(sink, out.as_str().as_bytes());
    }
}
