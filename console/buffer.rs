//! Ordered output line buffer drained into command replies.

/// Accumulates every line a command (or the dashboard) produces.
///
/// Owned exclusively by the console session; alerts never pass through it,
/// so an alert can cross an in-flight command without corrupting its reply.
#[derive(Debug, Default)]
pub struct OutputBuffer {
    lines: Vec<String>,
}

impl OutputBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Appends one output line.
    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    /// Appends an error line; errors are reply text, never wire errors.
    pub fn push_error(&mut self, message: impl std::fmt::Display) {
        self.lines.push(format!("ERROR: {message}"));
    }

    /// Whether nothing has been captured since the last drain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Discards any captured lines.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Atomically yields the joined text and clears the buffer.
    pub fn drain(&mut self) -> String {
        let text = self.lines.join("\n");
        self.lines.clear();
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_joins_and_clears() {
        let mut buffer = OutputBuffer::new();
        buffer.push("line one");
        buffer.push_error("bad input");
        assert_eq!(buffer.drain(), "line one\nERROR: bad input");
        assert!(buffer.is_empty());
        assert_eq!(buffer.drain(), "");
    }
}
