//! Command result type.

use crate::error::ShellChannelError;
use crate::Result;

/// The accepted output lines of one command, in order.
///
/// Blank lines, the shell's echo of the command and protocol markers are
/// never part of a result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResult {
    lines: Vec<String>,
}

impl CommandResult {
    /// Create a result from accepted lines.
    pub fn new(lines: Vec<String>) -> Self {
        Self { lines }
    }

    /// The accepted lines.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Take the accepted lines.
    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }

    /// The only line of the result.
    ///
    /// # Errors
    ///
    /// Returns [`ShellChannelError::UnexpectedLineCount`] unless the result
    /// holds exactly one line.
    pub fn single_line(&self) -> Result<&str> {
        match self.lines.as_slice() {
            [line] => Ok(line),
            lines => Err(ShellChannelError::UnexpectedLineCount(lines.len())),
        }
    }

    /// The first line, if any.
    pub fn first_line(&self) -> Option<&str> {
        self.lines.first().map(String::as_str)
    }

    /// Number of accepted lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Check if no line was accepted.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl IntoIterator for CommandResult {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.into_iter()
    }
}
