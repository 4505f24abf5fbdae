//! Error types for shell-channel.

use std::time::Duration;

use thiserror::Error;

/// Main error type for shell-channel operations.
#[derive(Error, Debug)]
pub enum ShellChannelError {
    /// No line terminator arrived within the read ceiling.
    ///
    /// The shell's stdin and stdout are no longer in lockstep; the current
    /// command is lost and the shell should be treated as unusable.
    #[error("couldn't find new line after {reads} reads")]
    ProtocolDesync { reads: usize },

    /// The channel was closed and cannot be used anymore.
    #[error("channel is closed and cannot be used anymore")]
    ChannelClosed,

    /// Log follow did not see its pattern before the timeout elapsed.
    #[error("no matching line within {0:?}")]
    FollowTimeout(Duration),

    /// A bulk removal was requested with no container ids.
    #[error("container ids must not be empty")]
    EmptyRemovalRequest,

    /// A single line was expected from a command result.
    #[error("expected a single line, but got {0} lines")]
    UnexpectedLineCount(usize),

    /// The shell process has not been started yet.
    #[error("cannot get pid of a shell that was never started")]
    ShellNotStarted,

    /// The shell process was already closed.
    #[error("shell is closed")]
    ShellClosed,

    /// The requested shell is not available on this host.
    #[error("shell not available: {0}")]
    ShellUnavailable(String),

    /// PTY-related error.
    #[error("PTY error: {0}")]
    Pty(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal lock was poisoned.
    #[error("internal lock poisoned")]
    LockPoisoned,

    /// A blocking task could not be joined.
    #[error("blocking task failed: {0}")]
    TaskFailed(String),
}

/// Convenience Result type for shell-channel operations.
pub type Result<T> = std::result::Result<T, ShellChannelError>;
