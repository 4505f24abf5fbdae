//! Lazily consumed command output, optionally followed live.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use shell_channel::{ChannelConfig, Command, CommandChannel, CommandKind, LookFor};
//!
//! # fn main() -> shell_channel::Result<()> {
//! let channel = CommandChannel::new(ChannelConfig::default());
//! let logs = Command::new(CommandKind::Logs, ["docker", "logs", "-f", "db"]);
//! let lines = channel
//!     .logs(logs)
//!     .follow()
//!     .look_for(LookFor::word("ready to accept connections").with_timeout(Duration::from_secs(30)))
//!     .collect_lines()?;
//! println!("{}", lines.join("\n"));
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::channel::{ChannelCore, CLEAR_MARKER};
use crate::error::ShellChannelError;
use crate::execution::{Command, CommandKind, LinePredicate};
use crate::shell::Shell;
use crate::Result;

/// Line that ends a followed output stream.
#[derive(Clone)]
pub struct LookFor {
    predicate: LinePredicate,
    timeout: Option<Duration>,
    description: String,
}

impl LookFor {
    /// Match lines containing `text`.
    pub fn word(text: impl Into<String>) -> Self {
        let text = text.into();
        let needle = text.clone();
        Self {
            predicate: Arc::new(move |line: &str| line.contains(&needle)),
            timeout: None,
            description: text,
        }
    }

    /// Match lines for which `predicate` returns true.
    pub fn matching<F>(predicate: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
            timeout: None,
            description: "<predicate>".to_string(),
        }
    }

    /// Fail with [`ShellChannelError::FollowTimeout`] when no line matches
    /// within `timeout`.
    ///
    /// Only streamed output is timed. A request that is not followed reads
    /// the complete output and never times out.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Check whether `line` is the one looked for.
    pub fn matches(&self, line: &str) -> bool {
        (self.predicate)(line)
    }
}

impl fmt::Debug for LookFor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LookFor")
            .field("pattern", &self.description)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Request for a command's output, built by
/// [`CommandChannel::logs`](crate::CommandChannel::logs).
///
/// Building it has no side effect.
pub struct LogFollow {
    core: Arc<ChannelCore>,
    command: Command,
    streaming: bool,
    look_for: Option<LookFor>,
}

impl LogFollow {
    pub(crate) fn new(core: Arc<ChannelCore>, command: Command) -> Self {
        let streaming = command.kind().is_streaming();
        Self {
            core,
            command,
            streaming,
            look_for: None,
        }
    }

    /// Read output live, line by line, instead of waiting for the command
    /// to finish.
    pub fn follow(mut self) -> Self {
        self.streaming = true;
        if self.command.kind() == CommandKind::Logs {
            self.command = self.command.with_kind(CommandKind::LogsFollow);
        }
        self
    }

    /// End the output at the first line matching `look_for`, inclusive.
    ///
    /// Without [`follow`](Self::follow) on a non-streaming kind, the output
    /// is cut at the match, all of it is returned when nothing matches, and
    /// the timeout of `look_for` is ignored.
    pub fn look_for(mut self, look_for: LookFor) -> Self {
        self.look_for = Some(look_for);
        self
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn command(&self) -> &Command {
        &self.command
    }

    /// Lazy, single-pass sequence of output lines.
    pub fn stream(self) -> LogStream {
        LogStream {
            core: self.core,
            command: self.command,
            streaming: self.streaming,
            look_for: self.look_for,
            started: false,
            done: false,
            buffered: VecDeque::new(),
            shell: None,
            deadline: None,
            registered: false,
        }
    }

    /// Consume the whole stream.
    pub fn collect_lines(self) -> Result<Vec<String>> {
        self.stream().collect()
    }
}

/// Output lines of a [`LogFollow`] request.
///
/// The command is sent on the first call to `next`. In streaming mode it
/// runs in a shell of its own, closed when the stream ends or is dropped.
pub struct LogStream {
    core: Arc<ChannelCore>,
    command: Command,
    streaming: bool,
    look_for: Option<LookFor>,
    started: bool,
    done: bool,
    buffered: VecDeque<String>,
    shell: Option<Box<dyn Shell>>,
    deadline: Option<Instant>,
    registered: bool,
}

impl LogStream {
    fn start(&mut self) -> Result<()> {
        if !self.streaming {
            let result = self.core.send(self.command.clone(), Ok)?;
            self.buffered = result.into_lines().into();
            return Ok(());
        }

        self.core.ensure_open()?;
        self.core.config().recorder.record(&self.command);

        let mut shell = self.core.start_dedicated_shell()?;
        debug!(caller = %self.command.caller(), "Following: {}", self.command.command_line());
        shell.clear_buffer(CLEAR_MARKER)?;
        shell.write_tokens(self.command.tokens())?;

        self.deadline = self
            .look_for
            .as_ref()
            .and_then(LookFor::timeout)
            .map(|timeout| Instant::now() + timeout);
        self.shell = Some(shell);
        Ok(())
    }

    fn next_live(&mut self) -> Option<Result<String>> {
        let shell = self.shell.as_mut()?;
        let echoed = self.command.command_line();

        loop {
            let line = match self.deadline {
                Some(deadline) => match shell.out_line_until(deadline) {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        let timeout = self
                            .look_for
                            .as_ref()
                            .and_then(LookFor::timeout)
                            .unwrap_or_default();
                        return Some(Err(ShellChannelError::FollowTimeout(timeout)));
                    }
                    Err(e) => return Some(Err(e)),
                },
                None => match shell.out_line() {
                    Ok(line) => line,
                    Err(e) => return Some(Err(e)),
                },
            };

            let text = line.value().trim();
            if text.is_empty() || text.ends_with(&echoed) {
                continue;
            }
            if !self.command.accepts(text) && !self.command.terminates_on(text) {
                trace!("Filtered: {}", text);
                continue;
            }
            return Some(Ok(text.to_string()));
        }
    }

    // Reads fail once close kills the shell; report the close instead.
    fn closed_or(&self, e: ShellChannelError) -> ShellChannelError {
        if self.core.is_closed() {
            ShellChannelError::ChannelClosed
        } else {
            e
        }
    }

    fn is_last(&self, line: &str) -> bool {
        self.command.terminates_on(line)
            || self
                .look_for
                .as_ref()
                .is_some_and(|look_for| look_for.matches(line))
    }

    fn finish(&mut self) {
        self.done = true;
        self.buffered.clear();
        if let Some(mut shell) = self.shell.take() {
            if let Err(e) = shell.close() {
                debug!(error = %e, "Failed to close follow shell");
            }
        }
    }
}

impl Iterator for LogStream {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if !self.started {
            self.started = true;
            if let Err(e) = self.start() {
                self.finish();
                return Some(Err(self.closed_or(e)));
            }
        }

        if self.streaming && self.core.is_closed() {
            self.finish();
            return Some(Err(ShellChannelError::ChannelClosed));
        }

        let item = if self.streaming {
            self.next_live().map(|item| item.map_err(|e| self.closed_or(e)))
        } else {
            self.buffered.pop_front().map(Ok)
        };

        match item {
            Some(Ok(line)) => {
                if self.streaming
                    && !self.registered
                    && self.command.kind() == CommandKind::RunFollow
                {
                    self.registered = true;
                    if let Err(e) = self.core.register_followed(&line) {
                        self.finish();
                        return Some(Err(e));
                    }
                }
                if self.is_last(&line) {
                    self.finish();
                }
                Some(Ok(line))
            }
            Some(Err(e)) => {
                self.finish();
                Some(Err(e))
            }
            None => {
                self.finish();
                None
            }
        }
    }
}

impl Drop for LogStream {
    fn drop(&mut self) {
        self.finish();
    }
}
