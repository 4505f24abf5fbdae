//! Command representation.

use std::fmt;
use std::sync::Arc;

use crate::caller::CallerId;
use crate::error::ShellChannelError;
use crate::Result;

/// Predicate applied to a single trimmed output line.
pub type LinePredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// What a command does, as far as the channel is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Starts a container; its first output line is the new container id.
    Run,
    /// Starts a container attached to its output.
    RunFollow,
    /// Prints a container's logs and exits.
    Logs,
    /// Follows a container's logs until stopped.
    LogsFollow,
    /// Lists containers or images.
    List,
    /// Removes containers.
    Remove,
    /// Anything else.
    Generic,
}

impl CommandKind {
    /// Check whether commands of this kind create a container that must
    /// be registered for cleanup.
    pub fn creates_container(&self) -> bool {
        matches!(self, CommandKind::Run | CommandKind::RunFollow)
    }

    /// Check whether output of this kind is open-ended.
    pub fn is_streaming(&self) -> bool {
        matches!(self, CommandKind::RunFollow | CommandKind::LogsFollow)
    }
}

/// A command line to send through a [`CommandChannel`](crate::CommandChannel).
///
/// Commands are immutable once built and cheap to clone.
#[derive(Clone)]
pub struct Command {
    tokens: Vec<String>,
    kind: CommandKind,
    line_filter: LinePredicate,
    terminate_on: LinePredicate,
    caller: CallerId,
}

impl Command {
    /// Create a command of the given kind from argv-like tokens.
    pub fn new<I, T>(kind: CommandKind, tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
            kind,
            line_filter: Arc::new(|_| true),
            terminate_on: Arc::new(|_| false),
            caller: CallerId::root(),
        }
    }

    /// Create a [`CommandKind::Generic`] command.
    pub fn generic<I, T>(tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self::new(CommandKind::Generic, tokens)
    }

    /// Build the forced bulk removal of `ids`, volumes included.
    ///
    /// # Errors
    ///
    /// Returns [`ShellChannelError::EmptyRemovalRequest`] if `ids` is empty.
    pub fn remove_containers<I, T>(engine: &str, ids: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        if ids.is_empty() {
            return Err(ShellChannelError::EmptyRemovalRequest);
        }

        let tokens = [engine, "rm", "--force", "--volumes"]
            .into_iter()
            .map(String::from)
            .chain(ids);
        Ok(Self::new(CommandKind::Remove, tokens))
    }

    /// Only keep output lines matching `predicate`.
    pub fn accept_lines<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.line_filter = Arc::new(predicate);
        self
    }

    /// Stop reading as soon as a line matches `predicate`.
    ///
    /// The matching line is kept and the shell is closed, which makes this
    /// usable for commands whose output never ends.
    pub fn terminate_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.terminate_on = Arc::new(predicate);
        self
    }

    /// Attribute the command to `caller`.
    pub fn issued_by(mut self, caller: CallerId) -> Self {
        self.caller = caller;
        self
    }

    /// Return a copy with a different kind.
    pub fn with_kind(mut self, kind: CommandKind) -> Self {
        self.kind = kind;
        self
    }

    /// The command's tokens.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// The command's kind.
    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    /// The caller the command is attributed to.
    pub fn caller(&self) -> CallerId {
        self.caller
    }

    /// The tokens joined with single spaces, as written to the shell.
    pub fn command_line(&self) -> String {
        self.tokens.join(" ")
    }

    /// Check the line-acceptance predicate.
    pub fn accepts(&self, line: &str) -> bool {
        (self.line_filter)(line)
    }

    /// Check the terminate predicate.
    pub fn terminates_on(&self, line: &str) -> bool {
        (self.terminate_on)(line)
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("tokens", &self.tokens)
            .field("kind", &self.kind)
            .field("caller", &self.caller)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Command {
    /// Commands compare by what was sent, not by their predicates.
    fn eq(&self, other: &Self) -> bool {
        self.tokens == other.tokens && self.kind == other.kind && self.caller == other.caller
    }
}
