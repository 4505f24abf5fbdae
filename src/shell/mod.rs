//! Interactive shell processes.
//!
//! A [`Shell`] is one long-lived interpreter read and written line by line.
//! [`PtyShell`] runs it inside a pseudo-terminal so that output lines are
//! always CRLF-terminated, [`SystemShells`] picks the variant to start and
//! [`LazyShell`] defers starting it until first use.

mod factory;
mod forward;
mod kind;
mod lazy;
mod pty;

pub use factory::{ShellFactory, SystemShells};
pub use forward::Forwarding;
pub use kind::ShellKind;
pub use lazy::LazyShell;
pub use pty::PtyShell;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::output::Line;
use crate::Result;

/// Which shell to start, and optionally where its executable lives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellSpec {
    /// Requested kind.
    pub kind: ShellKind,
    /// Explicit executable path, bypassing the `PATH` lookup.
    pub path: Option<PathBuf>,
}

impl ShellSpec {
    /// Create a spec for `kind`.
    pub fn new(kind: ShellKind) -> Self {
        Self { kind, path: None }
    }

    /// Use the executable at `path`.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }
}

impl From<ShellKind> for ShellSpec {
    fn from(kind: ShellKind) -> Self {
        Self::new(kind)
    }
}

/// Terminates a shell from another thread.
///
/// Killing the process ends its output, so a reader blocked on the shell
/// returns with an error instead of waiting forever.
pub trait ShellKiller: Send + Sync {
    fn kill(&self) -> Result<()>;
}

/// One interactive shell session with line-oriented stdin and stdout.
pub trait Shell: Send {
    /// Write `text` followed by the shell's line ending.
    fn write(&mut self, text: &str) -> Result<()>;

    /// Write `tokens` joined with single spaces.
    fn write_tokens(&mut self, tokens: &[String]) -> Result<()> {
        self.write(&tokens.join(" "))
    }

    /// The shell variant.
    fn kind(&self) -> ShellKind;

    /// OS process id of the shell.
    fn pid(&self) -> Result<u32>;

    /// Block until the next output line is available.
    fn out_line(&mut self) -> Result<Line>;

    /// Like [`out_line`](Shell::out_line), returning `Ok(None)` once
    /// `deadline` has passed.
    fn out_line_until(&mut self, deadline: Instant) -> Result<Option<Line>>;

    /// Terminate the shell. Closing twice is a no-op.
    fn close(&mut self) -> Result<()>;

    /// Handle for killing this shell while another thread reads from it.
    fn killer(&self) -> Option<Arc<dyn ShellKiller>> {
        None
    }

    /// Ask the shell to print `marker` on a line of its own.
    fn echo(&mut self, marker: &str) -> Result<()> {
        let command = self.kind().echo_command(marker);
        self.write(&command)
    }

    /// Echo `marker` and discard output up to and including its line.
    ///
    /// Output left over from earlier commands is dropped with it, which
    /// realigns reads with writes.
    fn clear_buffer(&mut self, marker: &str) -> Result<()> {
        self.echo(marker)?;
        loop {
            let line = self.out_line()?;
            if line.value().trim_end().ends_with(marker) {
                return Ok(());
            }
        }
    }
}
