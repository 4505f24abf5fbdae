//! Shell process running inside a pseudo-terminal.

use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use portable_pty::{native_pty_system, Child, ChildKiller, CommandBuilder, MasterPty, PtySize};
use tracing::{debug, trace, warn};

use super::{Forwarding, Shell, ShellKiller, ShellKind};
use crate::error::ShellChannelError;
use crate::output::{ChunkReceiver, Line, LineBuffer, LineSanitizer};
use crate::Result;

const ROWS: u16 = 24;
// Wide enough that long container output is not wrapped by the terminal.
const COLS: u16 = 4096;

fn pty_error(e: impl std::fmt::Display) -> ShellChannelError {
    ShellChannelError::Pty(e.to_string())
}

/// A shell spawned in a PTY.
///
/// The terminal turns every newline into CRLF, which is what the line
/// framing expects regardless of the host OS.
pub struct PtyShell {
    kind: ShellKind,
    pid: u32,
    writer: Box<dyn Write + Send>,
    lines: LineBuffer<ChunkReceiver>,
    child: Box<dyn Child + Send + Sync>,
    killer: Arc<PtyKiller>,
    // Dropping the master hangs up the terminal.
    _master: Box<dyn MasterPty + Send>,
    forwarding: Forwarding,
    closed: bool,
}

/// Kills a PTY shell's process from any thread.
struct PtyKiller {
    pid: u32,
    inner: Mutex<Box<dyn ChildKiller + Send + Sync>>,
}

impl ShellKiller for PtyKiller {
    fn kill(&self) -> Result<()> {
        let mut killer = self
            .inner
            .lock()
            .map_err(|_| ShellChannelError::LockPoisoned)?;
        debug!(pid = self.pid, "Killing shell");
        killer.kill()?;
        Ok(())
    }
}

impl PtyShell {
    /// Spawn `program` as a shell of the given kind.
    ///
    /// `max_reads` bounds how many chunks a single line may span.
    pub fn spawn(kind: ShellKind, program: &Path, max_reads: usize) -> Result<Self> {
        let pair = native_pty_system()
            .openpty(PtySize {
                rows: ROWS,
                cols: COLS,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(pty_error)?;

        let mut cmd = CommandBuilder::new(program);
        cmd.args(kind.args());
        cmd.env("TERM", "dumb");
        cmd.env("PS1", "");
        cmd.env("PS2", "");
        if let Ok(dir) = std::env::current_dir() {
            cmd.cwd(dir);
        }

        let child = pair.slave.spawn_command(cmd).map_err(pty_error)?;
        drop(pair.slave);

        let pid = child.process_id().unwrap_or(0);
        let killer = Arc::new(PtyKiller {
            pid,
            inner: Mutex::new(child.clone_killer()),
        });
        let reader = pair.master.try_clone_reader().map_err(pty_error)?;
        let writer = pair.master.take_writer().map_err(pty_error)?;
        let source = ChunkReceiver::spawn(reader, format!("{}-reader-{}", kind, pid))?;

        let mut shell = Self {
            kind,
            pid,
            writer,
            lines: LineBuffer::with_max_reads(source, max_reads),
            child,
            killer,
            _master: pair.master,
            forwarding: Forwarding::default(),
            closed: false,
        };

        for line in kind.setup_lines() {
            shell.write(line)?;
        }

        debug!(kind = %kind, pid, program = %program.display(), "Shell started");
        Ok(shell)
    }

    /// Mirror every output line to the host streams selected by `forwarding`.
    pub fn with_forwarding(mut self, forwarding: Forwarding) -> Self {
        self.forwarding = forwarding;
        self
    }

    /// Sanitize a raw line and mirror it if forwarding is on.
    fn decode(&self, line: Line) -> Line {
        let line = Line::new(LineSanitizer::clean(line.value()));
        self.forwarding.mirror(line.value());
        line
    }
}

impl Shell for PtyShell {
    fn write(&mut self, text: &str) -> Result<()> {
        if self.closed {
            return Err(ShellChannelError::ShellClosed);
        }
        trace!(pid = self.pid, "> {}", text);
        self.writer.write_all(text.as_bytes())?;
        self.writer.write_all(self.kind.line_ending().as_bytes())?;
        self.writer.flush()?;
        Ok(())
    }

    fn kind(&self) -> ShellKind {
        self.kind
    }

    fn pid(&self) -> Result<u32> {
        Ok(self.pid)
    }

    fn out_line(&mut self) -> Result<Line> {
        let line = self.lines.next()?;
        trace!(pid = self.pid, "< {}", line);
        Ok(self.decode(line))
    }

    fn out_line_until(&mut self, deadline: Instant) -> Result<Option<Line>> {
        let line = self.lines.next_until(deadline)?;
        Ok(line.map(|line| self.decode(line)))
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if let Err(e) = self.child.kill() {
            warn!(pid = self.pid, error = %e, "Failed to kill shell");
        }
        match self.child.wait() {
            Ok(status) => debug!(pid = self.pid, ?status, "Shell closed"),
            Err(e) => debug!(pid = self.pid, error = %e, "Shell wait failed"),
        }
        Ok(())
    }

    fn killer(&self) -> Option<Arc<dyn ShellKiller>> {
        let killer: Arc<dyn ShellKiller> = self.killer.clone();
        Some(killer)
    }
}

impl Drop for PtyShell {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
