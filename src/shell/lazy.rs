//! Shell started on first use.

use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use super::{Shell, ShellFactory, ShellKind, ShellSpec};
use crate::error::ShellChannelError;
use crate::output::Line;
use crate::Result;

/// Wraps a shell that is only started when something needs it.
///
/// Closing drops the running shell; the next use starts a fresh one.
pub struct LazyShell {
    factory: Arc<dyn ShellFactory>,
    spec: ShellSpec,
    shell: Option<Box<dyn Shell>>,
    starts: usize,
}

impl LazyShell {
    pub fn new(factory: Arc<dyn ShellFactory>, spec: ShellSpec) -> Self {
        Self {
            factory,
            spec,
            shell: None,
            starts: 0,
        }
    }

    /// The running shell, starting it if needed.
    pub fn get_or_start(&mut self) -> Result<&mut Box<dyn Shell>> {
        let shell = match self.shell.take() {
            Some(shell) => shell,
            None => {
                let shell = self.factory.create(&self.spec)?;
                self.starts += 1;
                debug!(kind = %shell.kind(), starts = self.starts, "Lazy shell started");
                shell
            }
        };
        Ok(self.shell.insert(shell))
    }

    /// Check whether a shell is currently running.
    pub fn is_started(&self) -> bool {
        self.shell.is_some()
    }

    /// Number of shells started over this wrapper's lifetime.
    pub fn starts(&self) -> usize {
        self.starts
    }

    pub fn spec(&self) -> &ShellSpec {
        &self.spec
    }
}

impl Shell for LazyShell {
    fn write(&mut self, text: &str) -> Result<()> {
        self.get_or_start()?.write(text)
    }

    fn write_tokens(&mut self, tokens: &[String]) -> Result<()> {
        self.get_or_start()?.write_tokens(tokens)
    }

    /// Kind of the running shell, or the requested kind before start.
    fn kind(&self) -> ShellKind {
        match &self.shell {
            Some(shell) => shell.kind(),
            None => self.spec.kind,
        }
    }

    fn pid(&self) -> Result<u32> {
        match &self.shell {
            Some(shell) => shell.pid(),
            None => Err(ShellChannelError::ShellNotStarted),
        }
    }

    fn out_line(&mut self) -> Result<Line> {
        self.get_or_start()?.out_line()
    }

    fn out_line_until(&mut self, deadline: Instant) -> Result<Option<Line>> {
        self.get_or_start()?.out_line_until(deadline)
    }

    fn close(&mut self) -> Result<()> {
        match self.shell.take() {
            Some(mut shell) => shell.close(),
            None => Ok(()),
        }
    }

    fn echo(&mut self, marker: &str) -> Result<()> {
        self.get_or_start()?.echo(marker)
    }

    fn clear_buffer(&mut self, marker: &str) -> Result<()> {
        self.get_or_start()?.clear_buffer(marker)
    }
}
