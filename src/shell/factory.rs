//! Choosing and starting shells.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::{Forwarding, PtyShell, Shell, ShellKind, ShellSpec};
use crate::error::ShellChannelError;
use crate::output::DEFAULT_MAX_READS;
use crate::Result;

const GIT_BASH_PATH: &str = r"C:\Program Files\Git\bin\bash.exe";

/// Starts shell processes.
pub trait ShellFactory: Send + Sync {
    /// Start a new shell as described by `spec`.
    fn create(&self, spec: &ShellSpec) -> Result<Box<dyn Shell>>;
}

/// Factory for the shells installed on this host.
#[derive(Debug, Clone)]
pub struct SystemShells {
    max_reads: usize,
    forwarding: Forwarding,
}

impl SystemShells {
    pub fn new() -> Self {
        Self::with_max_reads(DEFAULT_MAX_READS)
    }

    /// Shells whose line reads give up after `max_reads` chunks.
    pub fn with_max_reads(max_reads: usize) -> Self {
        Self {
            max_reads,
            forwarding: Forwarding::default(),
        }
    }

    /// Mirror the output of every started shell to the host streams.
    pub fn with_forwarding(mut self, forwarding: Forwarding) -> Self {
        self.forwarding = forwarding;
        self
    }

    pub fn forwarding(&self) -> Forwarding {
        self.forwarding
    }

    /// Resolve `spec` to a concrete kind and the executable to run.
    ///
    /// [`ShellKind::Default`] becomes PowerShell, falling back to cmd, on
    /// Windows and Bash, falling back to sh, everywhere else.
    pub fn resolve(spec: &ShellSpec) -> Result<(ShellKind, PathBuf)> {
        if let Some(path) = &spec.path {
            let kind = match spec.kind {
                ShellKind::Default => ShellKind::Sh,
                kind => kind,
            };
            return Ok((kind, path.clone()));
        }

        match spec.kind {
            ShellKind::Default => {
                let candidates: &[ShellKind] = if cfg!(windows) {
                    &[ShellKind::PowerShell, ShellKind::Cmd]
                } else {
                    &[ShellKind::Bash, ShellKind::Sh]
                };
                candidates
                    .iter()
                    .find_map(|kind| locate(*kind).map(|path| (*kind, path)))
                    .ok_or_else(|| ShellChannelError::ShellUnavailable("default".to_string()))
            }
            kind => locate(kind)
                .map(|path| (kind, path))
                .ok_or_else(|| ShellChannelError::ShellUnavailable(kind.to_string())),
        }
    }

    /// Check whether `kind` can be started on this host.
    pub fn is_available(kind: ShellKind) -> bool {
        Self::resolve(&ShellSpec::new(kind)).is_ok()
    }
}

impl Default for SystemShells {
    fn default() -> Self {
        Self::new()
    }
}

impl ShellFactory for SystemShells {
    fn create(&self, spec: &ShellSpec) -> Result<Box<dyn Shell>> {
        let (kind, program) = Self::resolve(spec)?;
        debug!(requested = %spec.kind, resolved = %kind, program = %program.display(), "Starting shell");
        let shell = PtyShell::spawn(kind, &program, self.max_reads)?.with_forwarding(self.forwarding);
        Ok(Box::new(shell))
    }
}

fn locate(kind: ShellKind) -> Option<PathBuf> {
    if kind.is_windows_only() && !cfg!(windows) {
        return None;
    }
    if kind == ShellKind::GitBash {
        let path = Path::new(GIT_BASH_PATH);
        return path.is_file().then(|| path.to_path_buf());
    }
    which::which(kind.program()).ok()
}
