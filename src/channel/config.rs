//! Channel settings.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::output::DEFAULT_MAX_READS;
use crate::recorder::{CommandRecorder, NoopRecorder};
use crate::shell::{Forwarding, ShellSpec};

/// Default container engine executable.
pub const DEFAULT_ENGINE: &str = "docker";

/// Default time the exit hook waits for an in-flight command.
pub const DEFAULT_EXIT_GRACE: Duration = Duration::from_secs(5);

/// How a [`CommandChannel`](super::CommandChannel) starts its shell and
/// what it does at close.
#[derive(Clone)]
pub struct ChannelConfig {
    /// Shell to start.
    pub shell: ShellSpec,
    /// Remove registered containers when the channel closes.
    pub cleanup_on_close: bool,
    /// Observer of every command sent.
    pub recorder: Arc<dyn CommandRecorder>,
    /// Chunk pulls allowed per output line before giving up.
    pub max_reads: usize,
    /// Container engine executable used for cleanup.
    pub engine: String,
    /// How long the exit hook waits for an in-flight command.
    pub exit_grace: Duration,
    /// Mirror shell output to this process's stdout.
    pub forward_stdout: bool,
    /// Mirror shell output to this process's stderr.
    pub forward_stderr: bool,
}

impl ChannelConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shell(mut self, shell: impl Into<ShellSpec>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn with_cleanup_on_close(mut self, cleanup: bool) -> Self {
        self.cleanup_on_close = cleanup;
        self
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn CommandRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    pub fn with_max_reads(mut self, max_reads: usize) -> Self {
        self.max_reads = max_reads;
        self
    }

    pub fn with_engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = engine.into();
        self
    }

    pub fn with_exit_grace(mut self, grace: Duration) -> Self {
        self.exit_grace = grace;
        self
    }

    pub fn with_forward_stdout(mut self, forward: bool) -> Self {
        self.forward_stdout = forward;
        self
    }

    pub fn with_forward_stderr(mut self, forward: bool) -> Self {
        self.forward_stderr = forward;
        self
    }

    /// Host streams that receive a copy of the shell's output.
    pub fn forwarding(&self) -> Forwarding {
        Forwarding::new(self.forward_stdout, self.forward_stderr)
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            shell: ShellSpec::default(),
            cleanup_on_close: false,
            recorder: Arc::new(NoopRecorder),
            max_reads: DEFAULT_MAX_READS,
            engine: DEFAULT_ENGINE.to_string(),
            exit_grace: DEFAULT_EXIT_GRACE,
            forward_stdout: false,
            forward_stderr: false,
        }
    }
}

impl fmt::Debug for ChannelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelConfig")
            .field("shell", &self.shell)
            .field("cleanup_on_close", &self.cleanup_on_close)
            .field("max_reads", &self.max_reads)
            .field("engine", &self.engine)
            .field("exit_grace", &self.exit_grace)
            .field("forward_stdout", &self.forward_stdout)
            .field("forward_stderr", &self.forward_stderr)
            .finish_non_exhaustive()
    }
}
