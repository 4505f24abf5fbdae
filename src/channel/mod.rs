//! Serialized command execution against one persistent shell.
//!
//! A [`CommandChannel`] owns a lazily started shell. Every command runs
//! under the channel's lock: stale output is discarded up to a clear
//! marker, the command is written, and output is read until a run marker
//! comes back. Containers started by `Run` commands are remembered and
//! can be removed in bulk when the channel closes.

mod config;
mod dispatch;
mod registry;

pub use config::{ChannelConfig, DEFAULT_ENGINE, DEFAULT_EXIT_GRACE};
pub use registry::ContainerIdRegistry;

pub(crate) use dispatch::{ChannelCore, CLEAR_MARKER};

use std::sync::Arc;

use tracing::warn;

use crate::error::ShellChannelError;
use crate::execution::{Command, CommandResult};
use crate::follow::LogFollow;
use crate::shell::{ShellFactory, SystemShells};
use crate::Result;

/// Sends commands, one at a time, through a shared shell.
///
/// Share a channel between threads with an `Arc`. Dropping the channel
/// closes it.
pub struct CommandChannel {
    core: Arc<ChannelCore>,
}

impl CommandChannel {
    /// Create a channel over the shells installed on this host.
    pub fn new(config: ChannelConfig) -> Self {
        let factory = Arc::new(
            SystemShells::with_max_reads(config.max_reads).with_forwarding(config.forwarding()),
        );
        Self::with_factory(config, factory)
    }

    /// Create a channel whose shells come from `factory`.
    pub fn with_factory(config: ChannelConfig, factory: Arc<dyn ShellFactory>) -> Self {
        Self {
            core: Arc::new(ChannelCore::new(config, factory)),
        }
    }

    /// Send `command` and apply `mapper` to its result.
    ///
    /// Fails with [`ShellChannelError::ChannelClosed`] without touching
    /// the shell once the channel is closed.
    pub fn send_command<T, F>(&self, command: Command, mapper: F) -> Result<T>
    where
        F: FnOnce(CommandResult) -> Result<T>,
    {
        self.core.send(command, mapper)
    }

    /// Send `command` and return its accepted output lines.
    pub fn execute(&self, command: Command) -> Result<CommandResult> {
        self.core.send(command, Ok)
    }

    /// Like [`execute`](Self::execute), on tokio's blocking pool.
    pub async fn execute_async(&self, command: Command) -> Result<CommandResult> {
        let core = Arc::clone(&self.core);
        tokio::task::spawn_blocking(move || core.send(command, Ok))
            .await
            .map_err(|e| ShellChannelError::TaskFailed(e.to_string()))?
    }

    /// Build a lazily sent request for `command`'s output.
    ///
    /// Nothing is sent or recorded until the returned stream is consumed.
    pub fn logs(&self, command: Command) -> LogFollow {
        LogFollow::new(Arc::clone(&self.core), command)
    }

    /// Close the channel.
    ///
    /// Waits for an in-flight command, removes registered containers when
    /// cleanup is enabled, then closes the shell. The shell is closed even
    /// if the removal fails; that failure is returned afterwards. Closing
    /// twice is a no-op.
    pub fn close(&self) -> Result<()> {
        self.core.close()
    }

    /// Check whether the channel has been closed.
    pub fn is_closed(&self) -> bool {
        self.core.is_closed()
    }

    /// Container ids registered so far.
    pub fn registered_ids(&self) -> Result<Vec<String>> {
        self.core.registry().snapshot()
    }

    pub fn config(&self) -> &ChannelConfig {
        self.core.config()
    }
}

impl Drop for CommandChannel {
    fn drop(&mut self) {
        if let Err(e) = self.core.close() {
            warn!(error = %e, "Failed to close channel on drop");
        }
    }
}
