//! # shell-channel
//!
//! Drive a container engine CLI through one persistent interactive shell.
//!
//! Starting a process per command is slow on some hosts, so this crate
//! keeps a single shell open and frames each command with marker lines.
//! Output is decoded into CRLF-terminated lines under any chunking, and
//! concurrent callers are serialized on the one shell. Containers started
//! through the channel can be removed in bulk when it closes, including
//! on Ctrl-C.
//!
//! ## Features
//!
//! - **Persistent shell**: sh, Bash, cmd, PowerShell or Git Bash over a PTY
//! - **Marker framing**: stale output discarded, completion detected
//! - **Log following**: lazy streams ending on a pattern, with a timeout
//! - **Cleanup**: registered containers removed once, on close or exit
//!
//! ## Quick Start
//!
//! ```no_run
//! use shell_channel::{ChannelConfig, Command, CommandChannel, CommandKind};
//!
//! #[tokio::main]
//! async fn main() -> shell_channel::Result<()> {
//!     shell_channel::logging::try_init().ok();
//!
//!     let channel = CommandChannel::new(ChannelConfig::default().with_cleanup_on_close(true));
//!
//!     let run = Command::new(CommandKind::Run, ["docker", "run", "-d", "nginx:alpine"]);
//!     let id = channel.execute_async(run).await?;
//!     println!("started {}", id.single_line()?);
//!
//!     // Removes the container, then stops the shell.
//!     channel.close()
//! }
//! ```

pub mod caller;
pub mod channel;
pub mod cli;
pub mod config;
pub mod error;
pub mod execution;
pub mod exit_hook;
pub mod follow;
pub mod logging;
pub mod output;
pub mod recorder;
pub mod shell;

// Re-export commonly used types
pub use caller::CallerId;
pub use channel::{ChannelConfig, CommandChannel, ContainerIdRegistry};
pub use error::{Result, ShellChannelError};
pub use execution::{Command, CommandKind, CommandResult};
pub use follow::{LogFollow, LogStream, LookFor};
pub use output::{Line, LineBuffer};
pub use recorder::{CallerRecorder, CommandRecorder, NoopRecorder};
pub use shell::{
    Forwarding, LazyShell, PtyShell, Shell, ShellFactory, ShellKiller, ShellKind, ShellSpec,
    SystemShells,
};
