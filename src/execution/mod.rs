//! Commands and their results.
//!
//! # Example
//!
//! ```
//! use shell_channel::execution::{Command, CommandKind};
//!
//! let run = Command::new(CommandKind::Run, ["docker", "run", "-d", "alpine:3.20"])
//!     .accept_lines(|line| !line.starts_with("Unable to find image"));
//! assert_eq!(run.command_line(), "docker run -d alpine:3.20");
//! ```

mod command;
mod result;

pub use command::{Command, CommandKind, LinePredicate};
pub use result::CommandResult;
