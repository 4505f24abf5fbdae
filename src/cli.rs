//! Command-line interface for shell-channel.
//!
//! Uses lexopt for minimal binary size overhead (~34KB).

use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use crate::shell::ShellKind;

/// Command-line arguments.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Shell to drive.
    pub shell: Option<ShellKind>,
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Container engine executable.
    pub engine: Option<String>,
    /// Remove containers started by this invocation on exit.
    pub cleanup: bool,
    /// The command starts a container; register its id.
    pub run: bool,
    /// Stream output line by line.
    pub follow: bool,
    /// Mirror raw shell output to stdout.
    pub forward_stdout: bool,
    /// Mirror raw shell output to stderr.
    pub forward_stderr: bool,
    /// Stop at the first line containing this text.
    pub look_for: Option<String>,
    /// Give up waiting for `look_for` after this long.
    pub timeout: Option<Duration>,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
    /// Command to send, as argv-like tokens.
    pub tokens: Vec<String>,
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
///
/// Everything from the first positional argument on is taken as the
/// command, flags included.
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('s') | Long("shell") => {
                let value: String = parser.value()?.parse()?;
                result.shell = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("shell", value))?,
                );
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Short('e') | Long("engine") => {
                result.engine = Some(parser.value()?.parse()?);
            }
            Long("cleanup") => {
                result.cleanup = true;
            }
            Long("run") => {
                result.run = true;
            }
            Short('f') | Long("follow") => {
                result.follow = true;
            }
            Long("forward-stdout") => {
                result.forward_stdout = true;
            }
            Long("forward-stderr") => {
                result.forward_stderr = true;
            }
            Long("look-for") => {
                result.look_for = Some(parser.value()?.parse()?);
            }
            Long("timeout") => {
                let value: String = parser.value()?.parse()?;
                let millis: u64 = value
                    .parse()
                    .map_err(|_| ArgsError::InvalidValue("timeout", value))?;
                result.timeout = Some(Duration::from_millis(millis));
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Value(val) => {
                result.tokens.push(val.string()?);
                for rest in parser.raw_args()? {
                    result.tokens.push(rest.string()?);
                }
                break;
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    if result.timeout.is_some() && result.look_for.is_none() {
        return Err(ArgsError::MissingArgument("look-for"));
    }

    Ok(result)
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"shell-channel {version}
Drive a container engine CLI through one persistent interactive shell

USAGE:
    shell-channel [OPTIONS] [--] <COMMAND>...

OPTIONS:
    -s, --shell <KIND>      Shell to use (default, sh, bash, cmd, powershell, gitbash)
    -c, --config <FILE>     Path to configuration file (JSON)
    -e, --engine <EXE>      Container engine used for cleanup [default: docker]
        --cleanup           Remove containers started by --run on exit
        --run               The command starts a container; register its id
    -f, --follow            Stream output line by line
        --look-for <TEXT>   Stop at the first line containing TEXT
        --timeout <MS>      Fail if TEXT does not appear within MS milliseconds
        --forward-stdout    Mirror raw shell output to stdout
        --forward-stderr    Mirror raw shell output to stderr
    -l, --log-level <LVL>   Log level (error, warn, info, debug, trace)
    -h, --help              Print help
    -V, --version           Print version

ENVIRONMENT VARIABLES:
    SHELL_CHANNEL_SHELL       Shell kind (overrides config)
    SHELL_CHANNEL_SHELL_PATH  Shell executable path (overrides config)
    SHELL_CHANNEL_ENGINE      Container engine (overrides config)
    SHELL_CHANNEL_CLEANUP     Remove registered containers on exit (true/false)
    SHELL_CHANNEL_FORWARD_STDOUT  Mirror shell output to stdout (true/false)
    SHELL_CHANNEL_FORWARD_STDERR  Mirror shell output to stderr (true/false)
    SHELL_CHANNEL_LOG_LEVEL   Log level (overrides config)
    RUST_LOG                  Alternative log level setting

EXAMPLES:
    # List running containers
    shell-channel docker ps

    # Start a container and remove it again on exit
    shell-channel --run --cleanup docker run -d nginx:alpine

    # Wait for a database to come up
    shell-channel -f --look-for "ready to accept connections" --timeout 30000 \
        docker logs -f db
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("shell-channel {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Invalid argument value.
    InvalidValue(&'static str, String),
    /// An option requires another one.
    MissingArgument(&'static str),
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for --{}: '{}'", name, value)
            }
            Self::MissingArgument(name) => {
                write!(f, "--timeout requires --{}", name)
            }
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}
