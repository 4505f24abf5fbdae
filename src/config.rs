//! Configuration management for shell-channel.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::channel::{ChannelConfig, DEFAULT_ENGINE, DEFAULT_EXIT_GRACE};
use crate::cli::Args;
use crate::output::DEFAULT_MAX_READS;
use crate::shell::{ShellKind, ShellSpec};

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Shell configuration.
    pub shell: ShellSection,
    /// Channel configuration.
    pub channel: ChannelSection,
    /// Logging configuration.
    pub logging: LoggingSection,
}

/// Shell configuration section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellSection {
    /// Shell kind to start.
    pub kind: ShellKind,
    /// Explicit shell executable.
    pub path: Option<PathBuf>,
    /// Mirror shell output to stdout.
    pub forward_stdout: bool,
    /// Mirror shell output to stderr.
    pub forward_stderr: bool,
}

/// Channel configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelSection {
    /// Remove registered containers when the channel closes.
    pub cleanup_on_close: bool,
    /// Chunk pulls allowed per output line.
    pub max_reads: usize,
    /// Container engine executable.
    pub engine: String,
    /// Exit hook grace period in milliseconds.
    pub exit_grace_ms: u64,
}

impl Default for ChannelSection {
    fn default() -> Self {
        Self {
            cleanup_on_close: false,
            max_reads: DEFAULT_MAX_READS,
            engine: DEFAULT_ENGINE.to_string(),
            exit_grace_ms: DEFAULT_EXIT_GRACE.as_millis() as u64,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) {
        self.apply_vars(|name| std::env::var(name).ok());
    }

    /// Apply overrides looked up by variable name.
    ///
    /// Values that do not parse are ignored.
    pub fn apply_vars<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(kind) = var("SHELL_CHANNEL_SHELL") {
            if let Ok(kind) = kind.parse() {
                self.shell.kind = kind;
            }
        }

        if let Some(path) = var("SHELL_CHANNEL_SHELL_PATH") {
            if !path.is_empty() {
                self.shell.path = Some(PathBuf::from(path));
            }
        }

        if let Some(forward) = var("SHELL_CHANNEL_FORWARD_STDOUT").and_then(|v| parse_flag(&v)) {
            self.shell.forward_stdout = forward;
        }

        if let Some(forward) = var("SHELL_CHANNEL_FORWARD_STDERR").and_then(|v| parse_flag(&v)) {
            self.shell.forward_stderr = forward;
        }

        if let Some(engine) = var("SHELL_CHANNEL_ENGINE") {
            if !engine.is_empty() {
                self.channel.engine = engine;
            }
        }

        if let Some(cleanup) = var("SHELL_CHANNEL_CLEANUP").and_then(|v| parse_flag(&v)) {
            self.channel.cleanup_on_close = cleanup;
        }

        if let Some(level) = var("SHELL_CHANNEL_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Some(level) = var("RUST_LOG") {
            self.logging.level = level;
        }
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(kind) = args.shell {
            self.shell.kind = kind;
        }

        if args.forward_stdout {
            self.shell.forward_stdout = true;
        }

        if args.forward_stderr {
            self.shell.forward_stderr = true;
        }

        if let Some(ref engine) = args.engine {
            self.channel.engine = engine.clone();
        }

        if args.cleanup {
            self.channel.cleanup_on_close = true;
        }

        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(ref path) = args.config {
            config = Config::from_file(path)?;
        }

        config.apply_env();
        config.apply_args(args);

        Ok(config)
    }

    /// Build the settings for a [`CommandChannel`](crate::CommandChannel).
    pub fn to_channel_config(&self) -> ChannelConfig {
        let mut shell = ShellSpec::new(self.shell.kind);
        if let Some(ref path) = self.shell.path {
            shell = shell.with_path(path);
        }

        ChannelConfig::new()
            .with_shell(shell)
            .with_cleanup_on_close(self.channel.cleanup_on_close)
            .with_max_reads(self.channel.max_reads)
            .with_engine(&self.channel.engine)
            .with_exit_grace(Duration::from_millis(self.channel.exit_grace_ms))
            .with_forward_stdout(self.shell.forward_stdout)
            .with_forward_stderr(self.shell.forward_stderr)
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}
