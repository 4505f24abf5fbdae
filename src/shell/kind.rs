//! Supported shell variants and how to talk to each of them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of interactive shell to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShellKind {
    /// Resolved from the current OS and what is installed.
    #[default]
    Default,
    /// POSIX `sh`.
    Sh,
    /// GNU Bash.
    Bash,
    /// Windows Command Prompt.
    Cmd,
    /// Windows PowerShell.
    PowerShell,
    /// Bash on Windows, as shipped with Git for Windows.
    GitBash,
}

impl ShellKind {
    /// Every concrete (non-default) kind.
    pub const CONCRETE: [ShellKind; 5] = [
        ShellKind::Sh,
        ShellKind::Bash,
        ShellKind::Cmd,
        ShellKind::PowerShell,
        ShellKind::GitBash,
    ];

    /// Executable name looked up on `PATH`.
    pub fn program(&self) -> &'static str {
        match self {
            ShellKind::Default | ShellKind::Sh => "sh",
            ShellKind::Bash | ShellKind::GitBash => "bash",
            ShellKind::Cmd => "cmd.exe",
            ShellKind::PowerShell => "powershell.exe",
        }
    }

    /// Arguments that keep the shell interactive but free of startup
    /// files, line editing and banners.
    pub fn args(&self) -> &'static [&'static str] {
        match self {
            ShellKind::Default | ShellKind::Sh => &[],
            ShellKind::Bash | ShellKind::GitBash => &["--noprofile", "--norc", "--noediting"],
            ShellKind::Cmd => &["/Q"],
            ShellKind::PowerShell => &["-NoLogo", "-NoProfile"],
        }
    }

    /// Lines written once after start to silence input echo and prompts.
    ///
    /// POSIX prompts are emptied through the environment before start.
    pub fn setup_lines(&self) -> &'static [&'static str] {
        match self {
            ShellKind::Default | ShellKind::Sh | ShellKind::Bash | ShellKind::GitBash => {
                &["stty -echo"]
            }
            ShellKind::Cmd => &["@echo off"],
            ShellKind::PowerShell => &["function prompt { '' }"],
        }
    }

    /// Terminator appended to every line written to the shell.
    pub fn line_ending(&self) -> &'static str {
        match self {
            ShellKind::Cmd | ShellKind::PowerShell => "\r\n",
            _ => "\n",
        }
    }

    /// Command that prints `marker` on a line of its own.
    ///
    /// The marker is split by shell quoting, so the typed command (should
    /// the terminal echo it) never contains the marker literally.
    pub fn echo_command(&self, marker: &str) -> String {
        let (head, tail) = split_marker(marker);
        match self {
            ShellKind::Default | ShellKind::Sh | ShellKind::Bash | ShellKind::GitBash => {
                format!("echo '{}''{}'", head, tail)
            }
            ShellKind::Cmd => format!("echo {}^{}", head, tail),
            ShellKind::PowerShell => format!("Write-Output ('{}' + '{}')", head, tail),
        }
    }

    /// Check whether this kind only exists on Windows hosts.
    pub fn is_windows_only(&self) -> bool {
        matches!(
            self,
            ShellKind::Cmd | ShellKind::PowerShell | ShellKind::GitBash
        )
    }

    /// Lowercase name, as accepted by [`FromStr`].
    pub fn as_str(&self) -> &'static str {
        match self {
            ShellKind::Default => "default",
            ShellKind::Sh => "sh",
            ShellKind::Bash => "bash",
            ShellKind::Cmd => "cmd",
            ShellKind::PowerShell => "powershell",
            ShellKind::GitBash => "gitbash",
        }
    }
}

fn split_marker(marker: &str) -> (&str, &str) {
    let mut mid = marker.len() / 2;
    while !marker.is_char_boundary(mid) {
        mid += 1;
    }
    marker.split_at(mid)
}

impl fmt::Display for ShellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShellKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Ok(ShellKind::Default),
            "sh" => Ok(ShellKind::Sh),
            "bash" => Ok(ShellKind::Bash),
            "cmd" | "cmd.exe" => Ok(ShellKind::Cmd),
            "powershell" | "pwsh" | "powershell.exe" => Ok(ShellKind::PowerShell),
            "gitbash" | "git-bash" => Ok(ShellKind::GitBash),
            other => Err(format!("unknown shell kind: {}", other)),
        }
    }
}
