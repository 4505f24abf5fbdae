//! Mirroring shell output to the host process's streams.

use std::io::{self, Write};

/// Host streams that get a copy of every line a shell prints.
///
/// A terminal merges the shell's stdout and stderr, so both options
/// mirror the same lines, marker lines included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Forwarding {
    /// Copy lines to this process's stdout.
    pub stdout: bool,
    /// Copy lines to this process's stderr.
    pub stderr: bool,
}

impl Forwarding {
    pub fn new(stdout: bool, stderr: bool) -> Self {
        Self { stdout, stderr }
    }

    pub fn is_enabled(&self) -> bool {
        self.stdout || self.stderr
    }

    /// Copy `line` to the enabled host streams.
    pub(crate) fn mirror(&self, line: &str) {
        if self.is_enabled() {
            self.write_line(line, &mut io::stdout().lock(), &mut io::stderr().lock());
        }
    }

    // Write errors (a closed pipe, say) must not fail the shell read.
    fn write_line<O: Write, E: Write>(&self, line: &str, out: &mut O, err: &mut E) {
        if self.stdout {
            let _ = writeln!(out, "{}", line);
        }
        if self.stderr {
            let _ = writeln!(err, "{}", line);
        }
    }
}
