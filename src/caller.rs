//! Caller identity used to attribute recorded commands.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for caller id generation; 0 is reserved for the root caller.
static COUNTER: AtomicU64 = AtomicU64::new(1);

/// Identifies the logical caller that issued a command.
///
/// Ids are unique within a process and displayed as `caller-XXXXXXXX`.
/// Commands that do not name a caller are attributed to [`CallerId::root`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallerId(u64);

impl CallerId {
    /// Allocate a new unique caller id.
    pub fn new() -> Self {
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// The caller every unattributed command belongs to.
    pub const fn root() -> Self {
        Self(0)
    }

    /// Check whether this is the root caller.
    pub fn is_root(&self) -> bool {
        self.0 == 0
    }

    /// Get the raw u64 value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Create a CallerId from a raw u64 value.
    pub fn from_raw(value: u64) -> Self {
        Self(value)
    }
}

impl Default for CallerId {
    fn default() -> Self {
        Self::root()
    }
}

impl fmt::Display for CallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "caller-{:08x}", self.0)
    }
}

/// Error returned when a string is not a valid caller id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseCallerIdError(String);

impl fmt::Display for ParseCallerIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid caller id: {}", self.0)
    }
}

impl std::error::Error for ParseCallerIdError {}

impl FromStr for CallerId {
    type Err = ParseCallerIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix("caller-")
            .and_then(|hex| u64::from_str_radix(hex, 16).ok())
            .map(CallerId)
            .ok_or_else(|| ParseCallerIdError(s.into()))
    }
}
