//! Ids of containers started through a channel.

use std::collections::HashSet;
use std::sync::Mutex;

use crate::error::ShellChannelError;
use crate::Result;

/// Concurrent append-only list of container ids, drained once at close.
///
/// Once sealed, the registry refuses new ids, so nothing registered after
/// the closing drain goes unnoticed.
#[derive(Debug, Default)]
pub struct ContainerIdRegistry {
    inner: Mutex<Ids>,
}

#[derive(Debug, Default)]
struct Ids {
    ids: Vec<String>,
    sealed: bool,
}

impl ContainerIdRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a container id.
    ///
    /// Fails with [`ShellChannelError::ChannelClosed`] once sealed.
    pub fn register(&self, id: impl Into<String>) -> Result<()> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| ShellChannelError::LockPoisoned)?;
        if inner.sealed {
            return Err(ShellChannelError::ChannelClosed);
        }
        inner.ids.push(id.into());
        Ok(())
    }

    /// Registered ids in registration order, duplicates included.
    pub fn snapshot(&self) -> Result<Vec<String>> {
        let inner = self
            .inner
            .lock()
            .map_err(|_| ShellChannelError::LockPoisoned)?;
        Ok(inner.ids.clone())
    }

    /// Get the number of registered ids.
    pub fn len(&self) -> usize {
        self.inner.lock().map(|inner| inner.ids.len()).unwrap_or(0)
    }

    /// Check if nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take every registered id, leaving the registry empty.
    ///
    /// Duplicates are collapsed, keeping the first occurrence's position.
    pub fn drain(&self) -> Result<Vec<String>> {
        self.take(false)
    }

    /// Drain the registry and refuse every later registration.
    pub fn seal(&self) -> Result<Vec<String>> {
        self.take(true)
    }

    /// Check whether the registry has been sealed.
    pub fn is_sealed(&self) -> bool {
        self.inner.lock().map(|inner| inner.sealed).unwrap_or(true)
    }

    fn take(&self, seal: bool) -> Result<Vec<String>> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| ShellChannelError::LockPoisoned)?;
        inner.sealed |= seal;
        let mut seen = HashSet::new();
        Ok(inner
            .ids
            .drain(..)
            .filter(|id| seen.insert(id.clone()))
            .collect())
    }
}
