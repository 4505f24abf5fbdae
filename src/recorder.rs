//! Recording of commands actually sent to a shell.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::caller::CallerId;
use crate::execution::Command;

/// Observes every command a channel sends, just before it is written.
///
/// Commands that are built but never executed are not recorded.
pub trait CommandRecorder: Send + Sync {
    fn record(&self, command: &Command);
}

/// Recorder that discards everything. Used by default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRecorder;

impl CommandRecorder for NoopRecorder {
    fn record(&self, _command: &Command) {}
}

/// Commands recorded for one caller.
pub type CallerView = Arc<Mutex<Vec<Command>>>;

/// Recorder keeping a separate command list per caller.
///
/// Each caller's list sits behind its own lock, so callers only contend
/// on the map when a list is created.
#[derive(Default)]
pub struct CallerRecorder {
    views: RwLock<HashMap<CallerId, CallerView>>,
}

impl CallerRecorder {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutable view of the commands recorded for `caller`.
    pub fn for_caller(&self, caller: CallerId) -> CallerView {
        if let Ok(views) = self.views.read() {
            if let Some(view) = views.get(&caller) {
                return Arc::clone(view);
            }
        }

        match self.views.write() {
            Ok(mut views) => Arc::clone(views.entry(caller).or_default()),
            Err(poisoned) => Arc::clone(poisoned.into_inner().entry(caller).or_default()),
        }
    }

    /// Snapshot of the commands recorded for `caller`.
    pub fn commands(&self, caller: CallerId) -> Vec<Command> {
        let view = self.for_caller(caller);
        let commands = match view.lock() {
            Ok(commands) => commands.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        commands
    }

    /// Token lists of the commands recorded for `caller`.
    pub fn token_lists(&self, caller: CallerId) -> Vec<Vec<String>> {
        self.commands(caller)
            .into_iter()
            .map(|command| command.tokens().to_vec())
            .collect()
    }

    /// Forget everything recorded for `caller`.
    pub fn clear(&self, caller: CallerId) {
        let view = self.for_caller(caller);
        match view.lock() {
            Ok(mut commands) => commands.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        };
    }
}

impl CommandRecorder for CallerRecorder {
    fn record(&self, command: &Command) {
        let view = self.for_caller(command.caller());
        match view.lock() {
            Ok(mut commands) => commands.push(command.clone()),
            Err(poisoned) => poisoned.into_inner().push(command.clone()),
        };
    }
}
