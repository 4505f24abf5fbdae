//! Marker-framed command dispatch over one shared shell.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError, Weak};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use super::{ChannelConfig, ContainerIdRegistry};
use crate::error::ShellChannelError;
use crate::execution::{Command, CommandResult};
use crate::exit_hook;
use crate::shell::{LazyShell, Shell, ShellFactory, ShellKiller};
use crate::Result;

/// Printed after a command's output to mark it complete.
pub(crate) const RUN_MARKER: &str = "__SHELL_CHANNEL_RUN_MARKER__";
/// Printed before a command to discard stale output.
pub(crate) const CLEAR_MARKER: &str = "__SHELL_CHANNEL_CLEAR_MARKER__";

const LOCK_POLL: Duration = Duration::from_millis(10);

/// State guarded by the dispatch lock.
pub(crate) struct Dispatcher {
    shell: LazyShell,
    closed: bool,
}

/// Shared internals of a [`CommandChannel`](super::CommandChannel).
pub(crate) struct ChannelCore {
    state: Mutex<Dispatcher>,
    // Lock-free fast path; the flag inside `state` is authoritative.
    closed: AtomicBool,
    hooked: AtomicBool,
    shells_started: AtomicUsize,
    registry: ContainerIdRegistry,
    // Dedicated shells of live follow streams, killed at close.
    followers: Mutex<Vec<Weak<dyn ShellKiller>>>,
    factory: Arc<dyn ShellFactory>,
    config: ChannelConfig,
}

/// Lines read for one command, and whether a terminate predicate fired.
struct Completion {
    lines: Vec<String>,
    terminated: bool,
}

impl ChannelCore {
    pub(crate) fn new(config: ChannelConfig, factory: Arc<dyn ShellFactory>) -> Self {
        Self {
            state: Mutex::new(Dispatcher {
                shell: LazyShell::new(Arc::clone(&factory), config.shell.clone()),
                closed: false,
            }),
            closed: AtomicBool::new(false),
            hooked: AtomicBool::new(false),
            shells_started: AtomicUsize::new(0),
            registry: ContainerIdRegistry::new(),
            followers: Mutex::new(Vec::new()),
            factory,
            config,
        }
    }

    pub(crate) fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub(crate) fn registry(&self) -> &ContainerIdRegistry {
        &self.registry
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(ShellChannelError::ChannelClosed);
        }
        Ok(())
    }

    /// Send `command` and map its result, holding the dispatch lock for
    /// the whole exchange.
    pub(crate) fn send<T, F>(self: &Arc<Self>, command: Command, mapper: F) -> Result<T>
    where
        F: FnOnce(CommandResult) -> Result<T>,
    {
        self.ensure_open()?;
        let result = {
            let mut state = self
                .state
                .lock()
                .map_err(|_| ShellChannelError::LockPoisoned)?;
            if state.closed {
                return Err(ShellChannelError::ChannelClosed);
            }
            self.dispatch(&mut state, &command)?
        };
        mapper(result)
    }

    fn dispatch(self: &Arc<Self>, state: &mut Dispatcher, command: &Command) -> Result<CommandResult> {
        self.config.recorder.record(command);

        let fresh = !state.shell.is_started();
        let shell = state.shell.get_or_start()?;
        if fresh {
            self.shell_started();
        }

        debug!(caller = %command.caller(), kind = ?command.kind(), "Sending: {}", command.command_line());
        let completion = exchange(&mut **shell, command)?;

        if command.kind().creates_container() {
            match completion.lines.first() {
                Some(id) => {
                    trace!(id = %id, "Registering container");
                    self.registry.register(id.as_str())?;
                }
                None => warn!(
                    caller = %command.caller(),
                    "Run command produced no output, nothing registered: {}",
                    command.command_line()
                ),
            }
        }

        if completion.terminated {
            debug!(caller = %command.caller(), "Terminate predicate matched, closing shell");
            if let Err(e) = state.shell.close() {
                warn!(error = %e, "Failed to close shell after terminate");
            }
        }

        Ok(CommandResult::new(completion.lines))
    }

    /// Start a shell outside the dispatch lock, for streaming commands.
    ///
    /// The shell is killed when the channel closes.
    pub(crate) fn start_dedicated_shell(self: &Arc<Self>) -> Result<Box<dyn Shell>> {
        self.ensure_open()?;
        let mut shell = self.factory.create(&self.config.shell)?;
        self.shell_started();

        if let Some(killer) = shell.killer() {
            let mut followers = self
                .followers
                .lock()
                .map_err(|_| ShellChannelError::LockPoisoned)?;
            followers.retain(|follower| follower.strong_count() > 0);
            followers.push(Arc::downgrade(&killer));
        }
        // A close that ran before the push never saw this shell.
        if self.is_closed() {
            if let Err(e) = shell.close() {
                debug!(error = %e, "Failed to close follow shell");
            }
            return Err(ShellChannelError::ChannelClosed);
        }
        Ok(shell)
    }

    /// Register a container started by a follow stream.
    ///
    /// After close the id is refused. With cleanup enabled the container
    /// is removed right away through a shell of its own.
    pub(crate) fn register_followed(&self, id: &str) -> Result<()> {
        match self.registry.register(id) {
            Err(ShellChannelError::ChannelClosed) => {
                warn!(id, "Container started after the channel closed");
                if self.config.cleanup_on_close {
                    self.remove_now(id)?;
                }
                Err(ShellChannelError::ChannelClosed)
            }
            registered => registered,
        }
    }

    fn remove_now(&self, id: &str) -> Result<()> {
        let command = Command::remove_containers(&self.config.engine, [id])?;
        self.config.recorder.record(&command);

        let mut shell = self.factory.create(&self.config.shell)?;
        let removed = exchange(&mut *shell, &command);
        let closed = shell.close();
        removed?;
        closed
    }

    fn stop_followers(&self) {
        let followers: Vec<_> = {
            let mut followers = self.followers.lock().unwrap_or_else(PoisonError::into_inner);
            followers.drain(..).filter_map(|follower| follower.upgrade()).collect()
        };
        for killer in followers {
            if let Err(e) = killer.kill() {
                debug!(error = %e, "Failed to kill follow shell");
            }
        }
    }

    fn shell_started(self: &Arc<Self>) {
        self.shells_started.fetch_add(1, Ordering::AcqRel);
        if !self.hooked.swap(true, Ordering::AcqRel) {
            exit_hook::register(Arc::downgrade(self));
        }
    }

    /// Close the channel, waiting for any in-flight command.
    pub(crate) fn close(self: &Arc<Self>) -> Result<()> {
        // A panicked dispatch must not keep the shell alive.
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.close_locked(&mut state)
    }

    /// Close the channel unless a command is still in flight after
    /// `grace`. Returns whether the channel is closed.
    pub(crate) fn stop(self: &Arc<Self>, grace: Duration) -> Result<bool> {
        match self.lock_within(grace) {
            Some(mut state) => self.close_locked(&mut state).map(|()| true),
            None => Ok(false),
        }
    }

    fn lock_within(&self, grace: Duration) -> Option<MutexGuard<'_, Dispatcher>> {
        let deadline = Instant::now() + grace;
        loop {
            match self.state.try_lock() {
                Ok(state) => return Some(state),
                Err(TryLockError::Poisoned(poisoned)) => return Some(poisoned.into_inner()),
                Err(TryLockError::WouldBlock) if Instant::now() < deadline => {
                    thread::sleep(LOCK_POLL)
                }
                Err(TryLockError::WouldBlock) => return None,
            }
        }
    }

    fn close_locked(self: &Arc<Self>, state: &mut Dispatcher) -> Result<()> {
        if state.closed {
            return Ok(());
        }
        state.closed = true;
        self.closed.store(true, Ordering::Release);

        let sealed = self.registry.seal();
        self.stop_followers();

        let cleanup = sealed.and_then(|ids| self.cleanup(state, ids));
        if let Err(e) = &cleanup {
            warn!(error = %e, "Container cleanup failed");
        }
        let closed = state.shell.close();
        debug!(starts = state.shell.starts(), "Channel closed");
        cleanup?;
        closed
    }

    fn cleanup(self: &Arc<Self>, state: &mut Dispatcher, ids: Vec<String>) -> Result<()> {
        if !self.config.cleanup_on_close {
            return Ok(());
        }
        if self.shells_started.load(Ordering::Acquire) == 0 {
            return Ok(());
        }
        if ids.is_empty() {
            return Ok(());
        }

        debug!(count = ids.len(), "Removing registered containers");
        let command = Command::remove_containers(&self.config.engine, ids)?;
        self.dispatch(state, &command).map(|_| ())
    }
}

/// Run one marker-framed exchange on `shell`.
fn exchange(shell: &mut dyn Shell, command: &Command) -> Result<Completion> {
    shell.clear_buffer(CLEAR_MARKER)?;
    shell.write_tokens(command.tokens())?;
    shell.echo(RUN_MARKER)?;
    let marker_echo = shell.kind().echo_command(RUN_MARKER);
    read_until_marker(shell, command, &marker_echo)
}

fn read_until_marker(
    shell: &mut dyn Shell,
    command: &Command,
    marker_echo: &str,
) -> Result<Completion> {
    let echoed = command.command_line();
    let mut lines = Vec::new();

    loop {
        let line = shell.out_line()?;
        let text = line.value().trim();

        if text.ends_with(RUN_MARKER) {
            return Ok(Completion {
                lines,
                terminated: false,
            });
        }
        if text.is_empty() {
            continue;
        }
        if command.terminates_on(text) {
            lines.push(text.to_string());
            return Ok(Completion {
                lines,
                terminated: true,
            });
        }
        if text.ends_with(&echoed) || text.ends_with(marker_echo) {
            trace!("Skipping echoed command");
            continue;
        }
        if command.accepts(text) {
            lines.push(text.to_string());
        }
    }
}
