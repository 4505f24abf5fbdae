//! Stopping live channels when the process is interrupted.
//!
//! Channels register here once they start a shell. [`stop_all`] closes
//! each of them, running container cleanup. The first registration starts
//! a watcher thread that calls it on Ctrl-C or SIGTERM.

use std::sync::{Mutex, Once, PoisonError, Weak};
use std::thread;

use tracing::{debug, info, warn};

use crate::channel::ChannelCore;

/// Exit status used after an interrupt.
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

static CHANNELS: Mutex<Vec<Weak<ChannelCore>>> = Mutex::new(Vec::new());

static SIGNAL_WATCHER: Once = Once::new();

pub(crate) fn register(core: Weak<ChannelCore>) {
    install_signal_handler();
    let mut channels = CHANNELS.lock().unwrap_or_else(PoisonError::into_inner);
    channels.retain(|channel| channel.strong_count() > 0);
    channels.push(core);
}

/// Number of registered channels still alive.
pub fn live_channels() -> usize {
    let channels = CHANNELS.lock().unwrap_or_else(PoisonError::into_inner);
    channels
        .iter()
        .filter(|channel| channel.strong_count() > 0)
        .count()
}

/// Close every live channel.
///
/// Each channel waits up to its configured exit grace for a command in
/// flight; channels still busy after that are left alone. Returns the
/// number of channels closed.
pub fn stop_all() -> usize {
    let live: Vec<_> = {
        let mut channels = CHANNELS.lock().unwrap_or_else(PoisonError::into_inner);
        channels.retain(|channel| channel.strong_count() > 0);
        channels.iter().filter_map(Weak::upgrade).collect()
    };

    let mut stopped = 0;
    for core in live {
        match core.stop(core.config().exit_grace) {
            Ok(true) => stopped += 1,
            Ok(false) => warn!(
                grace = ?core.config().exit_grace,
                "Channel still busy, skipped on exit"
            ),
            Err(e) => {
                stopped += 1;
                warn!(error = %e, "Channel cleanup failed on exit");
            }
        }
    }
    debug!(stopped, "Stopped live channels");
    stopped
}

/// Stop all channels and exit when the process receives Ctrl-C or SIGTERM.
///
/// Runs on a thread of its own with a private runtime, so it works with or
/// without a tokio runtime in the caller. Channels install it when they
/// start their first shell; calling it again is a no-op.
pub fn install_signal_handler() {
    SIGNAL_WATCHER.call_once(|| {
        let spawned = thread::Builder::new()
            .name("shell-channel-signals".to_string())
            .spawn(watch_signals);
        match spawned {
            Ok(_) => debug!("Signal watcher started"),
            Err(e) => warn!(error = %e, "Cannot start signal watcher"),
        }
    });
}

/// Check whether the signal watcher has been started.
pub fn is_signal_handler_installed() -> bool {
    SIGNAL_WATCHER.is_completed()
}

fn watch_signals() {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            warn!(error = %e, "Cannot start signal runtime");
            return;
        }
    };

    runtime.block_on(wait_for_signal());
    info!("Interrupted, stopping channels");
    stop_all();
    std::process::exit(INTERRUPTED_EXIT_CODE);
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(e) => {
            warn!(error = %e, "Cannot listen for SIGTERM");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
