//! Shutdown signal handling
//!
//! Termination signals are turned into a pipeline shutdown request on a
//! dedicated thread, so nothing beyond the flag write happens in signal
//! context.

use crate::core::ShutdownHandle;
use crate::error::{MirrorCopyError, Result};
use std::thread::JoinHandle;

/// Signals that request a graceful shutdown
#[cfg(unix)]
pub const SHUTDOWN_SIGNALS: [i32; 6] = [
    signal_hook::consts::SIGINT,
    signal_hook::consts::SIGTERM,
    signal_hook::consts::SIGQUIT,
    signal_hook::consts::SIGHUP,
    signal_hook::consts::SIGUSR1,
    signal_hook::consts::SIGUSR2,
];

/// Installed signal listener; dropping it unregisters the handlers
pub struct SignalGuard {
    #[cfg(unix)]
    handle: signal_hook::iterator::Handle,
    thread: Option<JoinHandle<()>>,
}

impl SignalGuard {
    /// Stop listening and wait for the listener thread
    pub fn close(mut self) {
        self.shutdown_listener();
    }

    fn shutdown_listener(&mut self) {
        #[cfg(unix)]
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        self.shutdown_listener();
    }
}

/// Route termination signals to `shutdown`
///
/// The first signal cancels the pipeline; the walk stops and already queued
/// tasks are still copied. Further signals are logged and otherwise ignored.
#[cfg(unix)]
pub fn install_shutdown_handler(shutdown: ShutdownHandle) -> Result<SignalGuard> {
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new(SHUTDOWN_SIGNALS)
        .map_err(|e| MirrorCopyError::SignalError(e.to_string()))?;
    let handle = signals.handle();

    let thread = std::thread::Builder::new()
        .name("signal-listener".to_string())
        .spawn(move || {
            for signal in signals.forever() {
                if shutdown.shutdown() {
                    tracing::warn!(signal, "Shutdown requested, draining workers");
                } else {
                    tracing::debug!(signal, "Shutdown already in progress");
                }
            }
        })
        .map_err(|e| MirrorCopyError::ThreadPoolError(e.to_string()))?;

    Ok(SignalGuard {
        handle,
        thread: Some(thread),
    })
}

/// Signal routing is only available on unix; elsewhere this is a no-op
#[cfg(not(unix))]
pub fn install_shutdown_handler(_shutdown: ShutdownHandle) -> Result<SignalGuard> {
    tracing::debug!("Signal handling not supported on this platform");
    Ok(SignalGuard { thread: None })
}
