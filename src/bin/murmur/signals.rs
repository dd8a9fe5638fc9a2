use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, Ordering};

/// Flag set by the SIGINT/SIGTERM handler to request a clean stop.
static STOP_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Only touches an atomic (async-signal-safe).
extern "C" fn handle_stop_signal(_: libc::c_int) {
    STOP_REQUESTED.store(true, Ordering::SeqCst);
}

pub(crate) fn install_stop_handlers() -> Result<()> {
    for signal in [libc::SIGINT, libc::SIGTERM] {
        unsafe {
            // SAFETY: handle_stop_signal is an extern "C" signal handler with no side
            // effects beyond flipping an atomic flag, which is async-signal-safe.
            let handler = handle_stop_signal as *const () as libc::sighandler_t;
            if libc::signal(signal, handler) == libc::SIG_ERR {
                return Err(anyhow!("failed to install handler for signal {signal}"));
            }
        }
    }
    Ok(())
}

pub(crate) fn stop_requested() -> bool {
    STOP_REQUESTED.load(Ordering::SeqCst)
}
