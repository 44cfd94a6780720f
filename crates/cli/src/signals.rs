//! Ctrl+C handling.
//!
//! Once the handler is installed SIGINT no longer kills the process. The
//! child git process still receives it from the terminal and exits; the
//! runner then sees the raised flag and reports an interrupt, which unwinds
//! to the session's cleanup.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use gitsvnmerge_core::InterruptFlag;

/// Create a new interrupt flag and register the Ctrl+C handler.
///
/// Every Ctrl+C sets the flag to `true`.
pub fn setup_signal_handlers() -> InterruptFlag {
    let flag = Arc::new(AtomicBool::new(false));
    let flag_clone = flag.clone();

    tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                break;
            }
            info!("received SIGINT (Ctrl+C)");
            flag_clone.store(true, Ordering::SeqCst);
        }
    });

    flag
}

/// Lower the flag so cleanup commands can run.
pub fn clear(flag: &InterruptFlag) {
    flag.store(false, Ordering::SeqCst);
}
