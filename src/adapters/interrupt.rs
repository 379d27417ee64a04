//! Ctrl-C handling for interactive runs.
//!
//! The engine is synchronous, so the signal is awaited on a helper thread
//! driving a single-threaded tokio runtime.

use std::thread;

use tracing::{error, warn};

use crate::domain::backtest::CancelFlag;
use crate::domain::error::EngineError;

/// Raises `cancel` on the first Ctrl-C. The run then stops before its next
/// bar and reports what it has so far.
pub fn cancel_on_interrupt(cancel: &CancelFlag) -> Result<(), EngineError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let cancel = cancel.clone();

    thread::Builder::new()
        .name("ctrl-c".into())
        .spawn(move || {
            runtime.block_on(async {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        warn!("interrupt received, stopping after the current bar");
                        cancel.cancel();
                    }
                    Err(e) => error!(error = %e, "failed to listen for ctrl-c"),
                }
            });
        })?;
    Ok(())
}
