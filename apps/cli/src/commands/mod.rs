//! Command implementations for the Lorafy CLI.

pub mod config;
pub mod normalize;
pub mod status;
pub mod train;

use tokio::signal;
use tokio_util::sync::CancellationToken;

/// A token that is cancelled when the user presses Ctrl-C.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if let Ok(()) = signal::ctrl_c().await {
            on_signal.cancel();
        }
    });
    cancel
}
