//! Cooperative cancellation
//!
//! Every run gets its own `CancellationToken`. Runs check it at each await
//! point by racing the awaited future against the token; work already
//! persisted when the token fires stays valid.

use std::future::Future;
use tokio::task::JoinHandle;
use tracing::info;

pub use tokio_util::sync::CancellationToken;

/// Runs a future unless the token fires first
///
/// # Returns
///
/// * `Some(output)` - The future completed
/// * `None` - The token was cancelled before the future completed
pub async fn cancellable<F>(token: &CancellationToken, fut: F) -> Option<F::Output>
where
    F: Future,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => None,
        output = fut => Some(output),
    }
}

/// Sleeps for `duration`, returning early with `false` if cancelled
pub async fn sleep_or_cancel(token: &CancellationToken, duration: std::time::Duration) -> bool {
    if duration.is_zero() {
        return !token.is_cancelled();
    }
    cancellable(token, tokio::time::sleep(duration))
        .await
        .is_some()
}

/// Cancels `token` when the process receives Ctrl-C
pub fn cancel_on_ctrl_c(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if result.is_ok() {
                    info!("Interrupt received, finishing current step");
                    token.cancel();
                }
            }
            _ = token.cancelled() => {}
        }
    })
}
