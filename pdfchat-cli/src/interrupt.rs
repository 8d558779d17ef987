//! Ctrl-C handling scoped to a single operation.
//!
//! Listening for SIGINT replaces the default handler for the rest of the
//! process, so every long-running await in the binary goes through
//! [`or_interrupt`] instead of relying on the signal killing the process.

use std::future::Future;

use tracing::warn;

/// Resolves when Ctrl-C is pressed. Never resolves if the handler cannot be installed.
pub async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

/// Drive `task` to completion unless `interrupt` resolves first.
///
/// Returns `None` when interrupted; `task` is dropped at that point unless
/// the caller passed it by reference.
pub async fn or_interrupt<F, I>(task: F, interrupt: I) -> Option<F::Output>
where
    F: Future,
    I: Future<Output = ()>,
{
    tokio::select! {
        biased;
        output = task => Some(output),
        () = interrupt => None,
    }
}
