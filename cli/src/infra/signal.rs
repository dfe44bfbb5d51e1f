//! Interrupt handling for a run.
//!
//! The first Ctrl-C cancels the workflow so teardown can run. A second one
//! exits immediately, leaving whatever teardown had not reached yet.

use std::future::Future;

/// Exit status after a forced second interrupt (128 + SIGINT).
pub const FORCED_EXIT_CODE: i32 = 130;

/// Resolves on the first Ctrl-C; a second one exits the process.
pub async fn shutdown_signal() {
    interrupt_then_force(tokio::signal::ctrl_c, || {
        std::process::exit(FORCED_EXIT_CODE);
    })
    .await;
}

/// Resolves when `signal` first fires. After that a background task waits
/// for the next one and calls `force`. Never resolves if the first listener
/// cannot be installed.
pub async fn interrupt_then_force<S, Fut, F>(signal: S, force: F)
where
    S: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = std::io::Result<()>> + Send + 'static,
    F: FnOnce() + Send + 'static,
{
    if let Err(e) = signal().await {
        tracing::warn!(error = %e, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::warn!("interrupted, cleaning up (Ctrl-C again to exit immediately)");
    tokio::spawn(async move {
        if signal().await.is_ok() {
            force();
        }
    });
}
