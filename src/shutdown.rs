use tokio_util::sync::CancellationToken;

/// Wait for SIGINT or SIGTERM, then cancel `token`.
///
/// If the SIGTERM handler cannot be installed only SIGINT is awaited.
pub async fn wait_for_signal(token: CancellationToken) {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => tracing::info!(signal = "SIGINT", "Shutdown signal received"),
                    _ = sigterm.recv() => tracing::info!(signal = "SIGTERM", "Shutdown signal received"),
                }
            },
            Err(err) => {
                tracing::warn!(error = %err, "Could not install SIGTERM handler");
                _ = ctrl_c.await;
                tracing::info!(signal = "SIGINT", "Shutdown signal received");
            },
        }
    }

    #[cfg(not(unix))]
    {
        _ = ctrl_c.await;
        tracing::info!(signal = "SIGINT", "Shutdown signal received");
    }

    token.cancel();
}
