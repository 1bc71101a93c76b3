use tokio::signal;

/// Resolves once the worker should stop claiming submissions: Ctrl+C in the
/// foreground, or SIGTERM from the process supervisor.
pub(crate) async fn shutdown_signal() {
    let ctrl_c = signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(stream) => stream,
            Err(err) => {
                tracing::error!(error = %err, "SIGTERM handler unavailable, waiting on Ctrl+C only");
                if let Err(err) = ctrl_c.await {
                    tracing::error!(error = %err, "Ctrl+C handler failed");
                }
                tracing::info!("shutdown signal received, draining workers");
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {}
            result = ctrl_c => {
                if let Err(err) = result {
                    tracing::error!(error = %err, "Ctrl+C handler failed");
                }
            }
        }
        tracing::info!("shutdown signal received, draining workers");
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(error = %err, "Ctrl+C handler failed");
        }
        tracing::info!("shutdown signal received, draining workers");
    }
}
