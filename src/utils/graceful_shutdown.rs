use tokio::signal;

/// Resolves when SIGINT (Ctrl+C) or SIGTERM arrives; handed to the server's
/// graceful-shutdown hook so in-flight forwards drain before exit.
pub async fn shutdown_signal() {
    tokio::select! {
        _ = signal::ctrl_c() => {
            tracing::info!("Received SIGINT (Ctrl+C), initiating graceful shutdown...");
        }
        _ = wait_for_sigterm() => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

#[cfg(unix)]
async fn wait_for_sigterm() {
    use tokio::signal::unix::{SignalKind, signal};
    let mut sigterm = signal(SignalKind::terminate()).expect("Failed to register SIGTERM handler");
    sigterm.recv().await;
}

#[cfg(not(unix))]
async fn wait_for_sigterm() {
    // On non-Unix systems, we only have Ctrl+C
    std::future::pending::<()>().await;
}
