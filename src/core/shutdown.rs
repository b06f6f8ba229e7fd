//! # Termination signals for long-running schedulers.
//!
//! [`wait_for_signal`] completes on the first of `SIGINT`, `SIGTERM` or `SIGQUIT`
//! (Unix) or `Ctrl-C` (elsewhere). [`ActorScheduler::run_until_signal`](crate::ActorScheduler::run_until_signal)
//! pairs it with a graceful shutdown.

#[cfg(unix)]
pub(crate) async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        res = tokio::signal::ctrl_c() => res?,
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

#[cfg(not(unix))]
pub(crate) async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
