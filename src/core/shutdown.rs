//! # Termination signals for the lifecycle manager.
//!
//! [`Supervisor::run`](crate::Supervisor::run) races the termination channel
//! against [`shutdown_requested`]. When it fires, every live app is stopped
//! (see [`Supervisor::stop_all`](crate::Supervisor::stop_all)) and `run` returns.
//!
//! Unix listens for SIGINT, SIGTERM and SIGQUIT; other platforms for Ctrl-C.
//! With `Config::handle_signals = false`, or when the listeners cannot be
//! registered, the future never completes and only the supervisor's own
//! cancellation ends `run`.

use std::io;

/// Completes when the process is asked to terminate.
pub(crate) async fn shutdown_requested(enabled: bool) {
    if !enabled {
        return std::future::pending().await;
    }
    if let Err(e) = os_signal().await {
        eprintln!("[appvisor] signal handlers unavailable: {e}");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn os_signal() -> io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut int = signal(SignalKind::interrupt())?;
    let mut term = signal(SignalKind::terminate())?;
    let mut quit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = int.recv() => {},
        _ = term.recv() => {},
        _ = quit.recv() => {},
    }
    Ok(())
}

#[cfg(not(unix))]
async fn os_signal() -> io::Result<()> {
    tokio::signal::ctrl_c().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_disabled_never_fires() {
        let fired = tokio::time::timeout(Duration::from_secs(60), shutdown_requested(false)).await;
        assert!(fired.is_err());
    }
}
