//! OS termination signals for [`Runtime::run_until_signal`](crate::Runtime::run_until_signal).
//!
//! Unix listens for `SIGINT`, `SIGTERM` and `SIGQUIT`; other platforms only for Ctrl-C.

use crate::error::RuntimeError;

/// Resolves with the name of the first termination signal received.
#[cfg(unix)]
pub(crate) async fn termination() -> Result<&'static str, RuntimeError> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut quit = signal(SignalKind::quit())?;

    let name = tokio::select! {
        _ = interrupt.recv() => "SIGINT",
        _ = terminate.recv() => "SIGTERM",
        _ = quit.recv() => "SIGQUIT",
    };
    Ok(name)
}

/// Resolves with the name of the first termination signal received.
#[cfg(not(unix))]
pub(crate) async fn termination() -> Result<&'static str, RuntimeError> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl_c")
}
