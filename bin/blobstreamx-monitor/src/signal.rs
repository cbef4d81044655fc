use tokio_util::sync::CancellationToken;

/// Cancel `cancel` on the first `SIGINT` or `SIGTERM`.
///
/// Returns early if `cancel` fires first.
pub(crate) async fn trap_signal(cancel: CancellationToken) {
    let received = tokio::select! {
        _ = cancel.cancelled() => return,
        received = wait_for_signal() => received,
    };

    match received {
        Ok(name) => {
            vlog::info!("received {name}, shutting down");
            cancel.cancel();
        }
        Err(e) => vlog::error!("failed to listen for termination signals: {e}"),
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;

    tokio::select! {
        res = tokio::signal::ctrl_c() => res.map(|()| "SIGINT"),
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|()| "ctrl-c")
}
