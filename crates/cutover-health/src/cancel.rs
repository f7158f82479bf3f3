//! Cancellation signal shared by long-running steps.
//!
//! A `watch::Receiver<bool>` flips to `true` once cancellation is
//! requested. A dropped sender means nobody can cancel any more.

use std::future::Future;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// True if cancellation has already been requested.
pub fn is_cancelled(rx: &watch::Receiver<bool>) -> bool {
    *rx.borrow()
}

/// Resolves once cancellation is requested. Never resolves if the sender
/// is gone.
pub async fn cancelled(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|c| *c).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "could not listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "could not listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("termination requested");
}

/// Request cancellation on `tx` once `signal` resolves. Abort the returned
/// task if the guarded work finishes first.
pub fn cancel_on<F>(signal: F, tx: watch::Sender<bool>) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        signal.await;
        warn!("cancelling in-flight run");
        let _ = tx.send(true);
    })
}
