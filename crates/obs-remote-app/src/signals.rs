//! OS signal handling for graceful shutdown

use std::future::Future;

use obs_remote_core::prelude::*;
use obs_remote_core::ShutdownTrigger;
use tokio::task::JoinHandle;

/// Spawn a task that fires `trigger` on the first termination signal
pub fn spawn_signal_handler(trigger: ShutdownTrigger) -> JoinHandle<()> {
    spawn_trigger_on(wait_for_signal(), trigger)
}

fn spawn_trigger_on<F>(signal: F, trigger: ShutdownTrigger) -> JoinHandle<()>
where
    F: Future<Output = Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = signal.await {
            error!("Signal handler error: {}", e);
            warn!("Running without signal handling");
            // Dropping the trigger reads as a shutdown request.
            std::future::pending::<()>().await;
        }

        info!("Shutdown signal received");
        trigger.trigger();
    })
}

/// Wait for a termination signal
async fn wait_for_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;
        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;

        tokio::select! {
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
        }

        Ok(())
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl+C")?;
        info!("Received Ctrl+C");
        Ok(())
    }
}
