//! Immediate-then-periodic background loops with a stop signal.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Handle to a spawned loop that runs a pass, sleeps, and repeats.
///
/// Passes never overlap. Stopping interrupts the current pass or sleep at
/// its next suspension point. Dropping the handle without calling
/// [`PeriodicTask::stop`] detaches the loop, which then runs until the
/// runtime shuts down.
pub struct PeriodicTask {
    name: String,
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    /// Spawn a loop calling `pass` immediately and then every `interval`.
    pub fn spawn<F, Fut>(name: impl Into<String>, interval: Duration, mut pass: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let task_name = name.clone();

        let handle = tokio::spawn(async move {
            info!(task = %task_name, interval_secs = interval.as_secs_f64(), "started");
            loop {
                tokio::select! {
                    _ = pass() => {}
                    _ = stop_requested(&mut stop_rx) => break,
                }
                debug!(task = %task_name, "pass complete");

                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = stop_requested(&mut stop_rx) => break,
                }
            }
            info!(task = %task_name, "stopped");
        });

        Self {
            name,
            stop_tx,
            handle,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Signal the loop to stop and wait for it to exit.
    pub async fn stop(self) {
        // Send fails only if the loop already exited.
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.handle.await {
            warn!(task = %self.name, error = %e, "task ended abnormally");
        }
    }
}

/// Resolves once a stop is signalled. A dropped sender never resolves.
async fn stop_requested(stop_rx: &mut watch::Receiver<bool>) {
    if stop_rx.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}
