//! The three periodic background loops: rule evaluation, reliable webhook
//! dispatch, and event retention pruning.

pub mod dispatcher;
pub mod retention;
pub mod rule_evaluator;

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Handle to one spawned worker loop. Dropping it does not stop the worker —
/// call `shutdown` for a graceful stop, or simply let it run for the life of
/// the process.
pub struct WorkerHandle {
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl WorkerHandle {
    fn spawn<F, Fut>(run: F) -> Self
    where
        F: FnOnce(watch::Receiver<bool>) -> Fut,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let (shutdown, rx) = watch::channel(false);
        let join = tokio::spawn(run(rx));
        Self { shutdown, join }
    }

    /// Signals the loop to stop after its current iteration and waits for it
    /// to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.join.await;
    }
}
