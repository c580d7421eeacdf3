//! Bundle lifecycle: sub-controllers, controller managers, and the task
//! supervisor they run under
//!
//! A bundle is started at most once and never stopped individually. All
//! bundle tasks share the supervisor's root cancellation token, so process
//! shutdown is the only way they end.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, info_span, Instrument};

/// A long-running controller inside a bundle
#[async_trait]
pub trait SubController: Send + Sync {
    /// Name used for logging and task tracking
    fn name(&self) -> &str;

    /// Run until `cancel` fires
    async fn run(&self, cancel: CancellationToken);
}

/// Tracks every bundle task and owns the root cancellation token
#[derive(Clone, Debug, Default)]
pub struct Supervisor {
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl Supervisor {
    /// Create a supervisor with a fresh root token
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a named task. It is not joined by the caller.
    pub fn spawn<F>(&self, name: &str, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let span = info_span!("controller", name = %name);
        self.tracker.spawn(fut.instrument(span));
    }

    /// Token every spawned task observes
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Signal all tasks to stop
    pub fn shutdown(&self) {
        info!(tasks = self.tracker.len(), "Stopping driver controllers");
        self.cancel.cancel();
    }

    /// Wait for every spawned task to finish. No tasks may be spawned after this.
    pub async fn wait(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }

    /// Number of tasks still running
    pub fn len(&self) -> usize {
        self.tracker.len()
    }

    /// Whether no tasks are running
    pub fn is_empty(&self) -> bool {
        self.tracker.is_empty()
    }
}

/// Something that can be started once and then runs in the background
pub trait BundleLifecycle: Send + Sync {
    /// Start all controllers of the bundle under `supervisor`. Returns
    /// without waiting for them.
    fn start(&self, supervisor: &Supervisor);
}

/// Ordered group of sub-controllers started together
pub struct ControllerManager {
    name: String,
    controllers: Vec<Arc<dyn SubController>>,
}

impl ControllerManager {
    /// Create an empty manager
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            controllers: Vec::new(),
        }
    }

    /// Append a controller; start order follows insertion order
    pub fn with_controller(mut self, controller: Arc<dyn SubController>) -> Self {
        self.controllers.push(controller);
        self
    }

    /// Manager name (the bundle's condition prefix)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Names of all controllers, in start order
    pub fn controller_names(&self) -> Vec<&str> {
        self.controllers.iter().map(|c| c.name()).collect()
    }
}

impl BundleLifecycle for ControllerManager {
    fn start(&self, supervisor: &Supervisor) {
        info!(
            bundle = %self.name,
            controllers = self.controllers.len(),
            "Starting controller manager"
        );
        for controller in &self.controllers {
            let controller = Arc::clone(controller);
            let cancel = supervisor.cancellation();
            let name = controller.name().to_string();
            supervisor.spawn(&name, async move {
                controller.run(cancel).await;
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingController {
        name: String,
        runs: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SubController for CountingController {
        fn name(&self) -> &str {
            &self.name
        }

        async fn run(&self, cancel: CancellationToken) {
            self.runs.fetch_add(1, Ordering::SeqCst);
            cancel.cancelled().await;
        }
    }

    fn counting(name: &str, runs: &Arc<AtomicUsize>) -> Arc<dyn SubController> {
        Arc::new(CountingController {
            name: name.to_string(),
            runs: Arc::clone(runs),
        })
    }

    #[test]
    fn controller_names_keep_insertion_order() {
        let runs = Arc::new(AtomicUsize::new(0));
        let manager = ControllerManager::new("AWSEBS")
            .with_controller(counting("AWSEBSCSIDriverOperatorStaticController", &runs))
            .with_controller(counting("AWSEBSCSIDriverOperatorCRController", &runs));

        assert_eq!(manager.name(), "AWSEBS");
        assert_eq!(
            manager.controller_names(),
            vec![
                "AWSEBSCSIDriverOperatorStaticController",
                "AWSEBSCSIDriverOperatorCRController"
            ]
        );
    }

    #[tokio::test]
    async fn start_runs_every_controller_until_shutdown() {
        let runs = Arc::new(AtomicUsize::new(0));
        let manager = ControllerManager::new("X")
            .with_controller(counting("a", &runs))
            .with_controller(counting("b", &runs));
        let supervisor = Supervisor::new();

        manager.start(&supervisor);
        assert_eq!(supervisor.len(), 2);

        // Let the spawned tasks record their run
        while runs.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }

        supervisor.shutdown();
        supervisor.wait().await;
        assert!(supervisor.is_empty());
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn shutdown_cancels_shared_token() {
        let supervisor = Supervisor::new();
        let token = supervisor.clone().cancellation();

        supervisor.shutdown();
        assert!(token.is_cancelled());
    }
}
