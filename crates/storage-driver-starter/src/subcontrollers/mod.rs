//! Sub-controllers every driver bundle is composed of
//!
//! Each bundle runs, in order:
//! 1. `<prefix>CSIDriverOperatorStaticController` - applies the bundle's
//!    static manifests
//! 2. `<prefix>CSIDriverOperatorCRController` - keeps the bundle's
//!    ClusterCSIDriver object present
//! 3. `<prefix>CSIDriverOperatorDeploymentController` - keeps the driver
//!    operator Deployment applied
//! 4. the descriptor's OLM removal controller, when it has one
//! 5. any extra controllers from the descriptor

mod cluster_csi_driver;
mod deployment;
mod static_resources;

pub use cluster_csi_driver::{desired_cluster_csi_driver, ClusterCsiDriverController};
pub use deployment::DeploymentController;
pub use static_resources::{
    AssetSource, DirAssetSource, KubeManifestApplier, ManifestApplier, StaticResourceController,
};

#[cfg(test)]
pub use static_resources::MockManifestApplier;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use kube::Client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use storage_common::Result;

use crate::config::DriverConfig;
use crate::manager::ControllerManager;

/// Default interval between sub-controller syncs
pub const DEFAULT_RESYNC_INTERVAL: Duration = Duration::from_secs(60);

/// Run `sync` immediately and then every `resync` until `cancel` fires.
///
/// Errors are logged and retried on the next tick.
pub async fn run_periodically<F, Fut>(
    name: &str,
    resync: Duration,
    cancel: CancellationToken,
    mut sync: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    loop {
        match sync().await {
            Ok(()) => debug!(controller = %name, "Sync complete"),
            Err(e) => warn!(controller = %name, error = %e, "Sync failed, retrying"),
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(controller = %name, "Controller stopped");
                return;
            }
            _ = tokio::time::sleep(resync) => {}
        }
    }
}

/// Name of a bundle's static-resource controller
pub fn static_controller_name(prefix: &str) -> String {
    format!("{}CSIDriverOperatorStaticController", prefix)
}

/// Name of a bundle's ClusterCSIDriver controller
pub fn cr_controller_name(prefix: &str) -> String {
    format!("{}CSIDriverOperatorCRController", prefix)
}

/// Name of a bundle's Deployment controller
pub fn deployment_controller_name(prefix: &str) -> String {
    format!("{}CSIDriverOperatorDeploymentController", prefix)
}

/// Shared dependencies used to build every bundle
#[derive(Clone)]
pub struct BundleDeps {
    client: Client,
    assets: Arc<dyn AssetSource>,
    resync: Duration,
}

impl BundleDeps {
    /// Create bundle dependencies
    pub fn new(client: Client, assets: Arc<dyn AssetSource>) -> Self {
        Self {
            client,
            assets,
            resync: DEFAULT_RESYNC_INTERVAL,
        }
    }

    /// Override the sub-controller resync interval
    pub fn with_resync(mut self, resync: Duration) -> Self {
        self.resync = resync;
        self
    }

    /// Build the controller manager of one driver bundle
    pub fn controller_manager(&self, cfg: &DriverConfig) -> ControllerManager {
        let applier: Arc<dyn ManifestApplier> =
            Arc::new(KubeManifestApplier::new(self.client.clone()));

        let mut manager = ControllerManager::new(&cfg.condition_prefix)
            .with_controller(Arc::new(StaticResourceController::new(
                static_controller_name(&cfg.condition_prefix),
                cfg.static_assets.clone(),
                Arc::clone(&self.assets),
                Arc::clone(&applier),
                self.resync,
            )))
            .with_controller(Arc::new(ClusterCsiDriverController::new(
                cr_controller_name(&cfg.condition_prefix),
                cfg.csi_driver_name.clone(),
                self.client.clone(),
                self.resync,
            )))
            .with_controller(Arc::new(DeploymentController::new(
                deployment_controller_name(&cfg.condition_prefix),
                cfg.deployment_asset.clone(),
                Arc::clone(&self.assets),
                applier,
                self.resync,
            )));

        if let Some(olm_removal) = &cfg.olm_removal {
            manager = manager.with_controller(Arc::clone(olm_removal));
        }
        for extra in &cfg.extra_controllers {
            manager = manager.with_controller(Arc::clone(extra));
        }
        manager
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use storage_common::crd::PlatformType;

    struct IdleController(&'static str);

    #[async_trait::async_trait]
    impl crate::manager::SubController for IdleController {
        fn name(&self) -> &str {
            self.0
        }

        async fn run(&self, cancel: CancellationToken) {
            cancel.cancelled().await;
        }
    }

    fn test_client() -> Client {
        let config = kube::Config::new("http://127.0.0.1:6443".parse().unwrap());
        Client::try_from(config).unwrap()
    }

    #[test]
    fn controller_names_use_prefix() {
        assert_eq!(
            static_controller_name("AWSEBS"),
            "AWSEBSCSIDriverOperatorStaticController"
        );
        assert_eq!(
            cr_controller_name("AWSEBS"),
            "AWSEBSCSIDriverOperatorCRController"
        );
        assert_eq!(
            deployment_controller_name("AWSEBS"),
            "AWSEBSCSIDriverOperatorDeploymentController"
        );
    }

    #[tokio::test]
    async fn bundle_runs_controllers_in_fixed_order() {
        let deps = BundleDeps::new(test_client(), Arc::new(BTreeMap::new()));
        let cfg = DriverConfig::new("AWSEBS", PlatformType::AWS, "ebs.csi.aws.com")
            .deployment_asset("csidriveroperators/aws-ebs/07_deployment.yaml")
            .with_extra_controller(Arc::new(IdleController("AWSEBSExtraController")))
            .with_olm_removal(Arc::new(IdleController("AWSEBSOLMRemovalController")));

        let manager = deps.controller_manager(&cfg);
        assert_eq!(
            manager.controller_names(),
            vec![
                "AWSEBSCSIDriverOperatorStaticController",
                "AWSEBSCSIDriverOperatorCRController",
                "AWSEBSCSIDriverOperatorDeploymentController",
                "AWSEBSOLMRemovalController",
                "AWSEBSExtraController",
            ]
        );
    }

    #[tokio::test]
    async fn bundle_without_olm_removal_skips_the_slot() {
        let deps = BundleDeps::new(test_client(), Arc::new(BTreeMap::new()));
        let cfg = DriverConfig::new("AzureDisk", PlatformType::Azure, "disk.csi.azure.com");

        let manager = deps.controller_manager(&cfg);
        assert_eq!(
            manager.controller_names(),
            vec![
                "AzureDiskCSIDriverOperatorStaticController",
                "AzureDiskCSIDriverOperatorCRController",
                "AzureDiskCSIDriverOperatorDeploymentController",
            ]
        );
    }

    #[tokio::test]
    async fn run_periodically_retries_until_cancelled() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();

        let task = {
            let calls = Arc::clone(&calls);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                run_periodically("test", Duration::from_millis(10), cancel, || {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n == 0 {
                            Err(storage_common::Error::internal("first sync fails"))
                        } else {
                            Ok(())
                        }
                    }
                })
                .await;
            })
        };

        // The first failure must not stop the loop
        while calls.load(Ordering::SeqCst) < 3 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        cancel.cancel();
        task.await.unwrap();

        let after_cancel = calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(calls.load(Ordering::SeqCst), after_cancel);
    }
}
