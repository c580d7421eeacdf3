//! Deployment sub-controller: keeps the driver operator Deployment applied

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use storage_common::kube_utils::{split_documents, Manifest};
use storage_common::{Error, Result};

use super::run_periodically;
use super::static_resources::{AssetSource, ManifestApplier};
use crate::manager::SubController;

const DEPLOYMENT_KIND: &str = "Deployment";

/// Applies the bundle's driver operator Deployment on every resync
pub struct DeploymentController {
    name: String,
    asset: Option<String>,
    source: Arc<dyn AssetSource>,
    applier: Arc<dyn ManifestApplier>,
    resync: Duration,
}

impl DeploymentController {
    /// Create a controller applying `asset`; `None` leaves the controller idle
    pub fn new(
        name: String,
        asset: Option<String>,
        source: Arc<dyn AssetSource>,
        applier: Arc<dyn ManifestApplier>,
        resync: Duration,
    ) -> Self {
        Self {
            name,
            asset,
            source,
            applier,
            resync,
        }
    }

    /// Apply the Deployment once. Anything other than Deployments in the
    /// asset is rejected before applying.
    pub async fn sync(&self) -> Result<()> {
        let Some(asset) = &self.asset else {
            debug!(controller = %self.name, "No deployment asset configured");
            return Ok(());
        };

        let manifests = self.source.load(asset)?;
        let mut deployments = 0;
        for document in split_documents(&manifests) {
            let manifest = Manifest::parse(document)?;
            if manifest.resource.kind != DEPLOYMENT_KIND {
                return Err(Error::internal_with_context(
                    self.name.clone(),
                    format!("{} contains a {}", asset, manifest.resource.kind),
                ));
            }
            deployments += 1;
        }
        if deployments == 0 {
            return Err(Error::internal_with_context(
                self.name.clone(),
                format!("{} contains no Deployment", asset),
            ));
        }

        self.applier.apply(&manifests).await?;
        debug!(asset = %asset, "Applied driver operator Deployment");
        Ok(())
    }
}

#[async_trait]
impl SubController for DeploymentController {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, cancel: CancellationToken) {
        run_periodically(&self.name, self.resync, cancel, || self.sync()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::subcontrollers::MockManifestApplier;

    const DEPLOYMENT: &str = r#"apiVersion: apps/v1
kind: Deployment
metadata:
  name: aws-ebs-csi-driver-operator
  namespace: openshift-cluster-csi-drivers
"#;

    fn assets() -> Arc<dyn AssetSource> {
        Arc::new(BTreeMap::from([
            ("deployment.yaml".to_string(), DEPLOYMENT.to_string()),
            (
                "sa.yaml".to_string(),
                "apiVersion: v1\nkind: ServiceAccount\nmetadata:\n  name: a\n".to_string(),
            ),
            ("empty.yaml".to_string(), "# nothing here\n".to_string()),
        ]))
    }

    fn controller(asset: Option<&str>, applier: MockManifestApplier) -> DeploymentController {
        DeploymentController::new(
            "AWSEBSCSIDriverOperatorDeploymentController".to_string(),
            asset.map(str::to_string),
            assets(),
            Arc::new(applier),
            Duration::from_secs(60),
        )
    }

    #[tokio::test]
    async fn applies_deployment_manifest() {
        let mut applier = MockManifestApplier::new();
        applier
            .expect_apply()
            .withf(|m: &str| m.contains("aws-ebs-csi-driver-operator"))
            .times(1)
            .returning(|_| Ok(()));

        controller(Some("deployment.yaml"), applier)
            .sync()
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn rejects_non_deployment_manifest_without_applying() {
        let mut applier = MockManifestApplier::new();
        applier.expect_apply().times(0);

        let err = controller(Some("sa.yaml"), applier)
            .sync()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("ServiceAccount"));
    }

    #[tokio::test]
    async fn rejects_asset_without_documents() {
        let mut applier = MockManifestApplier::new();
        applier.expect_apply().times(0);

        let err = controller(Some("empty.yaml"), applier)
            .sync()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no Deployment"));
    }

    #[tokio::test]
    async fn missing_asset_is_an_error() {
        let err = controller(Some("missing.yaml"), MockManifestApplier::new())
            .sync()
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn no_asset_is_a_noop() {
        let mut applier = MockManifestApplier::new();
        applier.expect_apply().times(0);

        controller(None, applier).sync().await.unwrap();
    }
}
