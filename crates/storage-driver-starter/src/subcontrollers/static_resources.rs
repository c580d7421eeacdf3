//! Static-resource sub-controller: applies a bundle's manifests

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kube::Client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[cfg(test)]
use mockall::automock;

use storage_common::kube_utils::apply_manifests;
use storage_common::{Error, Result};

use super::run_periodically;
use crate::manager::SubController;

/// Source of static manifest files, keyed by relative path
pub trait AssetSource: Send + Sync {
    /// Load the asset at `name`
    fn load(&self, name: &str) -> Result<String>;
}

/// Assets read from a directory on disk
#[derive(Clone, Debug)]
pub struct DirAssetSource {
    root: PathBuf,
}

impl DirAssetSource {
    /// Serve assets from `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AssetSource for DirAssetSource {
    fn load(&self, name: &str) -> Result<String> {
        let path = self.root.join(name);
        std::fs::read_to_string(&path).map_err(|e| {
            Error::internal_with_context(
                "load_asset",
                format!("failed to read {}: {}", path.display(), e),
            )
        })
    }
}

impl AssetSource for BTreeMap<String, String> {
    fn load(&self, name: &str) -> Result<String> {
        self.get(name)
            .cloned()
            .ok_or_else(|| Error::not_found("asset", name))
    }
}

/// Applies manifests to the cluster
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ManifestApplier: Send + Sync {
    /// Apply every document in `manifests`
    async fn apply(&self, manifests: &str) -> Result<()>;
}

/// Server-side apply through the API server
pub struct KubeManifestApplier {
    client: Client,
}

impl KubeManifestApplier {
    /// Create an applier using `client`
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ManifestApplier for KubeManifestApplier {
    async fn apply(&self, manifests: &str) -> Result<()> {
        apply_manifests(&self.client, manifests).await
    }
}

/// Keeps a bundle's static manifests applied
pub struct StaticResourceController {
    name: String,
    assets: Vec<String>,
    source: Arc<dyn AssetSource>,
    applier: Arc<dyn ManifestApplier>,
    resync: Duration,
}

impl StaticResourceController {
    /// Create a controller applying `assets` loaded from `source`
    pub fn new(
        name: String,
        assets: Vec<String>,
        source: Arc<dyn AssetSource>,
        applier: Arc<dyn ManifestApplier>,
        resync: Duration,
    ) -> Self {
        Self {
            name,
            assets,
            source,
            applier,
            resync,
        }
    }

    /// Apply every asset once.
    ///
    /// A failing asset does not stop the others; the first error is returned
    /// after all assets were attempted.
    pub async fn sync(&self) -> Result<()> {
        let mut failures = Vec::new();

        for asset in &self.assets {
            let result = match self.source.load(asset) {
                Ok(manifests) => self.applier.apply(&manifests).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => debug!(asset = %asset, "Applied static asset"),
                Err(e) => {
                    warn!(asset = %asset, error = %e, "Failed to apply static asset");
                    failures.push(format!("{}: {}", asset, e));
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::internal_with_context(
                self.name.clone(),
                failures.join("; "),
            ))
        }
    }
}

#[async_trait]
impl SubController for StaticResourceController {
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

    fn assets() -> Arc<dyn AssetSource> {
        Arc::new(BTreeMap::from([
            (
                "sa.yaml".to_string(),
                "apiVersion: v1\nkind: ServiceAccount\nmetadata:\n  name: a\n".to_string(),
            ),
            (
                "role.yaml".to_string(),
                "apiVersion: rbac.authorization.k8s.io/v1\nkind: Role\nmetadata:\n  name: r\n"
                    .to_string(),
            ),
        ]))
    }

    fn controller(names: &[&str], applier: MockManifestApplier) -> StaticResourceController {
        StaticResourceController::new(
            "TestCSIDriverOperatorStaticController".to_string(),
            names.iter().map(|s| s.to_string()).collect(),
            assets(),
            Arc::new(applier),
            Duration::from_secs(60),
        )
    }

    // =========================================================================
    // Asset sources
    // =========================================================================

    #[test]
    fn dir_asset_source_reads_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("csidriveroperators/aws-ebs")).unwrap();
        std::fs::write(
            dir.path().join("csidriveroperators/aws-ebs/01_sa.yaml"),
            "kind: ServiceAccount",
        )
        .unwrap();

        let source = DirAssetSource::new(dir.path());
        assert_eq!(
            source.load("csidriveroperators/aws-ebs/01_sa.yaml").unwrap(),
            "kind: ServiceAccount"
        );
        assert!(source.load("missing.yaml").is_err());
    }

    #[test]
    fn map_asset_source_reports_missing_asset() {
        let err = assets().load("nope.yaml").unwrap_err();
        assert!(err.is_not_found());
    }

    // =========================================================================
    // Sync
    // =========================================================================

    #[tokio::test]
    async fn sync_applies_every_asset() {
        let mut applier = MockManifestApplier::new();
        applier.expect_apply().times(2).returning(|_| Ok(()));

        controller(&["sa.yaml", "role.yaml"], applier)
            .sync()
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn sync_continues_past_failures() {
        let mut applier = MockManifestApplier::new();
        applier
            .expect_apply()
            .withf(|m: &str| m.contains("ServiceAccount"))
            .times(1)
            .returning(|_| Err(Error::internal("apply rejected")));
        applier
            .expect_apply()
            .withf(|m: &str| m.contains("Role"))
            .times(1)
            .returning(|_| Ok(()));

        let err = controller(&["sa.yaml", "missing.yaml", "role.yaml"], applier)
            .sync()
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("sa.yaml"));
        assert!(msg.contains("missing.yaml"));
        assert!(!msg.contains("role.yaml"));
    }

    #[tokio::test]
    async fn run_stops_on_cancellation() {
        let mut applier = MockManifestApplier::new();
        applier.expect_apply().returning(|_| Ok(()));
        let ctrl = controller(&["sa.yaml"], applier);

        let cancel = CancellationToken::new();
        cancel.cancel();
        ctrl.run(cancel).await;
        assert_eq!(ctrl.name(), "TestCSIDriverOperatorStaticController");
    }
}
