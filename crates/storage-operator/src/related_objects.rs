//! Publishes the driver starter's related objects on ClusterOperator/storage

use std::time::Duration;

use async_trait::async_trait;
use kube::api::{Api, Patch, PatchParams};
use kube::{Client, ResourceExt};
use tracing::{debug, info, warn};

#[cfg(test)]
use mockall::automock;

use storage_common::crd::{ClusterOperator, RelatedObject};
use storage_common::{Error, CLUSTER_OPERATOR_NAME, FIELD_MANAGER};
use storage_driver_starter::Supervisor;

/// Related objects as last read, with the version they were read at
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RelatedObjectsSnapshot {
    /// resourceVersion of the ClusterOperator when read
    pub resource_version: Option<String>,
    /// Current `status.relatedObjects`
    pub objects: Vec<RelatedObject>,
}

/// Reads and writes `status.relatedObjects` of ClusterOperator/storage
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterOperatorClient: Send + Sync {
    /// Current related objects, `None` when the ClusterOperator does not exist yet
    async fn related_objects(&self) -> Result<Option<RelatedObjectsSnapshot>, Error>;

    /// Replace the related objects. With a `resource_version` the write
    /// fails with a conflict if the ClusterOperator changed since it was read.
    async fn patch_related_objects(
        &self,
        resource_version: Option<String>,
        objects: &[RelatedObject],
    ) -> Result<(), Error>;
}

/// Real Kubernetes client implementation
pub struct KubeClusterOperatorClient {
    client: Client,
}

impl KubeClusterOperatorClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterOperatorClient for KubeClusterOperatorClient {
    async fn related_objects(&self) -> Result<Option<RelatedObjectsSnapshot>, Error> {
        let api: Api<ClusterOperator> = Api::all(self.client.clone());
        Ok(api
            .get_opt(CLUSTER_OPERATOR_NAME)
            .await?
            .map(|co| RelatedObjectsSnapshot {
                resource_version: co.resource_version(),
                objects: co.status.map(|s| s.related_objects).unwrap_or_default(),
            }))
    }

    async fn patch_related_objects(
        &self,
        resource_version: Option<String>,
        objects: &[RelatedObject],
    ) -> Result<(), Error> {
        let api: Api<ClusterOperator> = Api::all(self.client.clone());
        let patch = related_objects_patch(resource_version.as_deref(), objects);
        api.patch_status(
            CLUSTER_OPERATOR_NAME,
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Merge(&patch),
        )
        .await?;
        Ok(())
    }
}

/// Merge patch replacing `status.relatedObjects`, guarded by
/// `resource_version` when given
fn related_objects_patch(
    resource_version: Option<&str>,
    objects: &[RelatedObject],
) -> serde_json::Value {
    let mut patch = serde_json::json!({
        "status": { "relatedObjects": objects }
    });
    if let Some(rv) = resource_version {
        patch["metadata"] = serde_json::json!({ "resourceVersion": rv });
    }
    patch
}

/// Append the entries of `ours` missing from `current`.
///
/// Returns `None` when `current` already lists all of them.
pub fn merge_related_objects(
    current: &[RelatedObject],
    ours: &[RelatedObject],
) -> Option<Vec<RelatedObject>> {
    let missing: Vec<&RelatedObject> = ours.iter().filter(|o| !current.contains(o)).collect();
    if missing.is_empty() {
        return None;
    }
    let mut merged = current.to_vec();
    merged.extend(missing.into_iter().cloned());
    Some(merged)
}

/// Publish once. Returns true if the ClusterOperator was patched.
///
/// A concurrent change to the ClusterOperator makes the write conflict; it
/// is skipped and retried with fresh data on the next call.
pub async fn publish_related_objects<F>(
    client: &dyn ClusterOperatorClient,
    accessor: &F,
) -> Result<bool, Error>
where
    F: Fn() -> (bool, Vec<RelatedObject>),
{
    let (has_any, ours) = accessor();
    if !has_any {
        return Ok(false);
    }

    let Some(current) = client.related_objects().await? else {
        debug!(
            cluster_operator = CLUSTER_OPERATOR_NAME,
            "ClusterOperator not created yet, deferring related objects"
        );
        return Ok(false);
    };

    let Some(merged) = merge_related_objects(&current.objects, &ours) else {
        return Ok(false);
    };

    match client
        .patch_related_objects(current.resource_version, &merged)
        .await
    {
        Ok(()) => {
            info!(count = merged.len(), "Published related objects");
            Ok(true)
        }
        Err(e) if e.is_conflict() => {
            debug!(
                cluster_operator = CLUSTER_OPERATOR_NAME,
                "ClusterOperator changed since read, retrying related objects later"
            );
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// Start the background publisher under `supervisor`. It stops when the
/// supervisor is shut down.
pub fn start_related_objects_publisher<F>(
    supervisor: &Supervisor,
    client: std::sync::Arc<dyn ClusterOperatorClient>,
    accessor: F,
    interval: Duration,
) where
    F: Fn() -> (bool, Vec<RelatedObject>) + Send + Sync + 'static,
{
    let cancel = supervisor.cancellation();
    supervisor.spawn("related-objects-publisher", async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = ticker.tick() => {}
            }
            if let Err(e) = publish_related_objects(client.as_ref(), &accessor).await {
                warn!(error = %e, "Failed to publish related objects");
            }
        }
    });
}
