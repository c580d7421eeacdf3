//! Degraded condition on Storage/cluster
//!
//! A failed driver-starter sync sets `CSIDriverStarterDegraded=True` with the
//! error text; the next successful sync flips it back to `False`. The status
//! is only patched when the condition actually changes.

use async_trait::async_trait;
use kube::api::{Api, Patch, PatchParams};
use kube::{Client, ResourceExt};
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use storage_common::crd::{set_condition, ConditionStatus, OperatorCondition, Storage};
use storage_common::{Error, FIELD_MANAGER};

/// Condition type owned by the driver starter
pub const DEGRADED_CONDITION: &str = "CSIDriverStarterDegraded";

/// Reason used when the driver starter is healthy
pub const REASON_AS_EXPECTED: &str = "AsExpected";

/// Reason used when a sync failed
pub const REASON_SYNC_ERROR: &str = "SyncError";

/// Writes Storage status conditions
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StorageStatusClient: Send + Sync {
    /// Replace the conditions of the named Storage object
    async fn patch_conditions(
        &self,
        name: &str,
        conditions: &[OperatorCondition],
    ) -> Result<(), Error>;
}

/// Real Kubernetes client implementation
pub struct KubeStorageStatusClient {
    client: Client,
}

impl KubeStorageStatusClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StorageStatusClient for KubeStorageStatusClient {
    async fn patch_conditions(
        &self,
        name: &str,
        conditions: &[OperatorCondition],
    ) -> Result<(), Error> {
        let api: Api<Storage> = Api::all(self.client.clone());
        let patch = serde_json::json!({
            "status": { "conditions": conditions }
        });
        api.patch_status(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }
}

/// Degraded condition for a sync result
pub fn degraded_condition(failure: Option<&Error>) -> OperatorCondition {
    match failure {
        Some(e) => OperatorCondition::new(
            DEGRADED_CONDITION,
            ConditionStatus::True,
            REASON_SYNC_ERROR,
            e.to_string(),
        ),
        None => OperatorCondition::new(
            DEGRADED_CONDITION,
            ConditionStatus::False,
            REASON_AS_EXPECTED,
            "",
        ),
    }
}

/// Record the outcome of a sync on the Storage status
pub async fn report_degraded(
    client: &dyn StorageStatusClient,
    storage: &Storage,
    failure: Option<&Error>,
) -> Result<(), Error> {
    let mut conditions = storage
        .status
        .as_ref()
        .map(|s| s.conditions.clone())
        .unwrap_or_default();

    if !set_condition(&mut conditions, degraded_condition(failure)) {
        return Ok(());
    }

    let name = storage.name_any();
    debug!(storage = %name, degraded = failure.is_some(), "Updating degraded condition");
    client.patch_conditions(&name, &conditions).await
}
