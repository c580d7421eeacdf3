//! ClusterCSIDriver sub-controller: keeps the bundle's per-driver object present

use std::time::Duration;

use async_trait::async_trait;
use kube::api::{Api, PostParams};
use kube::Client;
use tokio_util::sync::CancellationToken;
use tracing::info;

use storage_common::crd::{ClusterCSIDriver, ClusterCSIDriverSpec, ManagementState};
use storage_common::Result;

use super::run_periodically;
use crate::manager::SubController;

/// ClusterCSIDriver created for a driver that has none yet
pub fn desired_cluster_csi_driver(csi_driver_name: &str) -> ClusterCSIDriver {
    ClusterCSIDriver::new(
        csi_driver_name,
        ClusterCSIDriverSpec {
            management_state: Some(ManagementState::Managed),
        },
    )
}

/// Creates the driver's ClusterCSIDriver when missing. An existing object is
/// left untouched: its spec belongs to the cluster admin.
pub struct ClusterCsiDriverController {
    name: String,
    csi_driver_name: String,
    client: Client,
    resync: Duration,
}

impl ClusterCsiDriverController {
    /// Create a controller for `csi_driver_name`
    pub fn new(name: String, csi_driver_name: String, client: Client, resync: Duration) -> Self {
        Self {
            name,
            csi_driver_name,
            client,
            resync,
        }
    }

    async fn sync(&self) -> Result<()> {
        let api: Api<ClusterCSIDriver> = Api::all(self.client.clone());
        if api.get_opt(&self.csi_driver_name).await?.is_some() {
            return Ok(());
        }

        let obj = desired_cluster_csi_driver(&self.csi_driver_name);
        match api.create(&PostParams::default(), &obj).await {
            Ok(_) => {
                info!(driver = %self.csi_driver_name, "Created ClusterCSIDriver");
                Ok(())
            }
            // Created concurrently since the get
            Err(kube::Error::Api(ae)) if ae.code == 409 => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl SubController for ClusterCsiDriverController {
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
    use kube::ResourceExt;

    #[test]
    fn desired_object_is_named_after_driver_and_managed() {
        let obj = desired_cluster_csi_driver("ebs.csi.aws.com");
        assert_eq!(obj.name_any(), "ebs.csi.aws.com");
        assert_eq!(obj.spec.management_state, Some(ManagementState::Managed));
        assert!(obj.metadata.namespace.is_none());
    }

    #[test]
    fn desired_object_serializes_api_shape() {
        let value = serde_json::to_value(desired_cluster_csi_driver("x")).unwrap();
        assert_eq!(value["apiVersion"], "operator.openshift.io/v1");
        assert_eq!(value["kind"], "ClusterCSIDriver");
        assert_eq!(value["spec"]["managementState"], "Managed");
    }
}
