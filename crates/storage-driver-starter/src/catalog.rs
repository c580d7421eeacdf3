//! Built-in CSI driver operator descriptors
//!
//! Used when no drivers file is configured. Asset paths are relative to the
//! operator's asset directory.

use storage_common::crd::PlatformType;

use crate::config::DriverConfig;

/// Standard set of operator manifests shipped for every driver
fn operator_assets(dir: &str) -> Vec<String> {
    [
        "01_sa.yaml",
        "02_role.yaml",
        "03_rolebinding.yaml",
        "04_clusterrole.yaml",
        "05_clusterrolebinding.yaml",
    ]
    .iter()
    .map(|file| format!("csidriveroperators/{}/{}", dir, file))
    .collect()
}

/// Driver operator Deployment manifest
fn deployment_asset(dir: &str) -> String {
    format!("csidriveroperators/{}/07_deployment.yaml", dir)
}

/// All built-in driver descriptors, in evaluation order
pub fn default_drivers() -> Vec<DriverConfig> {
    vec![
        DriverConfig::new("AWSEBS", PlatformType::AWS, "ebs.csi.aws.com")
            .static_assets(operator_assets("aws-ebs"))
            .deployment_asset(deployment_asset("aws-ebs")),
        DriverConfig::new("AzureDisk", PlatformType::Azure, "disk.csi.azure.com")
            .static_assets(operator_assets("azure-disk"))
            .deployment_asset(deployment_asset("azure-disk")),
        DriverConfig::new("AzureFile", PlatformType::Azure, "file.csi.azure.com")
            .static_assets(operator_assets("azure-file"))
            .deployment_asset(deployment_asset("azure-file")),
        DriverConfig::new("GCPPD", PlatformType::GCP, "pd.csi.storage.gke.io")
            .static_assets(operator_assets("gcp-pd"))
            .deployment_asset(deployment_asset("gcp-pd")),
        DriverConfig::new(
            "GCPFilestore",
            PlatformType::GCP,
            "filestore.csi.storage.gke.io",
        )
        .require_feature_gate("GCPFilestoreCSIDriver")
        .static_assets(operator_assets("gcp-filestore"))
        .deployment_asset(deployment_asset("gcp-filestore")),
        DriverConfig::new(
            "VMwareVSphere",
            PlatformType::VSphere,
            "csi.vsphere.vmware.com",
        )
        .static_assets(operator_assets("vsphere"))
        .deployment_asset(deployment_asset("vsphere")),
        DriverConfig::new(
            "OpenStackCinder",
            PlatformType::OpenStack,
            "cinder.csi.openstack.org",
        )
        .static_assets(operator_assets("openstack-cinder"))
        .deployment_asset(deployment_asset("openstack-cinder")),
        DriverConfig::new("Manila", PlatformType::OpenStack, "manila.csi.openstack.org")
            .static_assets(operator_assets("manila"))
            .deployment_asset(deployment_asset("manila")),
        DriverConfig::new("OVirt", PlatformType::Ovirt, "csi.ovirt.org")
            .static_assets(operator_assets("ovirt"))
            .deployment_asset(deployment_asset("ovirt")),
        DriverConfig::new("IBMVPCBlock", PlatformType::IBMCloud, "vpc.block.csi.ibm.io")
            .static_assets(operator_assets("ibm-vpc-block"))
            .deployment_asset(deployment_asset("ibm-vpc-block")),
        DriverConfig::new(
            "IBMPowerVSBlock",
            PlatformType::PowerVS,
            "powervs.csi.ibm.com",
        )
        .static_assets(operator_assets("ibm-powervs-block"))
        .deployment_asset(deployment_asset("ibm-powervs-block")),
        DriverConfig::new(
            "AlibabaDisk",
            PlatformType::AlibabaCloud,
            "diskplugin.csi.alibabacloud.com",
        )
        .static_assets(operator_assets("alibaba-disk"))
        .deployment_asset(deployment_asset("alibaba-disk")),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::validate_driver_configs;

    #[test]
    fn default_catalog_is_valid() {
        validate_driver_configs(&default_drivers()).unwrap();
    }

    #[test]
    fn openstack_has_two_drivers() {
        let count = default_drivers()
            .iter()
            .filter(|d| d.platform == PlatformType::OpenStack)
            .count();
        assert_eq!(count, 2);
    }

    #[test]
    fn filestore_is_gated() {
        let drivers = default_drivers();
        let filestore = drivers
            .iter()
            .find(|d| d.condition_prefix == "GCPFilestore")
            .unwrap();
        assert_eq!(
            filestore.require_feature_gate.as_deref(),
            Some("GCPFilestoreCSIDriver")
        );
    }

    #[test]
    fn assets_are_under_driver_directory() {
        let drivers = default_drivers();
        let ebs = &drivers[0];
        assert_eq!(ebs.static_assets.len(), 5);
        assert!(ebs
            .static_assets
            .iter()
            .all(|a| a.starts_with("csidriveroperators/aws-ebs/")));
        assert_eq!(
            ebs.deployment_asset.as_deref(),
            Some("csidriveroperators/aws-ebs/07_deployment.yaml")
        );
    }

    #[test]
    fn every_driver_has_a_deployment() {
        assert!(default_drivers()
            .iter()
            .all(|d| d.deployment_asset.is_some()));
    }
}
