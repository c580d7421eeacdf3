//! Infrastructure (config.openshift.io/v1): the cluster's platform identity

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Cluster-wide infrastructure configuration. Only the status platform type
/// is consumed.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "config.openshift.io",
    version = "v1",
    kind = "Infrastructure",
    status = "InfrastructureStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct InfrastructureSpec {}

/// Observed infrastructure status
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InfrastructureStatus {
    /// Platform-specific status; absent on clusters that have not reported one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_status: Option<PlatformStatus>,
}

/// Platform-specific status block
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct PlatformStatus {
    /// Underlying infrastructure provider
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<PlatformType>,
}

/// Infrastructure provider of the cluster
///
/// Serialized with the exact strings the config API uses.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
pub enum PlatformType {
    /// Amazon Web Services
    AWS,
    /// Microsoft Azure
    Azure,
    /// Bare metal
    BareMetal,
    /// Google Cloud
    GCP,
    /// Libvirt
    Libvirt,
    /// OpenStack
    OpenStack,
    /// No integrated platform
    None,
    /// VMware vSphere
    VSphere,
    /// oVirt / RHV
    #[serde(rename = "oVirt")]
    Ovirt,
    /// IBM Cloud VPC
    IBMCloud,
    /// IBM Power Systems Virtual Server
    PowerVS,
    /// Alibaba Cloud
    AlibabaCloud,
    /// Nutanix
    Nutanix,
    /// External platform integration
    External,
    /// Any platform string this build does not know
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for PlatformType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::AWS => "AWS",
            Self::Azure => "Azure",
            Self::BareMetal => "BareMetal",
            Self::GCP => "GCP",
            Self::Libvirt => "Libvirt",
            Self::OpenStack => "OpenStack",
            Self::None => "None",
            Self::VSphere => "VSphere",
            Self::Ovirt => "oVirt",
            Self::IBMCloud => "IBMCloud",
            Self::PowerVS => "PowerVS",
            Self::AlibabaCloud => "AlibabaCloud",
            Self::Nutanix => "Nutanix",
            Self::External => "External",
            Self::Unknown => "Unknown",
        };
        write!(f, "{s}")
    }
}

impl Infrastructure {
    /// Platform tag of the cluster, `None` when the status has no platform.
    ///
    /// An unset platform matches no driver, which always requires a concrete one.
    pub fn platform(&self) -> Option<PlatformType> {
        self.status
            .as_ref()
            .and_then(|s| s.platform_status.as_ref())
            .and_then(|ps| ps.type_)
    }

    /// Build an Infrastructure with the given platform in its status
    pub fn with_platform(name: &str, platform: Option<PlatformType>) -> Self {
        let mut infra = Infrastructure::new(name, InfrastructureSpec::default());
        infra.status = Some(InfrastructureStatus {
            platform_status: Some(PlatformStatus { type_: platform }),
        });
        infra
    }
}
