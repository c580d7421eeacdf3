//! Storage and ClusterCSIDriver (operator.openshift.io/v1)
//!
//! `Storage/cluster` is the operator's own configuration object and carries
//! its management state and status conditions. `ClusterCSIDriver` objects are
//! the per-driver resources each started bundle manages.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::OperatorCondition;

/// Whether the operator is actively managing its resources
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ManagementState {
    /// The operator manages its resources
    Managed,
    /// The operator leaves its resources alone
    Unmanaged,
    /// The operator removes its resources
    Removed,
    /// Managed, ignoring safety checks
    Force,
}

impl std::fmt::Display for ManagementState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Managed => write!(f, "Managed"),
            Self::Unmanaged => write!(f, "Unmanaged"),
            Self::Removed => write!(f, "Removed"),
            Self::Force => write!(f, "Force"),
        }
    }
}

/// Storage operator configuration
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "operator.openshift.io",
    version = "v1",
    kind = "Storage",
    status = "StorageStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct StorageSpec {
    /// Management state of the operator; unset is not Managed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub management_state: Option<ManagementState>,
}

/// Storage operator status
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StorageStatus {
    /// Operator conditions, keyed by type
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<OperatorCondition>,
}

impl StorageStatus {
    /// Look up a condition by type
    pub fn condition(&self, type_: &str) -> Option<&OperatorCondition> {
        self.conditions.iter().find(|c| c.type_ == type_)
    }
}

/// Per-driver operator configuration, one object per CSI driver
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(group = "operator.openshift.io", version = "v1", kind = "ClusterCSIDriver")]
#[serde(rename_all = "camelCase")]
pub struct ClusterCSIDriverSpec {
    /// Management state of the driver operator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub management_state: Option<ManagementState>,
}
