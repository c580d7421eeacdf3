//! Cluster resource types consumed and managed by the storage operator
//!
//! None of these CRDs are installed by this operator; they belong to the
//! platform's config and operator APIs. The types only cover the fields the
//! operator reads or writes.

mod cluster_operator;
mod feature_gate;
mod infrastructure;
mod storage;
mod types;

pub use cluster_operator::{ClusterOperator, ClusterOperatorSpec, ClusterOperatorStatus};
pub use feature_gate::{
    FeatureGate, FeatureGateEnabledDisabled, FeatureGateSpec, FeatureSet, CUSTOM_NO_UPGRADE,
};
pub use infrastructure::{
    Infrastructure, InfrastructureSpec, InfrastructureStatus, PlatformStatus, PlatformType,
};
pub use storage::{
    ClusterCSIDriver, ClusterCSIDriverSpec, ManagementState, Storage, StorageSpec, StorageStatus,
};
pub use types::{set_condition, ConditionStatus, OperatorCondition, RelatedObject};
