//! Common types for the storage operator: cluster resources, errors, and utilities

#![deny(missing_docs)]

pub mod crd;
pub mod error;
pub mod events;
pub mod features;
pub mod kube_utils;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Name of the cluster-scoped singleton config objects (Infrastructure, FeatureGate, Storage)
pub const CLUSTER_CONFIG_NAME: &str = "cluster";

/// Name of the ClusterOperator this operator reports status on
pub const CLUSTER_OPERATOR_NAME: &str = "storage";

/// API group of operator-owned resources (Storage, ClusterCSIDriver)
pub const OPERATOR_GROUP: &str = "operator.openshift.io";

/// API group of cluster config resources (Infrastructure, FeatureGate, ClusterOperator)
pub const CONFIG_GROUP: &str = "config.openshift.io";

/// Plural resource name of ClusterCSIDriver, used in related-object references
pub const CLUSTER_CSI_DRIVER_RESOURCE: &str = "clustercsidrivers";

/// Field manager used for server-side apply
pub const FIELD_MANAGER: &str = "cluster-storage-operator";
