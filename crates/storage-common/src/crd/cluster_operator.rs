//! ClusterOperator (config.openshift.io/v1): cluster-level operator status

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::RelatedObject;

/// ClusterOperator status object. Only `status.relatedObjects` is written.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "config.openshift.io",
    version = "v1",
    kind = "ClusterOperator",
    status = "ClusterOperatorStatus"
)]
pub struct ClusterOperatorSpec {}

/// ClusterOperator status
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterOperatorStatus {
    /// Objects the operator considers itself responsible for
    #[serde(default)]
    pub related_objects: Vec<RelatedObject>,
}
