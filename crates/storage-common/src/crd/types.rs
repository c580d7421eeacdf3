//! Shared status types

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition status following Kubernetes conventions
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    /// Condition is true
    True,
    /// Condition is false
    False,
    /// Condition status is unknown
    #[default]
    Unknown,
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::True => write!(f, "True"),
            Self::False => write!(f, "False"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Operator condition as reported in operator status
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OperatorCondition {
    /// Condition type (e.g. `CSIDriverStarterDegraded`)
    #[serde(rename = "type")]
    pub type_: String,

    /// Status of the condition
    pub status: ConditionStatus,

    /// Machine-readable reason
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,

    /// Human-readable message
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,

    /// Last time the status flipped
    pub last_transition_time: DateTime<Utc>,
}

impl OperatorCondition {
    /// Create a new condition with the current timestamp
    pub fn new(
        type_: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_: type_.into(),
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: Utc::now(),
        }
    }

    /// Whether `other` carries the same observable state (ignores timestamps)
    pub fn same_state(&self, other: &OperatorCondition) -> bool {
        self.type_ == other.type_
            && self.status == other.status
            && self.reason == other.reason
            && self.message == other.message
    }
}

/// Merge `condition` into `conditions`, replacing any entry of the same type.
///
/// The previous transition time is kept when the status did not flip.
/// Returns `false` when nothing observable changed.
pub fn set_condition(
    conditions: &mut Vec<OperatorCondition>,
    mut condition: OperatorCondition,
) -> bool {
    match conditions.iter_mut().find(|c| c.type_ == condition.type_) {
        Some(existing) if existing.same_state(&condition) => false,
        Some(existing) => {
            if existing.status == condition.status {
                condition.last_transition_time = existing.last_transition_time;
            }
            *existing = condition;
            true
        }
        None => {
            conditions.push(condition);
            true
        }
    }
}

/// Reference to an object the operator is responsible for
#[derive(
    Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub struct RelatedObject {
    /// API group of the object (empty for the core group)
    pub group: String,
    /// Plural resource name
    pub resource: String,
    /// Namespace, empty for cluster-scoped objects
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    /// Object name
    pub name: String,
}

impl RelatedObject {
    /// Reference to a cluster-scoped object
    pub fn cluster_scoped(
        group: impl Into<String>,
        resource: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            resource: resource.into(),
            namespace: String::new(),
            name: name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_condition_appends_new_type() {
        let mut conditions = Vec::new();
        let changed = set_condition(
            &mut conditions,
            OperatorCondition::new("Degraded", ConditionStatus::False, "AsExpected", ""),
        );
        assert!(changed);
        assert_eq!(conditions.len(), 1);
    }

    #[test]
    fn set_condition_is_noop_for_identical_state() {
        let mut conditions = vec![OperatorCondition::new(
            "Degraded",
            ConditionStatus::False,
            "AsExpected",
            "",
        )];
        let changed = set_condition(
            &mut conditions,
            OperatorCondition::new("Degraded", ConditionStatus::False, "AsExpected", ""),
        );
        assert!(!changed);
    }

    #[test]
    fn set_condition_keeps_transition_time_when_status_unchanged() {
        let original = OperatorCondition::new("Degraded", ConditionStatus::True, "SyncError", "a");
        let first_time = original.last_transition_time;
        let mut conditions = vec![original];

        let changed = set_condition(
            &mut conditions,
            OperatorCondition::new("Degraded", ConditionStatus::True, "SyncError", "b"),
        );
        assert!(changed);
        assert_eq!(conditions[0].message, "b");
        assert_eq!(conditions[0].last_transition_time, first_time);
    }

    #[test]
    fn related_object_omits_empty_namespace() {
        let obj = RelatedObject::cluster_scoped("operator.openshift.io", "clustercsidrivers", "x");
        let json = serde_json::to_value(&obj).unwrap();
        assert!(json.get("namespace").is_none());
        assert_eq!(json["resource"], "clustercsidrivers");
    }
}
