//! FeatureGate (config.openshift.io/v1): the cluster's selected feature set

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Feature set name that carries an explicit enabled/disabled list
pub const CUSTOM_NO_UPGRADE: &str = "CustomNoUpgrade";

/// Cluster-wide feature gate selection
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(group = "config.openshift.io", version = "v1", kind = "FeatureGate")]
#[serde(rename_all = "camelCase")]
pub struct FeatureGateSpec {
    /// Selected feature set; empty or absent means the default set with no
    /// optional gates
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub feature_set: String,

    /// Explicit gate list, only honored when `feature_set` is `CustomNoUpgrade`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_no_upgrade: Option<FeatureGateEnabledDisabled>,
}

/// Enabled and disabled gate names
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct FeatureGateEnabledDisabled {
    /// Enabled gate names
    #[serde(default)]
    pub enabled: Vec<String>,
    /// Disabled gate names
    #[serde(default)]
    pub disabled: Vec<String>,
}

/// Interpretation of the `featureSet` field
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeatureSet<'a> {
    /// No feature set selected
    Unset,
    /// `CustomNoUpgrade`: the explicit list in the spec applies
    Custom,
    /// A named, catalogued feature set (e.g. `TechPreviewNoUpgrade`)
    Named(&'a str),
}

impl FeatureGateSpec {
    /// Classify the selected feature set
    pub fn feature_set(&self) -> FeatureSet<'_> {
        match self.feature_set.as_str() {
            "" => FeatureSet::Unset,
            CUSTOM_NO_UPGRADE => FeatureSet::Custom,
            name => FeatureSet::Named(name),
        }
    }
}

impl FeatureGate {
    /// FeatureGate with a named feature set
    pub fn with_feature_set(name: &str, feature_set: &str) -> Self {
        FeatureGate::new(
            name,
            FeatureGateSpec {
                feature_set: feature_set.to_string(),
                custom_no_upgrade: None,
            },
        )
    }

    /// FeatureGate with `CustomNoUpgrade` and the given enabled gates
    pub fn custom<I, S>(name: &str, enabled: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FeatureGate::new(
            name,
            FeatureGateSpec {
                feature_set: CUSTOM_NO_UPGRADE.to_string(),
                custom_no_upgrade: Some(FeatureGateEnabledDisabled {
                    enabled: enabled.into_iter().map(Into::into).collect(),
                    disabled: Vec::new(),
                }),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_set_classification() {
        assert_eq!(
            FeatureGate::with_feature_set("cluster", "").spec.feature_set(),
            FeatureSet::Unset
        );
        assert_eq!(
            FeatureGate::custom("cluster", ["A"]).spec.feature_set(),
            FeatureSet::Custom
        );
        assert_eq!(
            FeatureGate::with_feature_set("cluster", "TechPreviewNoUpgrade")
                .spec
                .feature_set(),
            FeatureSet::Named("TechPreviewNoUpgrade")
        );
    }

    #[test]
    fn deserializes_without_feature_set() {
        let fg: FeatureGate = serde_json::from_value(serde_json::json!({
            "apiVersion": "config.openshift.io/v1",
            "kind": "FeatureGate",
            "metadata": {"name": "cluster"},
            "spec": {}
        }))
        .unwrap();
        assert_eq!(fg.spec.feature_set(), FeatureSet::Unset);
        assert!(fg.spec.custom_no_upgrade.is_none());
    }
}
