//! Feature-gate evaluation
//!
//! Projects a [`FeatureGate`] onto the set of enabled gate names:
//!
//! - unset feature set: no gates
//! - `CustomNoUpgrade`: exactly the explicit enabled list in the spec
//! - any other named set: the catalogued list for that name, or no gates
//!   when the name is not in the catalog

use std::collections::{BTreeMap, BTreeSet};

use crate::crd::{FeatureGate, FeatureSet};

/// Feature set with the default (GA) gates
pub const DEFAULT_FEATURE_SET: &str = "Default";
/// Tech preview feature set
pub const TECH_PREVIEW_NO_UPGRADE: &str = "TechPreviewNoUpgrade";
/// Developer preview feature set
pub const DEV_PREVIEW_NO_UPGRADE: &str = "DevPreviewNoUpgrade";

/// Gates enabled in every feature set of this release
const DEFAULT_GATES: &[&str] = &[
    "AzureWorkloadIdentity",
    "BuildCSIVolumes",
    "CSIDriverAzureFile",
    "KMSv1",
    "PrivateHostedZoneAWS",
];

/// Gates additionally enabled by the preview feature sets
const PREVIEW_GATES: &[&str] = &[
    "CSIDriverSharedResource",
    "GCPFilestoreCSIDriver",
    "VSphereDriverConfiguration",
    "VSphereMultiVCenters",
    "VolumeGroupSnapshot",
];

/// Static mapping from named feature set to its enabled gates
#[derive(Clone, Debug)]
pub struct FeatureSetCatalog {
    sets: BTreeMap<String, Vec<String>>,
}

impl Default for FeatureSetCatalog {
    fn default() -> Self {
        let default: Vec<String> = DEFAULT_GATES.iter().map(|g| g.to_string()).collect();
        let preview: Vec<String> = DEFAULT_GATES
            .iter()
            .chain(PREVIEW_GATES)
            .map(|g| g.to_string())
            .collect();

        Self::empty()
            .with_feature_set(DEFAULT_FEATURE_SET, default)
            .with_feature_set(TECH_PREVIEW_NO_UPGRADE, preview.clone())
            .with_feature_set(DEV_PREVIEW_NO_UPGRADE, preview)
    }
}

impl FeatureSetCatalog {
    /// Catalog with no named feature sets
    pub fn empty() -> Self {
        Self {
            sets: BTreeMap::new(),
        }
    }

    /// Add or replace a named feature set
    pub fn with_feature_set<I, S>(mut self, name: impl Into<String>, enabled: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sets
            .insert(name.into(), enabled.into_iter().map(Into::into).collect());
        self
    }

    /// Enabled gates of a named feature set, `None` when not catalogued
    pub fn enabled(&self, feature_set: &str) -> Option<&[String]> {
        self.sets.get(feature_set).map(Vec::as_slice)
    }

    /// Set of enabled gate names selected by a FeatureGate
    pub fn enabled_features<'a>(&'a self, fg: &'a FeatureGate) -> BTreeSet<&'a str> {
        let names: &[String] = match fg.spec.feature_set() {
            FeatureSet::Unset => &[],
            FeatureSet::Custom => fg
                .spec
                .custom_no_upgrade
                .as_ref()
                .map(|c| c.enabled.as_slice())
                .unwrap_or_default(),
            FeatureSet::Named(name) => self.enabled(name).unwrap_or_default(),
        };
        names.iter().map(String::as_str).collect()
    }

    /// Whether `feature` is enabled by the FeatureGate
    pub fn is_enabled(&self, fg: &FeatureGate, feature: &str) -> bool {
        self.enabled_features(fg).contains(feature)
    }
}
