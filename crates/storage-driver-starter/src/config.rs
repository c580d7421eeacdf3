//! Driver bundle descriptors
//!
//! A [`DriverConfig`] describes one CSI driver operator: which platform it
//! belongs to, which feature gate (if any) must be enabled, and what its
//! bundle installs. Descriptors are fixed at startup and never mutated.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};

use storage_common::crd::{PlatformType, RelatedObject};
use storage_common::{Error, CLUSTER_CSI_DRIVER_RESOURCE, OPERATOR_GROUP};

use crate::manager::SubController;

/// Descriptor of one CSI driver operator bundle
///
/// Example (drivers file):
/// ```yaml
/// - conditionPrefix: AWSEBS
///   platform: AWS
///   csiDriverName: ebs.csi.aws.com
///   staticAssets:
///     - csidriveroperators/aws-ebs/01_sa.yaml
///   deploymentAsset: csidriveroperators/aws-ebs/07_deployment.yaml
/// - conditionPrefix: GCPFilestore
///   platform: GCP
///   requireFeatureGate: GCPFilestoreCSIDriver
///   csiDriverName: filestore.csi.storage.gke.io
/// ```
#[derive(Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverConfig {
    /// Unique bundle name, also the prefix of its sub-controller names
    pub condition_prefix: String,

    /// Platform the driver runs on
    pub platform: PlatformType,

    /// Feature gate that must be enabled; `None` means generally available
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub require_feature_gate: Option<String>,

    /// CSI driver name, also the name of its ClusterCSIDriver object
    pub csi_driver_name: String,

    /// Manifests the bundle's static-resource controller applies
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub static_assets: Vec<String>,

    /// Manifest of the driver operator Deployment
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub deployment_asset: Option<String>,

    /// Removes a previous OLM-installed copy of the driver operator
    #[serde(skip)]
    pub olm_removal: Option<Arc<dyn SubController>>,

    /// Additional sub-controllers appended to the bundle
    #[serde(skip)]
    pub extra_controllers: Vec<Arc<dyn SubController>>,
}

impl std::fmt::Debug for DriverConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverConfig")
            .field("condition_prefix", &self.condition_prefix)
            .field("platform", &self.platform)
            .field("require_feature_gate", &self.require_feature_gate)
            .field("csi_driver_name", &self.csi_driver_name)
            .field("static_assets", &self.static_assets)
            .field("deployment_asset", &self.deployment_asset)
            .field("olm_removal", &self.olm_removal.as_ref().map(|c| c.name()))
            .field(
                "extra_controllers",
                &self
                    .extra_controllers
                    .iter()
                    .map(|c| c.name().to_string())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

impl DriverConfig {
    /// Create a generally-available driver descriptor with no assets
    pub fn new(
        condition_prefix: impl Into<String>,
        platform: PlatformType,
        csi_driver_name: impl Into<String>,
    ) -> Self {
        Self {
            condition_prefix: condition_prefix.into(),
            platform,
            require_feature_gate: None,
            csi_driver_name: csi_driver_name.into(),
            static_assets: Vec::new(),
            deployment_asset: None,
            olm_removal: None,
            extra_controllers: Vec::new(),
        }
    }

    /// Require a feature gate; an empty name keeps the driver generally available
    pub fn require_feature_gate(mut self, gate: impl Into<String>) -> Self {
        let gate = gate.into();
        self.require_feature_gate = (!gate.is_empty()).then_some(gate);
        self
    }

    /// Set the static assets applied by the bundle
    pub fn static_assets<I, S>(mut self, assets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.static_assets = assets.into_iter().map(Into::into).collect();
        self
    }

    /// Set the driver operator Deployment manifest
    pub fn deployment_asset(mut self, asset: impl Into<String>) -> Self {
        let asset = asset.into();
        self.deployment_asset = (!asset.is_empty()).then_some(asset);
        self
    }

    /// Set the controller removing an OLM-installed driver operator
    pub fn with_olm_removal(mut self, controller: Arc<dyn SubController>) -> Self {
        self.olm_removal = Some(controller);
        self
    }

    /// Append an extra sub-controller to the bundle
    pub fn with_extra_controller(mut self, controller: Arc<dyn SubController>) -> Self {
        self.extra_controllers.push(controller);
        self
    }

    /// Reference recorded in the related-object ledger once the bundle starts
    pub fn related_object(&self) -> RelatedObject {
        RelatedObject::cluster_scoped(
            OPERATOR_GROUP,
            CLUSTER_CSI_DRIVER_RESOURCE,
            &self.csi_driver_name,
        )
    }

    /// Validate a single descriptor
    pub fn validate(&self) -> Result<(), Error> {
        if self.condition_prefix.trim().is_empty() {
            return Err(Error::validation_for(
                &self.csi_driver_name,
                "conditionPrefix must not be empty",
            ));
        }
        if self.csi_driver_name.trim().is_empty() {
            return Err(Error::validation_for(
                &self.condition_prefix,
                "csiDriverName must not be empty",
            ));
        }
        if self.platform == PlatformType::Unknown {
            return Err(Error::validation_for(
                &self.condition_prefix,
                "platform is not a recognized platform type",
            ));
        }
        Ok(())
    }
}

/// Validate a full descriptor list: each entry, plus uniqueness of bundle
/// names and driver names (the ledger holds one entry per driver).
pub fn validate_driver_configs(configs: &[DriverConfig]) -> Result<(), Error> {
    let mut prefixes = HashSet::new();
    let mut drivers = HashSet::new();

    for cfg in configs {
        cfg.validate()?;
        if !prefixes.insert(cfg.condition_prefix.as_str()) {
            return Err(Error::validation_for(
                &cfg.condition_prefix,
                "duplicate conditionPrefix",
            ));
        }
        if !drivers.insert(cfg.csi_driver_name.as_str()) {
            return Err(Error::validation_for(
                &cfg.condition_prefix,
                format!("duplicate csiDriverName {}", cfg.csi_driver_name),
            ));
        }
    }
    Ok(())
}

/// Parse and validate a YAML list of driver descriptors
pub fn load_driver_configs(yaml: &str) -> Result<Vec<DriverConfig>, Error> {
    let configs: Vec<DriverConfig> = serde_yaml::from_str(yaml)?;
    validate_driver_configs(&configs)?;
    Ok(configs)
}
