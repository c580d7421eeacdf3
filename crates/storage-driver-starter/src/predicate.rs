//! Driver activation predicate

use tracing::{debug, trace};

use storage_common::crd::{FeatureGate, Infrastructure};
use storage_common::features::FeatureSetCatalog;

use crate::config::DriverConfig;

/// Returns true if the given driver bundle should run on this cluster.
///
/// Checks, in order, short-circuiting on the first failure:
/// 1. the cluster platform equals the driver's platform (an unset platform
///    matches nothing)
/// 2. the driver requires no feature gate, or
/// 3. the required gate is enabled by the cluster's FeatureGate
pub fn should_run(
    cfg: &DriverConfig,
    infrastructure: &Infrastructure,
    feature_gate: &FeatureGate,
    catalog: &FeatureSetCatalog,
) -> bool {
    // Platform first: it filters out most drivers
    let platform = infrastructure.platform();
    if platform != Some(cfg.platform) {
        trace!(
            driver = %cfg.csi_driver_name,
            platform = ?platform,
            "Not starting driver: wrong platform"
        );
        return false;
    }

    let Some(gate) = cfg.require_feature_gate.as_deref() else {
        trace!(driver = %cfg.csi_driver_name, "Starting driver: generally available");
        return true;
    };

    if catalog.is_enabled(feature_gate, gate) {
        trace!(
            driver = %cfg.csi_driver_name,
            feature = %gate,
            "Starting driver: feature is enabled"
        );
        return true;
    }

    debug!(
        driver = %cfg.csi_driver_name,
        feature = %gate,
        "Not starting driver: feature is not enabled"
    );
    false
}
