//! Controller runner - wires the driver starter into a kube-runtime controller
//!
//! The controller watches `Storage/cluster` and maps every change of the
//! cluster `Infrastructure` and `FeatureGate` onto it, so a change to any of
//! the three snapshots triggers a reconciliation. Each successful sync
//! requeues after the resync interval.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use kube::runtime::controller::Action;
use kube::runtime::reflector::ObjectRef;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client, ResourceExt};
use tracing::{error, info, instrument, warn};

use storage_common::crd::{FeatureGate, Infrastructure, Storage};
use storage_common::{Error, CLUSTER_CONFIG_NAME};
use storage_driver_starter::DriverStarter;

use crate::status::{report_degraded, StorageStatusClient};

/// Watcher timeout (seconds) - must be less than client read_timeout (30s)
/// This forces the API server to close the watch before the client times out,
/// preventing "body read timed out" errors on idle watches.
const WATCH_TIMEOUT_SECS: u32 = 25;

/// Requeue delay after a failed reconciliation
const ERROR_REQUEUE: Duration = Duration::from_secs(5);

/// Shared context for the driver starter controller
pub struct Context {
    pub starter: Arc<DriverStarter>,
    pub status: Arc<dyn StorageStatusClient>,
    pub resync: Duration,
}

impl Context {
    pub fn new(
        starter: Arc<DriverStarter>,
        status: Arc<dyn StorageStatusClient>,
        resync: Duration,
    ) -> Self {
        Self {
            starter,
            status,
            resync,
        }
    }
}

/// Reconcile Storage/cluster: run one driver starter sync and report its
/// outcome as the degraded condition. The management state comes from the
/// watched object itself.
#[instrument(skip(storage, ctx), fields(storage = %storage.name_any()))]
pub async fn reconcile(storage: Arc<Storage>, ctx: Arc<Context>) -> Result<Action, Error> {
    match ctx.starter.sync_with(storage.as_ref()).await {
        Ok(outcome) => {
            if !outcome.started.is_empty() {
                info!(started = ?outcome.started, "Started CSI driver bundles");
            }
            report_degraded(ctx.status.as_ref(), &storage, None).await?;
            Ok(Action::requeue(ctx.resync))
        }
        Err(e) => {
            if let Err(status_err) = report_degraded(ctx.status.as_ref(), &storage, Some(&e)).await
            {
                warn!(error = %status_err, "Failed to report degraded condition");
            }
            Err(e)
        }
    }
}

/// Error policy for the driver starter controller
pub fn error_policy(storage: Arc<Storage>, error: &Error, _ctx: Arc<Context>) -> Action {
    error!(
        ?error,
        storage = %storage.name_any(),
        "driver starter reconciliation failed"
    );
    Action::requeue(ERROR_REQUEUE)
}

/// The only Storage object the controller reconciles
fn storage_cluster() -> ObjectRef<Storage> {
    ObjectRef::new(CLUSTER_CONFIG_NAME)
}

fn watcher_config() -> WatcherConfig {
    WatcherConfig::default()
        .fields(&format!("metadata.name={}", CLUSTER_CONFIG_NAME))
        .timeout(WATCH_TIMEOUT_SECS)
}

/// Build the driver starter controller future. It completes on SIGTERM/Ctrl-C.
pub fn build_driver_starter_controller(
    client: Client,
    ctx: Arc<Context>,
) -> impl Future<Output = ()> + Send {
    let storages: Api<Storage> = Api::all(client.clone());
    let infrastructures: Api<Infrastructure> = Api::all(client.clone());
    let feature_gates: Api<FeatureGate> = Api::all(client);

    info!("- DriverStarter controller");

    Controller::new(storages, watcher_config())
        .watches(infrastructures, watcher_config(), |_| Some(storage_cluster()))
        .watches(feature_gates, watcher_config(), |_| Some(storage_cluster()))
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(log_reconcile_result("DriverStarter"))
}

fn log_reconcile_result<T: std::fmt::Debug, E: std::fmt::Debug>(
    controller_name: &'static str,
) -> impl Fn(Result<T, E>) -> std::future::Ready<()> {
    move |result| {
        match result {
            Ok(action) => tracing::debug!(?action, "{} reconciliation completed", controller_name),
            Err(e) => tracing::error!(error = ?e, "{} reconciliation error", controller_name),
        }
        std::future::ready(())
    }
}
