//! Driver starter reconciliation
//!
//! Each call to [`DriverStarter::sync`] reads the operator's management state,
//! the cluster Infrastructure, and the cluster FeatureGate, then starts every
//! dormant bundle whose activation predicate now holds. Started bundles are
//! never re-evaluated or stopped.

use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::api::Api;
use kube::{Client, Resource};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

#[cfg(test)]
use mockall::automock;

use storage_common::crd::{FeatureGate, Infrastructure, ManagementState, Storage};
use storage_common::events::{EventPublisher, NoopEventPublisher, OperatorEvent};
use storage_common::features::FeatureSetCatalog;
use storage_common::{Error, CLUSTER_CONFIG_NAME};

use crate::config::{validate_driver_configs, DriverConfig};
use crate::ledger::RelatedObjectLedger;
use crate::manager::{BundleLifecycle, Supervisor};
use crate::predicate::should_run;

/// Reads the operator's management state
#[cfg_attr(test, automock)]
#[async_trait]
pub trait OperatorStateReader: Send + Sync {
    /// Management state of the operator, `None` when it was never set
    async fn management_state(&self) -> Result<Option<ManagementState>, Error>;
}

/// Reads the cluster Infrastructure
#[cfg_attr(test, automock)]
#[async_trait]
pub trait InfrastructureReader: Send + Sync {
    /// Get an Infrastructure by name
    async fn get_infrastructure(&self, name: &str) -> Result<Infrastructure, Error>;
}

/// Reads the cluster FeatureGate
#[cfg_attr(test, automock)]
#[async_trait]
pub trait FeatureGateReader: Send + Sync {
    /// Get a FeatureGate by name
    async fn get_feature_gate(&self, name: &str) -> Result<FeatureGate, Error>;
}

/// Real reader backed by the API server
pub struct KubeSnapshotReader {
    client: Client,
}

impl KubeSnapshotReader {
    /// Create a reader wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl OperatorStateReader for KubeSnapshotReader {
    async fn management_state(&self) -> Result<Option<ManagementState>, Error> {
        let api: Api<Storage> = Api::all(self.client.clone());
        let storage = api
            .get_opt(CLUSTER_CONFIG_NAME)
            .await?
            .ok_or_else(|| Error::not_found("Storage", CLUSTER_CONFIG_NAME))?;
        Ok(storage.spec.management_state)
    }
}

/// An already-fetched Storage object answers for itself
#[async_trait]
impl OperatorStateReader for Storage {
    async fn management_state(&self) -> Result<Option<ManagementState>, Error> {
        Ok(self.spec.management_state)
    }
}

#[async_trait]
impl InfrastructureReader for KubeSnapshotReader {
    async fn get_infrastructure(&self, name: &str) -> Result<Infrastructure, Error> {
        let api: Api<Infrastructure> = Api::all(self.client.clone());
        api.get_opt(name)
            .await?
            .ok_or_else(|| Error::not_found("Infrastructure", name))
    }
}

#[async_trait]
impl FeatureGateReader for KubeSnapshotReader {
    async fn get_feature_gate(&self, name: &str) -> Result<FeatureGate, Error> {
        let api: Api<FeatureGate> = Api::all(self.client.clone());
        api.get_opt(name)
            .await?
            .ok_or_else(|| Error::not_found("FeatureGate", name))
    }
}

/// The three snapshot sources one reconciliation reads
#[derive(Clone)]
pub struct SnapshotReaders {
    /// Operator management state
    pub operator: Arc<dyn OperatorStateReader>,
    /// Cluster Infrastructure
    pub infrastructure: Arc<dyn InfrastructureReader>,
    /// Cluster FeatureGate
    pub feature_gates: Arc<dyn FeatureGateReader>,
}

impl SnapshotReaders {
    /// Create readers from individual sources
    pub fn new(
        operator: Arc<dyn OperatorStateReader>,
        infrastructure: Arc<dyn InfrastructureReader>,
        feature_gates: Arc<dyn FeatureGateReader>,
    ) -> Self {
        Self {
            operator,
            infrastructure,
            feature_gates,
        }
    }

    /// All three sources read from the API server
    pub fn from_client(client: Client) -> Self {
        let reader = Arc::new(KubeSnapshotReader::new(client));
        Self::new(reader.clone(), reader.clone(), reader)
    }
}

/// Bundles started by one reconciliation
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Condition prefixes of the bundles started, in descriptor order
    pub started: Vec<String>,
}

/// One configured bundle and whether it was started
struct DriverControllerManager {
    config: DriverConfig,
    manager: Arc<dyn BundleLifecycle>,
    running: bool,
}

/// Starts CSI driver controller bundles as the cluster becomes eligible for them
pub struct DriverStarter {
    readers: SnapshotReaders,
    catalog: FeatureSetCatalog,
    supervisor: Supervisor,
    ledger: RelatedObjectLedger,
    events: Arc<dyn EventPublisher>,
    /// Held for a whole reconciliation so syncs never overlap
    bundles: Mutex<Vec<DriverControllerManager>>,
}

impl DriverStarter {
    /// Create a starter for `configs`; `factory` builds each bundle's
    /// lifecycle handle once, up front.
    ///
    /// Fails when a descriptor is invalid or two descriptors share a bundle
    /// or driver name.
    pub fn new<F>(
        readers: SnapshotReaders,
        supervisor: Supervisor,
        configs: Vec<DriverConfig>,
        mut factory: F,
    ) -> Result<Self, Error>
    where
        F: FnMut(&DriverConfig) -> Arc<dyn BundleLifecycle>,
    {
        validate_driver_configs(&configs)?;

        let bundles = configs
            .into_iter()
            .map(|config| DriverControllerManager {
                manager: factory(&config),
                config,
                running: false,
            })
            .collect();

        Ok(Self {
            readers,
            catalog: FeatureSetCatalog::default(),
            supervisor,
            ledger: RelatedObjectLedger::new(),
            events: Arc::new(NoopEventPublisher),
            bundles: Mutex::new(bundles),
        })
    }

    /// Use a different feature-set catalog
    pub fn with_catalog(mut self, catalog: FeatureSetCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Publish an Event on Storage/cluster for every started bundle
    pub fn with_events(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = events;
        self
    }

    /// Ledger of started bundles' ClusterCSIDriver objects
    pub fn ledger(&self) -> RelatedObjectLedger {
        self.ledger.clone()
    }

    /// Condition prefixes of the running bundles
    pub async fn running_drivers(&self) -> Vec<String> {
        self.bundles
            .lock()
            .await
            .iter()
            .filter(|b| b.running)
            .map(|b| b.config.condition_prefix.clone())
            .collect()
    }

    /// Run one reconciliation.
    ///
    /// Returns an error, with no bundle started, when any snapshot cannot be
    /// read. An operator that is not Managed, including one with no
    /// management state at all, is a no-op.
    pub async fn sync(&self) -> Result<SyncOutcome, Error> {
        self.sync_with(self.readers.operator.as_ref()).await
    }

    /// Run one reconciliation taking the management state from `operator`
    /// rather than the configured reader, e.g. the Storage object a watch
    /// just delivered.
    #[instrument(skip(self, operator))]
    pub async fn sync_with(
        &self,
        operator: &dyn OperatorStateReader,
    ) -> Result<SyncOutcome, Error> {
        let mut bundles = self.bundles.lock().await;

        let state = operator.management_state().await?;
        if state != Some(ManagementState::Managed) {
            debug!(management_state = ?state, "Operator not managed, skipping driver starter");
            return Ok(SyncOutcome::default());
        }

        let infrastructure = self
            .readers
            .infrastructure
            .get_infrastructure(CLUSTER_CONFIG_NAME)
            .await?;
        let feature_gate = self
            .readers
            .feature_gates
            .get_feature_gate(CLUSTER_CONFIG_NAME)
            .await?;

        let mut outcome = SyncOutcome::default();
        let mut started_drivers = Vec::new();
        for bundle in bundles.iter_mut().filter(|b| !b.running) {
            if !should_run(&bundle.config, &infrastructure, &feature_gate, &self.catalog) {
                continue;
            }

            info!(
                bundle = %bundle.config.condition_prefix,
                driver = %bundle.config.csi_driver_name,
                "Starting CSI driver controller"
            );
            // Listed before started: the ledger never lags a running bundle
            self.ledger.record(bundle.config.related_object());
            bundle.manager.start(&self.supervisor);
            bundle.running = true;

            outcome.started.push(bundle.config.condition_prefix.clone());
            started_drivers.push(bundle.config.csi_driver_name.clone());
        }
        drop(bundles);

        let storage_ref = storage_reference();
        for driver in started_drivers {
            self.events
                .publish(&storage_ref, OperatorEvent::DriverControllerStarted { driver })
                .await;
        }

        Ok(outcome)
    }
}

/// Reference to Storage/cluster, the object start events are attached to
fn storage_reference() -> ObjectReference {
    ObjectReference {
        api_version: Some(Storage::api_version(&()).to_string()),
        kind: Some(Storage::kind(&()).to_string()),
        name: Some(CLUSTER_CONFIG_NAME.to_string()),
        ..Default::default()
    }
}
