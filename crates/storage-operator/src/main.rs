//! Cluster storage operator - starts CSI driver operators for the cluster's platform

mod config;
mod controller_runner;
mod related_objects;
mod status;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use storage_common::events::KubeEventPublisher;
use storage_common::kube_utils::create_client;
use storage_driver_starter::subcontrollers::{BundleDeps, DirAssetSource};
use storage_driver_starter::{BundleLifecycle, DriverStarter, SnapshotReaders, Supervisor};

use crate::config::{Cli, Commands, LogFormat, Options};
use crate::controller_runner::{build_driver_starter_controller, Context};
use crate::related_objects::{start_related_objects_publisher, KubeClusterOperatorClient};
use crate::status::KubeStorageStatusClient;

/// Reporting component of the Events this operator publishes
const CONTROLLER_NAME: &str = "csi-driver-starter";

/// How long shutdown waits for driver controllers to stop
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.options.log_format);

    match cli.command.unwrap_or_default() {
        Commands::Controller => run_controller(cli.options).await,
        Commands::Drivers => print_drivers(&cli.options),
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Text => registry.with(fmt::layer()).init(),
    }
}

fn print_drivers(options: &Options) -> anyhow::Result<()> {
    let drivers = options.load_drivers()?;
    let yaml = serde_yaml::to_string(&drivers)
        .map_err(|e| anyhow::anyhow!("Failed to serialize driver configs: {}", e))?;
    print!("{yaml}");
    Ok(())
}

async fn run_controller(options: Options) -> anyhow::Result<()> {
    let client = create_client(options.kubeconfig.as_deref()).await?;

    let drivers = options.load_drivers()?;
    tracing::info!(drivers = drivers.len(), "Loaded CSI driver configs");

    // Bundle tasks run until the controller stops
    let supervisor = Supervisor::new();

    let deps = BundleDeps::new(
        client.clone(),
        Arc::new(DirAssetSource::new(&options.asset_dir)),
    )
    .with_resync(options.resync_interval());

    let starter = DriverStarter::new(
        SnapshotReaders::from_client(client.clone()),
        supervisor.clone(),
        drivers,
        |cfg| Arc::new(deps.controller_manager(cfg)) as Arc<dyn BundleLifecycle>,
    )?
    .with_events(Arc::new(KubeEventPublisher::new(
        client.clone(),
        CONTROLLER_NAME,
    )));
    let starter = Arc::new(starter);

    start_related_objects_publisher(
        &supervisor,
        Arc::new(KubeClusterOperatorClient::new(client.clone())),
        starter.ledger().accessor(),
        options.related_objects_interval(),
    );

    let ctx = Arc::new(Context::new(
        starter,
        Arc::new(KubeStorageStatusClient::new(client.clone())),
        options.resync_interval(),
    ));

    tracing::info!("Starting storage operator controllers...");
    build_driver_starter_controller(client, ctx).await;

    supervisor.shutdown();
    if tokio::time::timeout(SHUTDOWN_GRACE, supervisor.wait())
        .await
        .is_err()
    {
        tracing::warn!(
            remaining = supervisor.len(),
            "Driver controllers did not stop in time"
        );
    }
    Ok(())
}
