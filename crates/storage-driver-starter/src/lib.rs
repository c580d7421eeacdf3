//! CSI driver starter for the storage operator
//!
//! Watches the cluster's platform and feature gates and starts the controller
//! bundle of every CSI driver operator that belongs on this cluster. A bundle
//! is started at most once and never stopped for the life of the process.
//!
//! # Modules
//!
//! - [`config`] - Driver bundle descriptors and their validation
//! - [`catalog`] - Built-in driver descriptors
//! - [`predicate`] - Decides whether a driver bundle should run
//! - [`ledger`] - Related objects of started bundles
//! - [`manager`] - Bundle lifecycle: sub-controller composition and supervision
//! - [`subcontrollers`] - Sub-controllers every bundle is composed of
//! - [`controller`] - The reconciliation loop that activates bundles

#![deny(missing_docs)]

pub mod catalog;
pub mod config;
pub mod controller;
pub mod ledger;
pub mod manager;
pub mod predicate;
pub mod subcontrollers;

pub use config::DriverConfig;
pub use controller::{DriverStarter, SnapshotReaders, SyncOutcome};
pub use ledger::RelatedObjectLedger;
pub use manager::{BundleLifecycle, ControllerManager, SubController, Supervisor};
