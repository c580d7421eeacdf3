//! Related-object ledger
//!
//! Append-only list of references to the ClusterCSIDriver objects of every
//! started bundle. Owned by the [`DriverStarter`](crate::DriverStarter) that
//! created it and shared by cloning with whatever reports operator status.

use std::sync::Arc;

use parking_lot::RwLock;

use storage_common::crd::RelatedObject;

/// Shared, append-only list of related objects
#[derive(Clone, Debug, Default)]
pub struct RelatedObjectLedger {
    entries: Arc<RwLock<Vec<RelatedObject>>>,
}

impl RelatedObjectLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a reference. Returns false if it was already recorded.
    pub fn record(&self, obj: RelatedObject) -> bool {
        let mut entries = self.entries.write();
        if entries.contains(&obj) {
            return false;
        }
        entries.push(obj);
        true
    }

    /// Whether anything has been recorded, and the recorded references in
    /// insertion order
    pub fn snapshot(&self) -> (bool, Vec<RelatedObject>) {
        let entries = self.entries.read();
        (!entries.is_empty(), entries.clone())
    }

    /// Number of recorded references
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the ledger is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Accessor closure for status reporters that poll related objects
    pub fn accessor(&self) -> impl Fn() -> (bool, Vec<RelatedObject>) + Send + Sync + 'static {
        let ledger = self.clone();
        move || ledger.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver_ref(name: &str) -> RelatedObject {
        RelatedObject::cluster_scoped("operator.openshift.io", "clustercsidrivers", name)
    }

    #[test]
    fn empty_ledger_reports_nothing() {
        let ledger = RelatedObjectLedger::new();
        let (has_any, objs) = ledger.snapshot();
        assert!(!has_any);
        assert!(objs.is_empty());
        assert!(ledger.is_empty());
    }

    #[test]
    fn records_in_order_without_duplicates() {
        let ledger = RelatedObjectLedger::new();
        assert!(ledger.record(driver_ref("b")));
        assert!(ledger.record(driver_ref("a")));
        assert!(!ledger.record(driver_ref("b")));

        let (has_any, objs) = ledger.snapshot();
        assert!(has_any);
        assert_eq!(objs, vec![driver_ref("b"), driver_ref("a")]);
    }

    #[test]
    fn clones_share_entries() {
        let ledger = RelatedObjectLedger::new();
        let accessor = ledger.accessor();
        ledger.clone().record(driver_ref("x"));

        assert_eq!(ledger.len(), 1);
        let (has_any, objs) = accessor();
        assert!(has_any);
        assert_eq!(objs.len(), 1);
    }
}
