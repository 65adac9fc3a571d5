//! Startup consistency check between the registry and the physical
//! database: enumerate tables, diff against the persisted projection,
//! repair orphans on either side, all within a bounded timeout.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::{
    model::{is_system_table, Collection},
    registry::{CollectionMap, Registry},
};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("reconciliation did not complete within {0:?}")]
    Timeout(Duration),

    #[error("catalog introspection failed: {0}")]
    Catalog(String),

    #[error("critical inconsistency: {0}")]
    Critical(String),
}

/// What the reconciler needs from the storage layer: table enumeration,
/// column inference for orphan tables, and the ability to drop one.
/// Implemented by each backend's pool in `moon-storage`.
#[async_trait]
pub trait PhysicalCatalog: Send + Sync {
    async fn list_tables(&self) -> Result<Vec<String>, ReconcileError>;
    async fn infer_collection(&self, table: &str) -> Result<Collection, ReconcileError>;
    async fn drop_table(&self, table: &str) -> Result<(), ReconcileError>;
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub orphan_registry_entries_removed: Vec<String>,
    pub orphan_tables_dropped: Vec<String>,
    pub orphan_tables_registered: Vec<String>,
}

/// Runs one reconciliation pass. `registered` is the registry's current
/// view (typically empty at cold start — the registry has nothing until
/// this or a previous reconciliation populates it); `drop_orphans`
/// determines whether an unregistered physical table is dropped or
/// adopted into the registry by inferring its columns.
pub async fn reconcile(
    registry: &Registry,
    catalog: &dyn PhysicalCatalog,
    timeout: Duration,
    drop_orphans: bool,
) -> Result<ReconcileReport, ReconcileError> {
    tokio::time::timeout(timeout, reconcile_inner(registry, catalog, drop_orphans))
        .await
        .map_err(|_| ReconcileError::Timeout(timeout))?
}

async fn reconcile_inner(
    registry: &Registry,
    catalog: &dyn PhysicalCatalog,
    drop_orphans: bool,
) -> Result<ReconcileReport, ReconcileError> {
    let mut report = ReconcileReport::default();
    let physical_tables: Vec<String> = catalog
        .list_tables()
        .await?
        .into_iter()
        .filter(|t| !is_system_table(t))
        .collect();

    let registered = registry.snapshot().list();

    for name in &registered {
        if !physical_tables.contains(name) {
            report.orphan_registry_entries_removed.push(name.clone());
        }
    }

    let mut next = CollectionMap::new();
    for name in &registered {
        if physical_tables.contains(name) {
            if let Some(collection) = registry.snapshot().get(name) {
                next.insert(name.clone(), collection);
            }
        }
    }

    for table in &physical_tables {
        if registered.contains(table) {
            continue;
        }
        if drop_orphans {
            catalog.drop_table(table).await?;
            report.orphan_tables_dropped.push(table.clone());
        } else {
            let inferred = catalog.infer_collection(table).await?;
            next.insert(table.clone(), std::sync::Arc::new(inferred));
            report.orphan_tables_registered.push(table.clone());
        }
    }

    registry.replace_all(next).await;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Column;
    use std::sync::Mutex;

    struct FakeCatalog {
        tables: Vec<String>,
        dropped: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PhysicalCatalog for FakeCatalog {
        async fn list_tables(&self) -> Result<Vec<String>, ReconcileError> {
            Ok(self.tables.clone())
        }

        async fn infer_collection(&self, table: &str) -> Result<Collection, ReconcileError> {
            Ok(Collection::new(table.to_owned(), vec![]))
        }

        async fn drop_table(&self, table: &str) -> Result<(), ReconcileError> {
            self.dropped.lock().unwrap().push(table.to_owned());
            Ok(())
        }
    }

    #[tokio::test]
    async fn removes_orphan_registry_entries() {
        let registry = Registry::default();
        let guard = registry.writer_guard("ghost").await;
        registry
            .commit("ghost", Collection::new("ghost".into(), vec![]))
            .await;
        drop(guard);

        let catalog = FakeCatalog {
            tables: vec![],
            dropped: Mutex::new(vec![]),
        };
        let report = reconcile(&registry, &catalog, Duration::from_secs(5), false)
            .await
            .unwrap();
        assert_eq!(report.orphan_registry_entries_removed, vec!["ghost"]);
        assert!(!registry.exists("ghost"));
    }

    #[tokio::test]
    async fn adopts_orphan_tables_by_default() {
        let registry = Registry::default();
        let catalog = FakeCatalog {
            tables: vec!["widgets".to_owned()],
            dropped: Mutex::new(vec![]),
        };
        let report = reconcile(&registry, &catalog, Duration::from_secs(5), false)
            .await
            .unwrap();
        assert_eq!(report.orphan_tables_registered, vec!["widgets"]);
        assert!(registry.exists("widgets"));
    }

    #[tokio::test]
    async fn drops_orphan_tables_when_configured() {
        let registry = Registry::default();
        let catalog = FakeCatalog {
            tables: vec!["widgets".to_owned()],
            dropped: Mutex::new(vec![]),
        };
        let report = reconcile(&registry, &catalog, Duration::from_secs(5), true)
            .await
            .unwrap();
        assert_eq!(report.orphan_tables_dropped, vec!["widgets"]);
        assert!(!registry.exists("widgets"));
        assert_eq!(*catalog.dropped.lock().unwrap(), vec!["widgets"]);
    }

    #[tokio::test]
    async fn system_tables_are_never_considered() {
        let registry = Registry::default();
        let catalog = FakeCatalog {
            tables: vec!["moon_users".to_owned()],
            dropped: Mutex::new(vec![]),
        };
        let report = reconcile(&registry, &catalog, Duration::from_secs(5), false)
            .await
            .unwrap();
        assert!(report.orphan_tables_registered.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn unused_column_import_guard() {
        let _ = Column::id_column();
    }
}
