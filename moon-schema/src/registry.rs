//! The in-memory schema registry: a concurrent name → column-list map plus
//! the consistency protocol that binds it to the physical database.
//!
//! Reads go through [`Registry::snapshot`], a lock-free, copy-on-write view
//! taken at the start of a request — wait-free even while another
//! collection's DDL holds a writer guard. Writers serialise per-collection
//! via [`Registry::writer_guard`], then serialise globally for the brief
//! commit step that publishes the new snapshot, which is also what keeps
//! the startup reconciler mutually exclusive with concurrent user DDL.

use std::{collections::HashMap, sync::Arc};

use arc_swap::ArcSwap;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::model::Collection;

pub type CollectionMap = HashMap<String, Arc<Collection>>;

/// An immutable view of the registry, taken at the start of a request.
/// Cloning is an `Arc` bump, not a deep copy.
#[derive(Clone)]
pub struct Snapshot(Arc<CollectionMap>);

impl Snapshot {
    pub fn get(&self, name: &str) -> Option<Arc<Collection>> {
        self.0.get(&name.to_ascii_lowercase()).cloned()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.0.contains_key(&name.to_ascii_lowercase())
    }

    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.0.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Held for the duration of a single collection's DDL operation. Dropping
/// it releases the per-collection lock; it does not by itself publish any
/// change — callers still go through [`Registry::commit`].
pub struct WriterGuard {
    _collection_lock: OwnedMutexGuard<()>,
}

pub struct Registry {
    collections: ArcSwap<CollectionMap>,
    locks: std::sync::Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    /// Held briefly while swapping the snapshot pointer, and for the full
    /// duration of a startup reconciliation pass.
    commit_lock: AsyncMutex<()>,
}

impl Default for Registry {
    fn default() -> Self {
        Registry::new(CollectionMap::new())
    }
}

impl Registry {
    pub fn new(initial: CollectionMap) -> Self {
        Registry {
            collections: ArcSwap::from_pointee(initial),
            locks: std::sync::Mutex::new(HashMap::new()),
            commit_lock: AsyncMutex::new(()),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot(self.collections.load_full())
    }

    /// Acquires the per-collection writer lock. Two DDL calls against
    /// different collections proceed concurrently; two against the same
    /// collection queue.
    pub async fn writer_guard(&self, name: &str) -> WriterGuard {
        let lock = {
            let mut locks = self.locks.lock().expect("registry lock map poisoned");
            locks
                .entry(name.to_ascii_lowercase())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        let guard = lock.lock_owned().await;
        WriterGuard {
            _collection_lock: guard,
        }
    }

    /// Publishes `collection` under `name`, replacing whatever was there.
    /// Must be called while holding that collection's [`WriterGuard`].
    pub async fn commit(&self, name: &str, collection: Collection) {
        let _commit = self.commit_lock.lock().await;
        let current = self.collections.load();
        let mut next = (**current).clone();
        next.insert(name.to_ascii_lowercase(), Arc::new(collection));
        self.collections.store(Arc::new(next));
    }

    /// Removes `name` from the registry. Must be called while holding that
    /// collection's [`WriterGuard`].
    pub async fn remove(&self, name: &str) {
        let _commit = self.commit_lock.lock().await;
        let current = self.collections.load();
        let mut next = (**current).clone();
        next.remove(&name.to_ascii_lowercase());
        self.collections.store(Arc::new(next));
    }

    /// Wholesale replacement used by the startup reconciler, which computes
    /// the entire corrected map before publishing it in one atomic swap.
    pub async fn replace_all(&self, map: CollectionMap) {
        let _commit = self.commit_lock.lock().await;
        self.collections.store(Arc::new(map));
    }

    pub fn list(&self) -> Vec<String> {
        self.snapshot().list()
    }

    pub fn get(&self, name: &str) -> Option<Arc<Collection>> {
        self.snapshot().get(name)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.snapshot().exists(name)
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Column;

    fn collection(name: &str) -> Collection {
        Collection::new(name.to_owned(), vec![])
    }

    #[tokio::test]
    async fn snapshot_is_isolated_from_later_writes() {
        let registry = Registry::default();
        let guard = registry.writer_guard("products").await;
        registry.commit("products", collection("products")).await;
        drop(guard);

        let snap_before = registry.snapshot();
        assert!(snap_before.exists("products"));

        let guard = registry.writer_guard("widgets").await;
        registry.commit("widgets", collection("widgets")).await;
        drop(guard);

        // The snapshot taken before the second write doesn't see it.
        assert!(!snap_before.exists("widgets"));
        assert!(registry.snapshot().exists("widgets"));
    }

    #[tokio::test]
    async fn remove_drops_collection_from_future_snapshots() {
        let registry = Registry::default();
        let guard = registry.writer_guard("products").await;
        registry.commit("products", collection("products")).await;
        drop(guard);

        let guard = registry.writer_guard("products").await;
        registry.remove("products").await;
        drop(guard);

        assert!(!registry.exists("products"));
    }

    #[tokio::test]
    async fn lookups_are_case_insensitive() {
        let registry = Registry::default();
        let guard = registry.writer_guard("products").await;
        registry.commit("products", collection("products")).await;
        drop(guard);

        assert!(registry.exists("Products"));
        assert!(registry.get("PRODUCTS").is_some());
    }

    #[test]
    fn unknown_column_appending_does_not_need_a_column() {
        let _ = Column::id_column();
    }
}
