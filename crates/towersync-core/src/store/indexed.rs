// ── Lock-free reactive store for one object kind ──
//
// `DashMap` gives O(1) concurrent point lookups; a `watch` channel holds
// the full snapshot that list readers and subscribers receive. Mutations
// are applied in batches and the snapshot is rebuilt once per batch, so
// a snapshot reader never observes half of a batch.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;

use super::delta::{Change, Delta};
use crate::model::{Object, ObjectKind, RemoteObject};

/// Full store contents, ordered by key.
pub type Snapshot = Arc<Vec<Arc<Object>>>;

/// Key → latest object for a single kind.
///
/// Consumers only read. Writes belong to the [`Reflector`](crate::Reflector)
/// that owns the store, so a handle obtained from
/// [`Reflector::store`](crate::Reflector::store) cannot alter what other
/// consumers of the same informer see:
///
/// ```compile_fail
/// use towersync_core::{Change, IndexedStore, ObjectKind};
///
/// let store = IndexedStore::new(ObjectKind::Vm);
/// store.apply(vec![Change::Delete("vm-1".into())]);
/// ```
pub struct IndexedStore {
    kind: ObjectKind,

    by_key: DashMap<String, Arc<Object>>,

    /// Bumped once per batch that changed something.
    version: watch::Sender<u64>,

    snapshot: watch::Sender<Snapshot>,
}

impl IndexedStore {
    pub fn new(kind: ObjectKind) -> Self {
        let (version, _) = watch::channel(0u64);
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));

        Self {
            kind,
            by_key: DashMap::new(),
            version,
            snapshot,
        }
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Look up an object by key. A miss is not an error.
    pub fn get(&self, key: &str) -> Option<Arc<Object>> {
        self.by_key.get(key).map(|r| Arc::clone(r.value()))
    }

    /// Current contents (cheap `Arc` clone).
    pub fn list(&self) -> Snapshot {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to snapshot changes.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshot.subscribe()
    }

    pub fn keys(&self) -> Vec<String> {
        self.by_key.iter().map(|r| r.key().clone()).collect()
    }

    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    // ── Writes (owning reflector only) ───────────────────────────────

    /// Apply a batch of changes in order and publish one snapshot.
    ///
    /// Deleting an absent key is a no-op and yields no delta.
    pub(crate) fn apply(&self, changes: Vec<Change>) -> Vec<Delta> {
        let mut deltas = Vec::with_capacity(changes.len());
        for change in changes {
            match change {
                Change::Upsert(object) => {
                    let key = object.key().to_owned();
                    let new = Arc::new(object);
                    match self.by_key.insert(key, Arc::clone(&new)) {
                        Some(old) => deltas.push(Delta::Updated { old, new }),
                        None => deltas.push(Delta::Added(new)),
                    }
                }
                Change::Delete(key) => {
                    if let Some((_, old)) = self.by_key.remove(&key) {
                        deltas.push(Delta::Deleted(old));
                    }
                }
            }
        }

        if !deltas.is_empty() {
            self.publish();
        }
        deltas
    }

    /// Upsert every listed object, then prune keys that were not listed.
    ///
    /// Avoids the brief empty state that clear-then-insert would expose.
    pub(crate) fn replace(&self, objects: Vec<Object>) -> Vec<Delta> {
        let listed: HashSet<String> = objects.iter().map(|o| o.key().to_owned()).collect();

        let mut changes: Vec<Change> = objects.into_iter().map(Change::Upsert).collect();
        changes.extend(
            self.keys()
                .into_iter()
                .filter(|key| !listed.contains(key))
                .map(Change::Delete),
        );
        self.apply(changes)
    }

    /// Re-deliver the full contents as `Resync` deltas. Contents are left
    /// untouched.
    pub(crate) fn resync(&self) -> Vec<Delta> {
        self.list().iter().cloned().map(Delta::Resync).collect()
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn publish(&self) {
        let mut values: Vec<Arc<Object>> =
            self.by_key.iter().map(|r| Arc::clone(r.value())).collect();
        values.sort_by(|a, b| a.key().cmp(b.key()));
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
        self.version.send_modify(|v| *v += 1);
    }
}

impl std::fmt::Debug for IndexedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexedStore")
            .field("kind", &self.kind)
            .field("len", &self.by_key.len())
            .field("version", &self.version())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn vm(id: &str, name: &str) -> Object {
        Object::decode(ObjectKind::Vm, json!({ "id": id, "name": name })).unwrap()
    }

    fn names(store: &IndexedStore) -> Vec<String> {
        store
            .list()
            .iter()
            .map(|o| o.as_vm().unwrap().name.clone())
            .collect()
    }

    #[test]
    fn upsert_reports_added_then_updated() {
        let store = IndexedStore::new(ObjectKind::Vm);

        let added = store.apply(vec![Change::Upsert(vm("vm-1", "a"))]);
        assert!(matches!(added.as_slice(), [Delta::Added(_)]));

        match store.apply(vec![Change::Upsert(vm("vm-1", "b"))]).as_slice() {
            [Delta::Updated { old, new }] => {
                assert_eq!(old.as_vm().unwrap().name, "a");
                assert_eq!(new.as_vm().unwrap().name, "b");
            }
            other => panic!("expected one Updated, got {other:?}"),
        }

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("vm-1").unwrap().as_vm().unwrap().name, "b");
    }

    #[test]
    fn delete_of_missing_key_is_silent() {
        let store = IndexedStore::new(ObjectKind::Vm);
        store.apply(vec![Change::Upsert(vm("vm-1", "a"))]);
        let before = store.version();

        assert!(store.apply(vec![Change::Delete("vm-9".into())]).is_empty());
        assert_eq!(store.version(), before);

        let deltas = store.apply(vec![Change::Delete("vm-1".into())]);
        assert!(matches!(deltas.as_slice(), [Delta::Deleted(_)]));
        assert!(store.get("vm-1").is_none());
        assert!(store.is_empty());
        assert!(store.list().is_empty());
    }

    #[test]
    fn listing_agrees_with_point_lookups_after_every_batch() {
        let store = IndexedStore::new(ObjectKind::Vm);
        let batches = vec![
            vec![Change::Upsert(vm("vm-1", "a")), Change::Upsert(vm("vm-2", "b"))],
            vec![Change::Delete("vm-1".into()), Change::Upsert(vm("vm-3", "c"))],
            vec![Change::Upsert(vm("vm-2", "b2"))],
        ];

        for batch in batches {
            store.apply(batch);
            let listed = store.list();
            let mut keys = store.keys();
            keys.sort();
            let listed_keys: Vec<_> = listed.iter().map(|o| o.key().to_owned()).collect();
            assert_eq!(listed_keys, keys);
            for object in listed.iter() {
                assert_eq!(store.get(object.key()).as_ref(), Some(object));
            }
        }
        assert_eq!(names(&store), vec!["b2", "c"]);
    }

    #[test]
    fn batch_publishes_one_sorted_snapshot() {
        let store = IndexedStore::new(ObjectKind::Vm);
        let mut rx = store.subscribe();

        let deltas = store.apply(vec![
            Change::Upsert(vm("vm-2", "b")),
            Change::Upsert(vm("vm-1", "a")),
            Change::Upsert(vm("vm-3", "c")),
            Change::Delete("vm-3".into()),
        ]);

        assert_eq!(deltas.len(), 4);
        assert_eq!(store.version(), 1);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().len(), 2);
        assert_eq!(names(&store), vec!["a", "b"]);
    }

    #[test]
    fn replace_upserts_and_prunes() {
        let store = IndexedStore::new(ObjectKind::Vm);
        store.apply(vec![
            Change::Upsert(vm("vm-1", "a")),
            Change::Upsert(vm("vm-2", "b")),
        ]);

        let deltas = store.replace(vec![vm("vm-2", "b2"), vm("vm-3", "c")]);

        let actions: Vec<_> = deltas.iter().map(|d| (d.action(), d.key().to_owned())).collect();
        assert_eq!(
            actions,
            vec![
                ("updated", "vm-2".to_owned()),
                ("added", "vm-3".to_owned()),
                ("deleted", "vm-1".to_owned()),
            ]
        );
        assert_eq!(names(&store), vec!["b2", "c"]);
    }

    #[test]
    fn resync_leaves_contents_unchanged() {
        let store = IndexedStore::new(ObjectKind::Vm);
        store.apply(vec![
            Change::Upsert(vm("vm-1", "a")),
            Change::Upsert(vm("vm-2", "b")),
        ]);
        let before = store.list();
        let version = store.version();

        let deltas = store.resync();

        assert_eq!(deltas.len(), 2);
        assert!(deltas.iter().all(|d| matches!(d, Delta::Resync(_))));
        assert_eq!(store.version(), version);
        assert_eq!(store.list(), before);
    }
}
