// ── Shared informer registry ──
//
// One reflector per object kind, shared by every consumer that asks for
// that kind. Reflectors are created lazily on first lookup, started by
// `start`, and all stop together when the shared stop token fires.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::join_all;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use crate::config::ConnectionConfig;
use crate::error::CoreError;
use crate::model::ObjectKind;
use crate::reflector::Reflector;
use crate::source::ListWatch;

struct Entry<L> {
    reflector: Arc<Reflector<L>>,
    started: bool,
}

/// Registry of shared reflectors keyed by [`ObjectKind`].
pub struct SharedInformerFactory<L> {
    source: Arc<L>,
    default_resync: Duration,
    custom_resync: HashMap<ObjectKind, Duration>,
    informers: Mutex<BTreeMap<ObjectKind, Entry<L>>>,
    tasks: TaskTracker,
}

impl<L: ListWatch> SharedInformerFactory<L> {
    /// Create an empty registry. A zero `default_resync` disables
    /// periodic resync for kinds without an override.
    pub fn new(source: Arc<L>, default_resync: Duration) -> Self {
        Self {
            source,
            default_resync,
            custom_resync: HashMap::new(),
            informers: Mutex::new(BTreeMap::new()),
            tasks: TaskTracker::new(),
        }
    }

    /// Create a registry with the resync settings from `config`.
    pub fn from_config(source: Arc<L>, config: &ConnectionConfig) -> Self {
        let mut factory = Self::new(source, config.default_resync);
        factory.custom_resync.clone_from(&config.custom_resync);
        factory
    }

    /// Override the resync period for one kind. Only affects reflectors
    /// created after the call.
    pub fn with_resync(mut self, kind: ObjectKind, period: Duration) -> Self {
        self.custom_resync.insert(kind, period);
        self
    }

    /// The shared reflector for `kind`, created on first call.
    pub fn informer_for(&self, kind: ObjectKind) -> Arc<Reflector<L>> {
        let mut informers = self.informers.lock().expect("informer table lock poisoned");
        let entry = informers.entry(kind).or_insert_with(|| {
            let resync = self
                .custom_resync
                .get(&kind)
                .copied()
                .unwrap_or(self.default_resync);
            debug!(%kind, ?resync, "registering informer");
            Entry {
                reflector: Arc::new(Reflector::new(kind, Arc::clone(&self.source), resync)),
                started: false,
            }
        });
        Arc::clone(&entry.reflector)
    }

    pub fn vms(&self) -> Arc<Reflector<L>> {
        self.informer_for(ObjectKind::Vm)
    }

    pub fn labels(&self) -> Arc<Reflector<L>> {
        self.informer_for(ObjectKind::Label)
    }

    /// Kinds registered so far, in order.
    pub fn registered(&self) -> Vec<ObjectKind> {
        self.informers
            .lock()
            .expect("informer table lock poisoned")
            .keys()
            .copied()
            .collect()
    }

    /// Spawn every registered reflector that is not running yet.
    ///
    /// Returns immediately. Calling it again only starts reflectors
    /// registered since the last call. Must be called within a Tokio
    /// runtime.
    pub fn start(&self, stop: &CancellationToken) {
        let mut informers = self.informers.lock().expect("informer table lock poisoned");
        for (kind, entry) in informers.iter_mut().filter(|(_, e)| !e.started) {
            let reflector = Arc::clone(&entry.reflector);
            let stop = stop.clone();
            self.tasks.spawn(async move { reflector.run(stop).await });
            entry.started = true;
            info!(%kind, "informer started");
        }
    }

    /// Wait for every registered kind to sync.
    ///
    /// Kinds are waited on concurrently; each maps to `false` if `stop`
    /// fired first (or its reflector failed before syncing). Kinds
    /// registered but not started simply wait for `stop`.
    pub async fn wait_for_cache_sync(&self, stop: &CancellationToken) -> HashMap<ObjectKind, bool> {
        let reflectors: Vec<_> = self
            .informers
            .lock()
            .expect("informer table lock poisoned")
            .values()
            .map(|e| Arc::clone(&e.reflector))
            .collect();

        let results = join_all(reflectors.iter().map(|r| r.wait_for_sync(stop))).await;

        reflectors
            .iter()
            .map(|r| r.kind())
            .zip(results)
            .collect()
    }

    /// Raise `stop` and wait for every spawned reflector to exit.
    ///
    /// Safe to call repeatedly and from several tasks at once; every
    /// caller returns once all reflectors have finished.
    pub async fn shutdown(&self, stop: &CancellationToken) {
        stop.cancel();
        self.tasks.close();
        self.tasks.wait().await;
        debug!("informers shut down");
    }
}

impl<L> std::fmt::Debug for SharedInformerFactory<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedInformerFactory")
            .field("default_resync", &self.default_resync)
            .field("custom_resync", &self.custom_resync)
            .field("tasks", &self.tasks.len())
            .finish_non_exhaustive()
    }
}

/// Turn a `wait_for_cache_sync` result into a hard error naming every
/// kind that did not sync.
pub fn require_synced(results: &HashMap<ObjectKind, bool>) -> Result<(), CoreError> {
    let mut kinds: Vec<ObjectKind> = results
        .iter()
        .filter(|&(_, &synced)| !synced)
        .map(|(&kind, _)| kind)
        .collect();
    if kinds.is_empty() {
        return Ok(());
    }
    kinds.sort();
    Err(CoreError::SyncTimeout { kinds })
}
