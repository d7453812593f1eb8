// ── Reflector ──
//
// Mirrors one object kind into an `IndexedStore`. Opens the watch first,
// lists second, then applies change records until the stop signal fires
// or the subscription fails. There is no self-restart: a failed
// reflector stays failed and reports why through its status.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use towersync_api::{Response, Subscription};
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::model::ObjectKind;
use crate::source::{ListWatch, decode_changes, decode_list};
use crate::store::{Delta, IndexedStore};

const DELTA_CHANNEL_SIZE: usize = 1024;

/// Where a reflector is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Phase {
    /// Created, not yet running.
    Initializing,
    /// Opening the watch and listing.
    Syncing,
    /// Initial list applied; following changes.
    Synced,
    /// Stopped consuming after an error. `last_error` says why.
    Failed,
}

/// Observable reflector state.
#[derive(Debug, Clone)]
pub struct ReflectorStatus {
    pub kind: ObjectKind,
    pub phase: Phase,
    /// Set once the initial list has been applied. Never reset, even if
    /// the reflector fails afterwards.
    pub synced: bool,
    pub last_error: Option<CoreError>,
}

/// Keeps an `IndexedStore` in step with the server for one kind.
pub struct Reflector<L> {
    kind: ObjectKind,
    source: Arc<L>,
    store: Arc<IndexedStore>,
    resync: Duration,
    status: watch::Sender<ReflectorStatus>,
    deltas: broadcast::Sender<Delta>,
}

impl<L: ListWatch> Reflector<L> {
    /// Create a reflector. Does not contact the server until
    /// [`run`](Self::run). A zero `resync` disables periodic resync.
    pub fn new(kind: ObjectKind, source: Arc<L>, resync: Duration) -> Self {
        let (status, _) = watch::channel(ReflectorStatus {
            kind,
            phase: Phase::Initializing,
            synced: false,
            last_error: None,
        });
        let (deltas, _) = broadcast::channel(DELTA_CHANNEL_SIZE);

        Self {
            kind,
            source,
            store: Arc::new(IndexedStore::new(kind)),
            resync,
            status,
            deltas,
        }
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn store(&self) -> &Arc<IndexedStore> {
        &self.store
    }

    pub fn resync_period(&self) -> Duration {
        self.resync
    }

    pub fn status(&self) -> ReflectorStatus {
        self.status.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<ReflectorStatus> {
        self.status.subscribe()
    }

    pub fn has_synced(&self) -> bool {
        self.status.borrow().synced
    }

    /// Subscribe to deltas applied from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Delta> {
        self.deltas.subscribe()
    }

    /// Wait until the initial list has been applied.
    ///
    /// Returns `false` if `stop` fires first, or if the reflector failed
    /// before it ever synced (it will not retry).
    pub async fn wait_for_sync(&self, stop: &CancellationToken) -> bool {
        let mut rx = self.status.subscribe();
        tokio::select! {
            biased;
            status = rx.wait_for(|s| s.synced || s.phase == Phase::Failed) => {
                status.is_ok_and(|s| s.synced)
            }
            () = stop.cancelled() => false,
        }
    }

    // ── Run loop ─────────────────────────────────────────────────────

    /// Run until `stop` fires or the subscription fails.
    pub async fn run(&self, stop: CancellationToken) {
        if stop.is_cancelled() {
            return;
        }
        self.set_phase(Phase::Syncing);
        debug!(kind = %self.kind, "reflector starting");

        let Some(mut subscription) = self.establish(&stop).await else {
            return;
        };

        let mut resync = self.resync_ticker();

        loop {
            let resp = match next_wake(&stop, &mut subscription, resync.as_mut()).await {
                Wake::Stop => break,
                Wake::Resync => {
                    let deltas = self.store.resync();
                    debug!(kind = %self.kind, count = deltas.len(), "resync");
                    self.publish(deltas);
                    continue;
                }
                Wake::Response(resp) => resp,
            };

            let Some(resp) = resp else {
                self.fail(CoreError::Protocol {
                    message: "subscription closed".into(),
                });
                break;
            };
            if !resp.is_ok() {
                self.fail(CoreError::from_response(&resp));
                break;
            }
            match decode_changes(self.kind, resp.data) {
                Ok(changes) => {
                    let deltas = self.store.apply(changes);
                    self.publish(deltas);
                }
                Err(e) => {
                    self.fail(e);
                    break;
                }
            }
        }

        subscription.stop();
        debug!(kind = %self.kind, "reflector stopped");
    }

    /// Open the watch, then list and replace the store contents.
    async fn establish(&self, stop: &CancellationToken) -> Option<Subscription> {
        let watched = tokio::select! {
            biased;
            () = stop.cancelled() => return None,
            result = self.source.watch(self.kind) => result,
        };
        let subscription = match watched {
            Ok(subscription) => subscription,
            Err(e) => {
                self.fail(e);
                return None;
            }
        };

        let listed = tokio::select! {
            biased;
            () = stop.cancelled() => return None,
            result = self.source.list(self.kind) => result,
        };
        let objects = match listed.and_then(|items| decode_list(self.kind, items)) {
            Ok(objects) => objects,
            Err(e) => {
                self.fail(e);
                return None;
            }
        };

        let deltas = self.store.replace(objects);
        self.publish(deltas);
        self.status.send_modify(|s| {
            s.phase = Phase::Synced;
            s.synced = true;
        });
        info!(kind = %self.kind, objects = self.store.len(), "cache synced");

        Some(subscription)
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn resync_ticker(&self) -> Option<Interval> {
        if self.resync.is_zero() {
            return None;
        }
        let mut interval = tokio::time::interval_at(Instant::now() + self.resync, self.resync);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Some(interval)
    }

    fn publish(&self, deltas: Vec<Delta>) {
        for delta in deltas {
            // No receivers is fine.
            let _ = self.deltas.send(delta);
        }
    }

    fn set_phase(&self, phase: Phase) {
        self.status.send_modify(|s| s.phase = phase);
    }

    fn fail(&self, error: CoreError) {
        warn!(kind = %self.kind, error = %error, "reflector failed");
        self.status.send_modify(|s| {
            s.phase = Phase::Failed;
            s.last_error = Some(error);
        });
    }
}

impl<L> std::fmt::Debug for Reflector<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reflector")
            .field("kind", &self.kind)
            .field("resync", &self.resync)
            .field("status", &*self.status.borrow())
            .finish_non_exhaustive()
    }
}

/// What woke the run loop.
#[derive(Debug)]
enum Wake {
    Stop,
    Resync,
    Response(Option<Response>),
}

/// Wait for the next thing the run loop must handle.
///
/// A due resync is taken ahead of queued responses, so a busy watch
/// cannot hold it back.
async fn next_wake(
    stop: &CancellationToken,
    subscription: &mut Subscription,
    resync: Option<&mut Interval>,
) -> Wake {
    tokio::select! {
        biased;
        () = stop.cancelled() => Wake::Stop,
        () = next_tick(resync) => Wake::Resync,
        resp = subscription.recv() => Wake::Response(resp),
    }
}

/// Resolve on the next resync tick, or never if resync is disabled.
async fn next_tick(interval: Option<&mut Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::RemoteObject;
    use crate::testing::FakeSource;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tokio::sync::mpsc;
    use towersync_api::StopHandle;
    use towersync_api::subscription::RESPONSE_QUEUE_CAPACITY;

    fn data(value: serde_json::Value) -> Response {
        Response {
            data: value,
            errors: Vec::new(),
        }
    }

    fn spawn(
        reflector: &Arc<Reflector<FakeSource>>,
        stop: &CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let r = Arc::clone(reflector);
        let stop = stop.clone();
        tokio::spawn(async move { r.run(stop).await })
    }

    #[tokio::test]
    async fn lists_then_applies_changes() {
        let source = FakeSource::new();
        source.set_list(
            ObjectKind::Vm,
            vec![json!({ "id": "vm-1", "name": "a" }), json!({ "id": "vm-2", "name": "b" })],
        );
        let feed = source.feed(ObjectKind::Vm);

        let reflector = Arc::new(Reflector::new(ObjectKind::Vm, Arc::new(source), Duration::ZERO));
        let mut deltas = reflector.subscribe();
        let stop = CancellationToken::new();
        let task = spawn(&reflector, &stop);

        assert!(reflector.wait_for_sync(&stop).await);
        assert_eq!(reflector.status().phase, Phase::Synced);
        assert_eq!(reflector.store().len(), 2);

        feed.send(data(json!({ "vm": { "mutation": "DELETED", "previousValues": { "id": "vm-1" } } })))
            .await
            .unwrap();

        // Two Added from the list, then the deletion.
        assert_eq!(deltas.recv().await.unwrap().action(), "added");
        assert_eq!(deltas.recv().await.unwrap().action(), "added");
        let deleted = deltas.recv().await.unwrap();
        assert_eq!((deleted.action(), deleted.key()), ("deleted", "vm-1"));
        assert!(reflector.store().get("vm-1").is_none());

        stop.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn latest_write_for_a_key_wins() {
        let source = FakeSource::new();
        let feed = source.feed(ObjectKind::Vm);
        let reflector = Arc::new(Reflector::new(ObjectKind::Vm, Arc::new(source), Duration::ZERO));
        let mut deltas = reflector.subscribe();
        let stop = CancellationToken::new();
        let task = spawn(&reflector, &stop);

        assert!(reflector.wait_for_sync(&stop).await);

        for name in ["first", "second"] {
            feed.send(data(json!({ "vm": {
                "mutation": "UPDATED",
                "node": { "id": "vm-1", "name": name }
            }})))
            .await
            .unwrap();
        }

        assert_eq!(deltas.recv().await.unwrap().action(), "added");
        assert_eq!(deltas.recv().await.unwrap().action(), "updated");

        let stored = reflector.store().get("vm-1").unwrap();
        assert_eq!(stored.as_vm().unwrap().name, "second");
        assert_eq!(reflector.store().len(), 1);

        stop.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn data_before_terminal_error_is_applied() {
        let source = FakeSource::new();
        let feed = source.feed(ObjectKind::Label);
        let reflector = Arc::new(Reflector::new(ObjectKind::Label, Arc::new(source), Duration::ZERO));
        let stop = CancellationToken::new();

        feed.send(data(json!({ "label": { "mutation": "CREATED", "node": { "id": "l-1", "key": "a" } } })))
            .await
            .unwrap();
        feed.send(data(json!({ "label": { "mutation": "CREATED", "node": { "id": "l-2", "key": "b" } } })))
            .await
            .unwrap();
        feed.send(Response::connect_error("token expired")).await.unwrap();

        // Runs to completion on its own once the error arrives.
        spawn(&reflector, &stop).await.unwrap();

        let status = reflector.status();
        assert_eq!(status.phase, Phase::Failed);
        assert!(status.synced);
        assert!(matches!(status.last_error, Some(CoreError::Protocol { .. })));
        assert_eq!(reflector.store().keys().len(), 2);
        assert!(!stop.is_cancelled());
    }

    #[tokio::test]
    async fn watch_failure_fails_before_sync() {
        let source = FakeSource::new();
        source.fail_watch(ObjectKind::Vm, "connection refused");
        let reflector = Arc::new(Reflector::new(ObjectKind::Vm, Arc::new(source), Duration::ZERO));
        let stop = CancellationToken::new();

        spawn(&reflector, &stop).await.unwrap();

        let status = reflector.status();
        assert_eq!(status.phase, Phase::Failed);
        assert!(!status.synced);
        assert!(!reflector.wait_for_sync(&stop).await);
    }

    #[tokio::test]
    async fn undecodable_record_fails_reflector() {
        let source = FakeSource::new();
        let feed = source.feed(ObjectKind::Vm);
        let reflector = Arc::new(Reflector::new(ObjectKind::Vm, Arc::new(source), Duration::ZERO));
        let stop = CancellationToken::new();

        feed.send(data(json!({ "vm": { "mutation": "CREATED", "node": { "name": "no id" } } })))
            .await
            .unwrap();

        spawn(&reflector, &stop).await.unwrap();

        let status = reflector.status();
        assert_eq!(status.phase, Phase::Failed);
        assert!(reflector.store().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn resync_redelivers_without_changing_store() {
        let source = FakeSource::new();
        source.set_list(
            ObjectKind::Vm,
            vec![json!({ "id": "vm-1", "name": "a" }), json!({ "id": "vm-2", "name": "b" })],
        );
        let _feed = source.feed(ObjectKind::Vm);
        let reflector = Arc::new(Reflector::new(
            ObjectKind::Vm,
            Arc::new(source),
            Duration::from_secs(30),
        ));
        let mut deltas = reflector.subscribe();
        let stop = CancellationToken::new();
        let task = spawn(&reflector, &stop);

        assert!(reflector.wait_for_sync(&stop).await);
        let before = reflector.store().list();
        let version = reflector.store().version();
        deltas.recv().await.unwrap();
        deltas.recv().await.unwrap();

        tokio::time::sleep(Duration::from_secs(31)).await;

        let mut resynced: Vec<String> = Vec::new();
        for _ in 0..2 {
            let delta = deltas.recv().await.unwrap();
            assert!(matches!(delta, Delta::Resync(_)));
            resynced.push(delta.object().key().to_owned());
        }
        assert_eq!(resynced, vec!["vm-1", "vm-2"]);
        assert_eq!(reflector.store().list(), before);
        assert_eq!(reflector.store().version(), version);

        stop.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn due_resync_goes_ahead_of_queued_changes() {
        let (tx, rx) = mpsc::channel(RESPONSE_QUEUE_CAPACITY);
        let mut subscription = Subscription::new("busy", rx, StopHandle::new());
        let mut resync = tokio::time::interval(Duration::from_secs(30));
        resync.tick().await;
        let stop = CancellationToken::new();

        for n in 0..RESPONSE_QUEUE_CAPACITY {
            tx.try_send(data(json!({ "vm": {
                "mutation": "UPDATED",
                "node": { "id": "vm-1", "name": format!("v{n}") }
            }})))
            .unwrap();
        }
        tokio::time::advance(Duration::from_secs(31)).await;

        let wake = next_wake(&stop, &mut subscription, Some(&mut resync)).await;
        assert!(matches!(wake, Wake::Resync), "got {wake:?}");

        // The backlog is still intact and comes next.
        let wake = next_wake(&stop, &mut subscription, Some(&mut resync)).await;
        assert!(matches!(wake, Wake::Response(Some(_))), "got {wake:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn resync_still_fires_under_steady_traffic() {
        let source = FakeSource::new();
        let feed = source.feed(ObjectKind::Vm);
        let reflector = Arc::new(Reflector::new(
            ObjectKind::Vm,
            Arc::new(source),
            Duration::from_secs(30),
        ));
        let mut deltas = reflector.subscribe();
        let stop = CancellationToken::new();
        let task = spawn(&reflector, &stop);
        assert!(reflector.wait_for_sync(&stop).await);

        let producer = tokio::spawn(async move {
            for n in 0u64.. {
                let update = data(json!({ "vm": {
                    "mutation": "UPDATED",
                    "node": { "id": "vm-1", "name": format!("v{n}") }
                }}));
                if feed.send(update).await.is_err() {
                    break;
                }
            }
        });

        // Let the watch get busy, then move past the resync deadline.
        while reflector.store().is_empty() {
            tokio::task::yield_now().await;
        }
        tokio::time::advance(Duration::from_secs(31)).await;

        let mut updates = 0usize;
        loop {
            match deltas.recv().await {
                Ok(Delta::Resync(object)) => {
                    assert_eq!(object.key(), "vm-1");
                    break;
                }
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => updates += 1,
                Err(broadcast::error::RecvError::Closed) => panic!("reflector went away"),
            }
            assert!(updates < 10_000, "resync never arrived");
        }

        stop.cancel();
        task.await.unwrap();
        producer.abort();
    }

    #[tokio::test]
    async fn stop_before_run_never_contacts_source() {
        let source = Arc::new(FakeSource::new());
        let reflector = Reflector::new(ObjectKind::Vm, Arc::clone(&source), Duration::ZERO);
        let stop = CancellationToken::new();
        stop.cancel();

        reflector.run(stop.clone()).await;

        assert_eq!(reflector.status().phase, Phase::Initializing);
        assert_eq!(source.watch_calls(), 0);
        assert!(!reflector.wait_for_sync(&stop).await);
    }
}
