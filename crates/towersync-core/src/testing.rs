// In-memory list/watch source for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::Value;
use tokio::sync::mpsc;
use towersync_api::subscription::RESPONSE_QUEUE_CAPACITY;
use towersync_api::{Response, StopHandle, Subscription};

use crate::error::CoreError;
use crate::model::ObjectKind;
use crate::source::ListWatch;

/// Serves canned lists and hands out one pre-wired subscription per kind.
#[derive(Default)]
pub(crate) struct FakeSource {
    lists: Mutex<HashMap<ObjectKind, Vec<Value>>>,
    feeds: Mutex<HashMap<ObjectKind, mpsc::Receiver<Response>>>,
    watch_failures: Mutex<HashMap<ObjectKind, String>>,
    stops: Mutex<Vec<StopHandle>>,
    watch_calls: AtomicUsize,
}

impl FakeSource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_list(&self, kind: ObjectKind, items: Vec<Value>) {
        self.lists.lock().unwrap().insert(kind, items);
    }

    /// Wire up the subscription `watch(kind)` will return; responses sent
    /// on the returned sender are delivered through it.
    pub(crate) fn feed(&self, kind: ObjectKind) -> mpsc::Sender<Response> {
        let (tx, rx) = mpsc::channel(RESPONSE_QUEUE_CAPACITY);
        self.feeds.lock().unwrap().insert(kind, rx);
        tx
    }

    pub(crate) fn fail_watch(&self, kind: ObjectKind, reason: &str) {
        self.watch_failures
            .lock()
            .unwrap()
            .insert(kind, reason.to_owned());
    }

    pub(crate) fn watch_calls(&self) -> usize {
        self.watch_calls.load(Ordering::SeqCst)
    }

    /// Stop handles of every subscription handed out so far.
    pub(crate) fn stop_handles(&self) -> Vec<StopHandle> {
        self.stops.lock().unwrap().clone()
    }
}

impl ListWatch for FakeSource {
    async fn list(&self, kind: ObjectKind) -> Result<Vec<Value>, CoreError> {
        Ok(self
            .lists
            .lock()
            .unwrap()
            .get(&kind)
            .cloned()
            .unwrap_or_default())
    }

    async fn watch(&self, kind: ObjectKind) -> Result<Subscription, CoreError> {
        self.watch_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(reason) = self.watch_failures.lock().unwrap().get(&kind) {
            return Err(CoreError::ConnectionFailed {
                url: "fake://tower".into(),
                reason: reason.clone(),
            });
        }

        let rx = self
            .feeds
            .lock()
            .unwrap()
            .remove(&kind)
            .ok_or_else(|| CoreError::Internal(format!("no feed wired for {kind}")))?;

        let stop = StopHandle::new();
        self.stops.lock().unwrap().push(stop.clone());
        Ok(Subscription::new(format!("fake-{kind}"), rx, stop))
    }
}
