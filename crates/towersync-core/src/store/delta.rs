// ── Store mutations and the deltas they produce ──

use std::sync::Arc;

use crate::model::{Object, RemoteObject};

/// One mutation to apply to a store.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// Insert or replace the object under its key.
    Upsert(Object),
    /// Remove whatever is stored under this key.
    Delete(String),
}

impl Change {
    pub fn key(&self) -> &str {
        match self {
            Self::Upsert(obj) => obj.key(),
            Self::Delete(key) => key,
        }
    }
}

/// What a consumer observes when a store changes.
///
/// `Resync` re-delivers an object that did not change, so consumers that
/// act on every delivery get a periodic chance to reconcile.
#[derive(Debug, Clone, PartialEq)]
pub enum Delta {
    Added(Arc<Object>),
    Updated { old: Arc<Object>, new: Arc<Object> },
    Deleted(Arc<Object>),
    Resync(Arc<Object>),
}

impl Delta {
    /// The object as it stands after this delta (the removed object for
    /// `Deleted`).
    pub fn object(&self) -> &Arc<Object> {
        match self {
            Self::Added(obj) | Self::Deleted(obj) | Self::Resync(obj) => obj,
            Self::Updated { new, .. } => new,
        }
    }

    pub fn key(&self) -> &str {
        self.object().key()
    }

    /// Short lowercase label, used in logs and CLI output.
    pub fn action(&self) -> &'static str {
        match self {
            Self::Added(_) => "added",
            Self::Updated { .. } => "updated",
            Self::Deleted(_) => "deleted",
            Self::Resync(_) => "resync",
        }
    }
}
