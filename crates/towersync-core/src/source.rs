// ── List/watch source ──
//
// The reflector needs two things from the server: everything of a kind
// right now, and a stream of changes from now on. `ListWatch` names that
// contract so the reflector can run against `TowerClient` or a fake.

use std::future::Future;

use serde::Deserialize;
use serde_json::Value;
use towersync_api::{Subscription, TowerClient};
use tracing::debug;

use crate::error::CoreError;
use crate::model::{Object, ObjectKind, ObjectReference};
use crate::store::Change;

/// Lists and watches objects of one kind at a time.
pub trait ListWatch: Send + Sync + 'static {
    /// Every object of `kind`, as raw JSON.
    fn list(&self, kind: ObjectKind) -> impl Future<Output = Result<Vec<Value>, CoreError>> + Send;

    /// A subscription delivering change records for `kind`.
    fn watch(&self, kind: ObjectKind) -> impl Future<Output = Result<Subscription, CoreError>> + Send;
}

impl ListWatch for TowerClient {
    async fn list(&self, kind: ObjectKind) -> Result<Vec<Value>, CoreError> {
        let resp = self
            .query(&kind.list_request())
            .await
            .map_err(|e| CoreError::from_api(e, self.endpoint()))?;
        if !resp.is_ok() {
            return Err(CoreError::from_response(&resp));
        }

        match resp.lookup(&[kind.list_field()]) {
            Some(Value::Array(items)) => {
                debug!(%kind, count = items.len(), "listed objects");
                Ok(items.clone())
            }
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(other) => Err(CoreError::Protocol {
                message: format!(
                    "expected an array at data.{}, got {other}",
                    kind.list_field()
                ),
            }),
        }
    }

    async fn watch(&self, kind: ObjectKind) -> Result<Subscription, CoreError> {
        self.subscription(&kind.watch_request())
            .await
            .map_err(|e| CoreError::from_api(e, self.endpoint()))
    }
}

// ── Change records ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum MutationType {
    Created,
    Updated,
    Deleted,
}

/// `{ mutation, node, previousValues }` as delivered by a watch.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangeRecord {
    mutation: MutationType,
    #[serde(default)]
    node: Option<Value>,
    #[serde(default)]
    previous_values: Option<ObjectReference>,
}

/// Decode a listed array into objects of `kind`.
pub fn decode_list(kind: ObjectKind, items: Vec<Value>) -> Result<Vec<Object>, CoreError> {
    items
        .into_iter()
        .map(|item| {
            Object::decode(kind, item).map_err(|e| CoreError::Protocol {
                message: format!("cannot decode listed {kind}: {e}"),
            })
        })
        .collect()
}

/// Decode one watch payload into store changes.
///
/// The payload's `data` holds the watch field (`vm`, `label`) whose value
/// is a single change record or an array of them. A `data` object without
/// the watch field is read as the record itself.
pub fn decode_changes(kind: ObjectKind, data: Value) -> Result<Vec<Change>, CoreError> {
    let body = match data {
        Value::Object(mut map) if map.contains_key(kind.watch_field()) => {
            map.remove(kind.watch_field()).unwrap_or(Value::Null)
        }
        other => other,
    };

    let records = match body {
        Value::Null => Vec::new(),
        Value::Array(items) => items,
        record => vec![record],
    };

    records
        .into_iter()
        .map(|raw| decode_record(kind, raw))
        .collect()
}

fn decode_record(kind: ObjectKind, raw: Value) -> Result<Change, CoreError> {
    let invalid = |reason: String| CoreError::Protocol {
        message: format!("invalid {kind} change record: {reason}"),
    };

    let record: ChangeRecord = serde_json::from_value(raw).map_err(|e| invalid(e.to_string()))?;

    match record.mutation {
        MutationType::Created | MutationType::Updated => {
            let node = record
                .node
                .filter(|n| !n.is_null())
                .ok_or_else(|| invalid("missing node".into()))?;
            let object = Object::decode(kind, node).map_err(|e| invalid(e.to_string()))?;
            Ok(Change::Upsert(object))
        }
        MutationType::Deleted => {
            let key = record
                .previous_values
                .map(|prev| prev.id)
                .or_else(|| {
                    record
                        .node
                        .as_ref()
                        .and_then(|n| n.get("id"))
                        .and_then(Value::as_str)
                        .map(str::to_owned)
                })
                .ok_or_else(|| invalid("deletion without previousValues.id".into()))?;
            Ok(Change::Delete(key))
        }
    }
}
