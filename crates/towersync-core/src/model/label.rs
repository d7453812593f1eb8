// ── Label descriptor ──

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::object::{ObjectReference, RemoteObject};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub id: String,
    #[serde(default)]
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// VMs carrying this label.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub vms: Vec<ObjectReference>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RemoteObject for Label {
    fn key(&self) -> &str {
        &self.id
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<ObjectReference>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<ObjectReference>>::deserialize(deserializer)?.unwrap_or_default())
}
