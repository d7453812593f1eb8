// ── Virtual machine descriptor ──

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::object::{ObjectReference, RemoteObject};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vm {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vcpu: Option<u32>,
    /// Bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<ObjectReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<ObjectReference>,

    /// Fields not modelled above, passed through unmodified.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RemoteObject for Vm {
    fn key(&self) -> &str {
        &self.id
    }
}
