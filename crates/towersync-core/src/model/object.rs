// ── Cached objects ──

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::kind::ObjectKind;
use super::label::Label;
use super::vm::Vm;

/// Capability shared by every cached object: a stable key to index by.
pub trait RemoteObject {
    fn key(&self) -> &str;
}

/// A by-id reference to another object (`{ id }` selections).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectReference {
    pub id: String,
}

/// Any object an informer can hold.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Object {
    Vm(Vm),
    Label(Label),
}

impl Object {
    /// Decode a raw JSON object as `kind`.
    pub fn decode(kind: ObjectKind, value: Value) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            ObjectKind::Vm => Self::Vm(serde_json::from_value(value)?),
            ObjectKind::Label => Self::Label(serde_json::from_value(value)?),
        })
    }

    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Vm(_) => ObjectKind::Vm,
            Self::Label(_) => ObjectKind::Label,
        }
    }

    pub fn as_vm(&self) -> Option<&Vm> {
        match self {
            Self::Vm(vm) => Some(vm),
            Self::Label(_) => None,
        }
    }

    pub fn as_label(&self) -> Option<&Label> {
        match self {
            Self::Label(label) => Some(label),
            Self::Vm(_) => None,
        }
    }
}

impl RemoteObject for Object {
    fn key(&self) -> &str {
        match self {
            Self::Vm(vm) => vm.key(),
            Self::Label(label) => label.key(),
        }
    }
}
