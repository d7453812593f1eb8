// ── Object kinds ──
//
// The informer registry, the store, and the wire queries are all keyed
// by `ObjectKind`. Each kind knows the GraphQL fields used to list it and
// to watch it, and the selection set shared by both.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use towersync_api::Request;

/// A kind of Tower object the informers can cache.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ObjectKind {
    Vm,
    Label,
}

const VM_SELECTION: &str = "id name description status vcpu memory cluster { id } host { id }";
const LABEL_SELECTION: &str = "id key value vms { id }";

impl ObjectKind {
    /// Query field returning every object of this kind.
    pub fn list_field(self) -> &'static str {
        match self {
            Self::Vm => "vms",
            Self::Label => "labels",
        }
    }

    /// Subscription field delivering change records for this kind.
    pub fn watch_field(self) -> &'static str {
        match self {
            Self::Vm => "vm",
            Self::Label => "label",
        }
    }

    /// GraphQL selection set for one object.
    pub fn selection(self) -> &'static str {
        match self {
            Self::Vm => VM_SELECTION,
            Self::Label => LABEL_SELECTION,
        }
    }

    /// `query { vms { ... } }`
    pub fn list_request(self) -> Request {
        Request::new(format!(
            "query {{ {} {{ {} }} }}",
            self.list_field(),
            self.selection()
        ))
    }

    /// `subscription { vm { mutation node { ... } previousValues { id } } }`
    pub fn watch_request(self) -> Request {
        Request::new(format!(
            "subscription {{ {} {{ mutation node {{ {} }} previousValues {{ id }} }} }}",
            self.watch_field(),
            self.selection()
        ))
    }
}
