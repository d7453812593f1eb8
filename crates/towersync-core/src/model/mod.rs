// ── Tower object model ──
//
// Every type in this module is the canonical representation of a Tower
// object as the informers cache it. Fields the model does not name are
// kept in `extra` so objects pass through the cache unmodified.

pub mod kind;
pub mod label;
pub mod object;
pub mod vm;

// ── Re-exports ──────────────────────────────────────────────────────

pub use kind::ObjectKind;
pub use label::Label;
pub use object::{Object, ObjectReference, RemoteObject};
pub use vm::Vm;
