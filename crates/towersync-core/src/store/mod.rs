// ── Indexed object store ──
//
// One store per object kind, written only by that kind's reflector and
// read concurrently by any number of consumers.

mod delta;
mod indexed;

pub use delta::{Change, Delta};
pub use indexed::{IndexedStore, Snapshot};
