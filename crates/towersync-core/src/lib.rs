//! Shared informers over the Tower API.
//!
//! This crate keeps local, continuously updated caches of Tower objects
//! for consumers that would otherwise poll:
//!
//! - **[`SharedInformerFactory`]**: Registry handing out one
//!   [`Reflector`] per [`ObjectKind`], shared by every consumer.
//!   [`start()`](SharedInformerFactory::start) spawns them,
//!   [`wait_for_cache_sync()`](SharedInformerFactory::wait_for_cache_sync)
//!   blocks until their initial lists are in.
//!
//! - **[`Reflector`]**: Opens a watch, lists, and then applies change
//!   records to its store. Publishes every applied change as a [`Delta`]
//!   and its lifecycle as a [`ReflectorStatus`].
//!
//! - **[`IndexedStore`]**: Lock-free key → object map (`DashMap` plus a
//!   `tokio::sync::watch` snapshot) with point lookups and full listings.
//!
//! - **[`ListWatch`]**: The list/watch contract, implemented for
//!   `towersync_api::TowerClient`.
//!
//! - **Object model** ([`model`]): [`Vm`] and [`Label`] descriptors,
//!   unified as [`Object`].

pub mod config;
pub mod error;
pub mod informer;
pub mod model;
pub mod reflector;
pub mod source;
pub mod store;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod testing;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{ConnectionConfig, TlsVerification};
pub use error::CoreError;
pub use informer::{SharedInformerFactory, require_synced};
pub use model::{Label, Object, ObjectKind, ObjectReference, RemoteObject, Vm};
pub use reflector::{Phase, Reflector, ReflectorStatus};
pub use source::ListWatch;
pub use store::{Change, Delta, IndexedStore, Snapshot};
