// towersync-api: Async Rust client for the Tower GraphQL API (query + graphql-ws push)

pub mod auth;
pub mod client;
pub mod error;
pub mod message;
pub mod subscription;
pub mod transport;

pub use auth::{LoginCredentials, UserSource};
pub use client::{Channel, TowerClient, select_scheme};
pub use error::Error;
pub use message::{Message, MessageKind, Request, Response, ResponseError, WEBSOCKET_CONNECT_ERROR};
pub use subscription::{StopHandle, Subscription};
pub use transport::{TlsMode, TransportConfig};
