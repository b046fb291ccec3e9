//! Cold-chain Networking - Tracking socket, REST client, and API wrappers

pub mod api;
pub mod http;
pub mod websocket;

pub use http::{ApiClient, CredentialSupplier, StaticCredentials};
pub use websocket::{ConnectionManager, ConnectionState};
