//! REST collaborator client

mod client;
mod credentials;

pub use client::ApiClient;
pub use credentials::{CredentialSupplier, StaticCredentials};
