//! High-level wrappers around the REST client
//!
//! Adds the small amount of business logic the tracker needs on top of
//! the raw endpoints.

mod shipments;

pub use shipments::*;
