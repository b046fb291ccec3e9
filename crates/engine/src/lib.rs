//! Cold-chain Engine - Shipment tracking projection and tracker lifecycle

pub mod config;
pub mod tracking;

pub use config::TrackerConfig;
pub use tracking::{spawn_tracker, ShipmentTrackingProjection, TrackerHandle};
