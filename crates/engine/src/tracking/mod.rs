//! Per-shipment live tracking

mod projection;
mod tracker;

pub use projection::ShipmentTrackingProjection;
pub use tracker::{retarget, spawn_tracker, LinkStatus, TrackerHandle, TrackerStatus};
