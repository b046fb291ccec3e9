//! Data models for tracking frames, alerts, shipments and the view model

mod alert;
mod shipment;
mod tracking;
mod view;

pub use alert::*;
pub use shipment::*;
pub use tracking::*;
pub use view::*;
