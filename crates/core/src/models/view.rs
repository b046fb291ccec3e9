//! Per-shipment view model consumed by the UI layer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Alert, Location, TemperatureReading};

/// Folded state of one tracked shipment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackingViewModel {
    pub location: Option<Location>,
    pub temperature: Option<TemperatureReading>,
    /// Last `status` payload, kept opaque
    pub shipment_data: Option<serde_json::Value>,
    /// Arrival order, never deduplicated or truncated
    pub alerts: Vec<Alert>,
    /// Local receive time of the most recent projected frame
    pub last_update: Option<DateTime<Utc>>,
}

impl TrackingViewModel {
    /// Whether the latest reading is out of range
    pub fn has_violations(&self) -> bool {
        self.temperature
            .as_ref()
            .map(|t| t.has_violations)
            .unwrap_or(false)
    }
}
