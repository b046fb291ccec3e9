//! Folds routed tracking frames into the per-shipment view model

use chrono::Utc;
use coldchain_core::{Alert, Location, TemperatureReading, TrackingViewModel};
use coldchain_networking::websocket::MessageHandler;
use serde_json::Value;
use tracing::{debug, warn};

/// Per-shipment projection
#[derive(Debug, Clone, Default)]
pub struct ShipmentTrackingProjection {
    view: TrackingViewModel,
}

impl ShipmentTrackingProjection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> &TrackingViewModel {
        &self.view
    }

    fn touch(&mut self) {
        self.view.last_update = Some(Utc::now());
    }
}

impl MessageHandler for ShipmentTrackingProjection {
    fn on_location(&mut self, data: Location, _timestamp: &str) {
        debug!("Location {:.4}, {:.4}", data.latitude, data.longitude);
        self.view.location = Some(data);
        self.touch();
    }

    fn on_temperature(&mut self, data: TemperatureReading, timestamp: &str) {
        if data.has_violations {
            warn!(
                "Temperature violation at {}: {}°C, {} product(s) out of range",
                timestamp,
                data.temperature,
                data.violations.len()
            );
            let payload = serde_json::to_value(&data).unwrap_or(Value::Null);
            self.view
                .alerts
                .push(Alert::temperature_violation(payload, timestamp));
        }

        self.view.temperature = Some(data);
        self.touch();
    }

    fn on_status(&mut self, data: Value, _timestamp: &str) {
        self.view.shipment_data = Some(data);
        self.touch();
    }

    fn on_temperature_alert(&mut self, data: Value, timestamp: &str) {
        warn!("Temperature alert at {}", timestamp);
        self.view.alerts.push(Alert::temperature_alert(data, timestamp));
        self.touch();
    }
}
