//! Alert log entries

use serde::{Deserialize, Serialize};

/// What raised the alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// A temperature reading arrived with `has_violations = true`
    TemperatureViolation,
    /// The server pushed a dedicated `temperature_alert` frame
    TemperatureAlert,
}

/// One entry in the append-only alert log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub message: String,
    pub data: serde_json::Value,
    pub timestamp: String,
}

impl Alert {
    pub fn temperature_violation(data: serde_json::Value, timestamp: &str) -> Self {
        Self {
            kind: AlertKind::TemperatureViolation,
            message: "Temperature violation detected".to_string(),
            data,
            timestamp: timestamp.to_string(),
        }
    }

    pub fn temperature_alert(data: serde_json::Value, timestamp: &str) -> Self {
        Self {
            kind: AlertKind::TemperatureAlert,
            message: "Temperature alert".to_string(),
            data,
            timestamp: timestamp.to_string(),
        }
    }
}
