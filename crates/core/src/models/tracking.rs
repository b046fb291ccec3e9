//! Real-time tracking wire models
//!
//! Outbound control frames and the typed payloads carried by inbound
//! `shipment_update` / `temperature_alert` frames.

use serde::{Deserialize, Serialize};

use crate::types::Topic;

/// Subscribe or unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionAction {
    Subscribe,
    Unsubscribe,
}

/// Outbound control frame
///
/// `{"action": "subscribe", "subscription_type": "shipments"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlFrame {
    pub action: SubscriptionAction,
    pub subscription_type: Topic,
}

impl ControlFrame {
    pub fn subscribe(topic: Topic) -> Self {
        Self {
            action: SubscriptionAction::Subscribe,
            subscription_type: topic,
        }
    }

    pub fn unsubscribe(topic: Topic) -> Self {
        Self {
            action: SubscriptionAction::Unsubscribe,
            subscription_type: topic,
        }
    }
}

/// Last known vehicle position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// A product whose temperature left its allowed band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureViolation {
    pub product_name: String,
    pub temperature: f64,
    pub min_temp: f64,
    pub max_temp: f64,
}

/// Temperature reading pushed with `update_type: "temperature"`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureReading {
    pub temperature: f64,
    pub avg_temperature: f64,
    #[serde(default)]
    pub has_violations: bool,
    #[serde(default)]
    pub violations: Vec<TemperatureViolation>,
}

/// Decoded inbound frame
///
/// Every variant keeps the server-provided `timestamp` verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// `shipment_update` / `location`
    Location { data: Location, timestamp: String },
    /// `shipment_update` / `temperature`
    Temperature {
        data: TemperatureReading,
        timestamp: String,
    },
    /// `shipment_update` / `status`
    Status {
        data: serde_json::Value,
        timestamp: String,
    },
    /// `temperature_alert`
    TemperatureAlert {
        data: serde_json::Value,
        timestamp: String,
    },
}

impl InboundMessage {
    /// Short label for logging
    pub fn kind(&self) -> &'static str {
        match self {
            InboundMessage::Location { .. } => "location",
            InboundMessage::Temperature { .. } => "temperature",
            InboundMessage::Status { .. } => "status",
            InboundMessage::TemperatureAlert { .. } => "temperature_alert",
        }
    }

    pub fn timestamp(&self) -> &str {
        match self {
            InboundMessage::Location { timestamp, .. }
            | InboundMessage::Temperature { timestamp, .. }
            | InboundMessage::Status { timestamp, .. }
            | InboundMessage::TemperatureAlert { timestamp, .. } => timestamp,
        }
    }
}
