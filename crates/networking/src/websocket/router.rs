//! Inbound frame decoding and dispatch

use coldchain_core::{Error, InboundMessage, Location, TemperatureReading};
use serde::Deserialize;
use serde_json::Value;
use tracing::{trace, warn};

/// An inbound frame that could not be decoded
#[derive(thiserror::Error, Debug)]
pub enum ProtocolError {
    #[error("frame is not valid JSON: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("shipment_update frame without update_type")]
    MissingUpdateType,

    #[error("invalid {kind} payload: {source}")]
    InvalidPayload {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl From<ProtocolError> for Error {
    fn from(err: ProtocolError) -> Self {
        Error::Protocol(err.to_string())
    }
}

/// Receives decoded frames; every method defaults to a no-op
pub trait MessageHandler {
    fn on_location(&mut self, _data: Location, _timestamp: &str) {}
    fn on_temperature(&mut self, _data: TemperatureReading, _timestamp: &str) {}
    fn on_status(&mut self, _data: Value, _timestamp: &str) {}
    fn on_temperature_alert(&mut self, _data: Value, _timestamp: &str) {}
}

/// What happened to a routed frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    Dispatched(&'static str),
    /// Unknown `type` / `update_type`
    Ignored,
    /// Undecodable; logged and dropped
    Rejected,
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    frame_type: String,
    #[serde(default)]
    update_type: Option<String>,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    timestamp: String,
}

/// Stateless decoder/dispatcher for tracking frames
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageRouter;

impl MessageRouter {
    /// Decode one raw frame
    ///
    /// `Ok(None)` means the frame is well-formed but of a kind this client
    /// does not know; such frames are dropped without complaint.
    pub fn decode(raw: &str) -> Result<Option<InboundMessage>, ProtocolError> {
        let frame: RawFrame = serde_json::from_str(raw).map_err(ProtocolError::Malformed)?;
        let RawFrame {
            frame_type,
            update_type,
            data,
            timestamp,
        } = frame;

        let message = match frame_type.as_str() {
            "shipment_update" => {
                let update_type = update_type.ok_or(ProtocolError::MissingUpdateType)?;
                match update_type.as_str() {
                    "location" => InboundMessage::Location {
                        data: typed("location", data)?,
                        timestamp,
                    },
                    "temperature" => InboundMessage::Temperature {
                        data: typed("temperature", data)?,
                        timestamp,
                    },
                    "status" => InboundMessage::Status { data, timestamp },
                    other => {
                        trace!("Ignoring shipment_update with update_type '{}'", other);
                        return Ok(None);
                    }
                }
            }
            "temperature_alert" => InboundMessage::TemperatureAlert { data, timestamp },
            other => {
                trace!("Ignoring frame of type '{}'", other);
                return Ok(None);
            }
        };

        Ok(Some(message))
    }

    /// Hand an already decoded message to the matching handler method
    pub fn dispatch<H: MessageHandler + ?Sized>(message: InboundMessage, handler: &mut H) {
        match message {
            InboundMessage::Location { data, timestamp } => handler.on_location(data, &timestamp),
            InboundMessage::Temperature { data, timestamp } => {
                handler.on_temperature(data, &timestamp)
            }
            InboundMessage::Status { data, timestamp } => handler.on_status(data, &timestamp),
            InboundMessage::TemperatureAlert { data, timestamp } => {
                handler.on_temperature_alert(data, &timestamp)
            }
        }
    }

    /// Decode and dispatch; protocol errors are logged, never raised
    pub fn route<H: MessageHandler + ?Sized>(raw: &str, handler: &mut H) -> RouteOutcome {
        match Self::decode(raw) {
            Ok(Some(message)) => {
                let kind = message.kind();
                Self::dispatch(message, handler);
                RouteOutcome::Dispatched(kind)
            }
            Ok(None) => RouteOutcome::Ignored,
            Err(e) => {
                warn!("Dropping inbound frame: {}", e);
                RouteOutcome::Rejected
            }
        }
    }
}

fn typed<T: serde::de::DeserializeOwned>(
    kind: &'static str,
    data: Value,
) -> Result<T, ProtocolError> {
    serde_json::from_value(data).map_err(|source| ProtocolError::InvalidPayload { kind, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
    }

    impl MessageHandler for Recorder {
        fn on_location(&mut self, data: Location, timestamp: &str) {
            self.calls
                .push(format!("location {} {} @{}", data.latitude, data.longitude, timestamp));
        }

        fn on_temperature(&mut self, data: TemperatureReading, _timestamp: &str) {
            self.calls.push(format!("temperature {}", data.temperature));
        }

        fn on_status(&mut self, data: Value, _timestamp: &str) {
            self.calls.push(format!("status {}", data["status"]));
        }

        fn on_temperature_alert(&mut self, _data: Value, timestamp: &str) {
            self.calls.push(format!("alert @{}", timestamp));
        }
    }

    #[test]
    fn test_routes_each_kind() {
        let mut recorder = Recorder::default();
        let frames = [
            json!({"type": "shipment_update", "update_type": "location",
                   "data": {"latitude": 15.3694, "longitude": 44.191}, "timestamp": "t1"}),
            json!({"type": "shipment_update", "update_type": "temperature",
                   "data": {"temperature": 6.0, "avg_temperature": 5.8,
                            "has_violations": false, "violations": []},
                   "timestamp": "t2"}),
            json!({"type": "shipment_update", "update_type": "status",
                   "data": {"status": "in_transit"}, "timestamp": "t3"}),
            json!({"type": "temperature_alert", "data": {"level": "high"}, "timestamp": "t4"}),
        ];

        let outcomes: Vec<RouteOutcome> = frames
            .iter()
            .map(|frame| MessageRouter::route(&frame.to_string(), &mut recorder))
            .collect();

        assert_eq!(
            outcomes,
            vec![
                RouteOutcome::Dispatched("location"),
                RouteOutcome::Dispatched("temperature"),
                RouteOutcome::Dispatched("status"),
                RouteOutcome::Dispatched("temperature_alert"),
            ]
        );
        assert_eq!(
            recorder.calls,
            vec![
                "location 15.3694 44.191 @t1",
                "temperature 6",
                "status \"in_transit\"",
                "alert @t4",
            ]
        );
    }

    #[test]
    fn test_unknown_kinds_are_ignored() {
        let mut recorder = Recorder::default();
        let unknown_type = r#"{"type": "fleet_broadcast", "data": {}, "timestamp": "t"}"#;
        let unknown_update = r#"{"type": "shipment_update", "update_type": "humidity",
                                 "data": {}, "timestamp": "t"}"#;

        assert_eq!(MessageRouter::route(unknown_type, &mut recorder), RouteOutcome::Ignored);
        assert_eq!(MessageRouter::route(unknown_update, &mut recorder), RouteOutcome::Ignored);
        assert!(recorder.calls.is_empty());
    }

    #[test]
    fn test_malformed_frames_are_rejected() {
        let mut recorder = Recorder::default();

        assert_eq!(MessageRouter::route("not json", &mut recorder), RouteOutcome::Rejected);
        assert_eq!(MessageRouter::route(r#"{"data": {}}"#, &mut recorder), RouteOutcome::Rejected);
        assert!(matches!(
            MessageRouter::decode(r#"{"type": "shipment_update", "data": {}}"#),
            Err(ProtocolError::MissingUpdateType)
        ));
        assert!(matches!(
            MessageRouter::decode(
                r#"{"type": "shipment_update", "update_type": "location",
                    "data": {"latitude": "north"}}"#
            ),
            Err(ProtocolError::InvalidPayload { kind: "location", .. })
        ));
        assert!(recorder.calls.is_empty());
    }
}
