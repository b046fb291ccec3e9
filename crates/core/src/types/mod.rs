//! Shared type definitions and newtypes

use serde::{de, Deserialize, Deserializer, Serialize};
use std::fmt;

/// Identifier of a shipment as issued by the tracking server
///
/// The API may hand out integer primary keys or string references; both
/// decode into the same textual id used in socket paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ShipmentId(pub String);

impl<'de> Deserialize<'de> for ShipmentId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct IdVisitor;

        impl<'de> de::Visitor<'de> for IdVisitor {
            type Value = ShipmentId;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a shipment id as a string or integer")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<ShipmentId, E> {
                Ok(ShipmentId::new(v))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<ShipmentId, E> {
                Ok(ShipmentId(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<ShipmentId, E> {
                Ok(ShipmentId(v.to_string()))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<ShipmentId, E> {
                Ok(ShipmentId(v.to_string()))
            }
        }

        deserializer.deserialize_any(IdVisitor)
    }
}

impl ShipmentId {
    pub fn new(id: impl Into<String>) -> Self {
        ShipmentId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShipmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A named push channel (`subscription_type` on the wire)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topic(pub String);

impl Topic {
    /// The topic carrying per-shipment location/temperature/status updates
    pub const SHIPMENTS: &'static str = "shipments";

    pub fn new(name: impl Into<String>) -> Self {
        Topic(name.into())
    }

    pub fn shipments() -> Self {
        Topic::new(Self::SHIPMENTS)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Topic {
    fn from(name: &str) -> Self {
        Topic::new(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shipment_id_accepts_integers_and_strings() {
        let numeric: ShipmentId = serde_json::from_str("42").unwrap();
        let textual: ShipmentId = serde_json::from_str(r#""SHP-42""#).unwrap();

        assert_eq!(numeric.as_str(), "42");
        assert_eq!(textual.as_str(), "SHP-42");
        assert!(serde_json::from_str::<ShipmentId>("4.2").is_err());
        assert!(serde_json::from_str::<ShipmentId>("null").is_err());
    }

    #[test]
    fn test_shipment_id_serializes_as_string() {
        assert_eq!(serde_json::to_string(&ShipmentId::new("42")).unwrap(), r#""42""#);
    }
}
