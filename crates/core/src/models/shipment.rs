//! Shipment models returned by the REST API

use serde::{Deserialize, Serialize};

use crate::types::ShipmentId;

/// Shipment lifecycle status as reported by the REST API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    Pending,
    InTransit,
    Delivered,
    Cancelled,
    #[serde(other)]
    Unknown,
}

/// Shipment row from GET /api/shipments/
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentSummary {
    pub id: ShipmentId,
    #[serde(default)]
    pub reference: Option<String>,
    pub status: ShipmentStatus,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub vehicle: Option<String>,
    /// Allowed range in °C; decimal strings from the API, absent when unset
    #[serde(default, deserialize_with = "deserialize_celsius")]
    pub min_temperature: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_celsius")]
    pub max_temperature: Option<f64>,
    #[serde(default)]
    pub departed_at: Option<String>,
    #[serde(default)]
    pub eta: Option<String>,
}

/// Query filter for listing shipments
#[derive(Debug, Clone, Default, Serialize)]
pub struct ShipmentFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ShipmentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facility: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

impl ShipmentSummary {
    /// Both bounds of the allowed temperature range, when configured
    pub fn temperature_range(&self) -> Option<(f64, f64)> {
        Some((self.min_temperature?, self.max_temperature?))
    }
}

impl ShipmentFilter {
    pub fn in_transit() -> Self {
        Self {
            status: Some(ShipmentStatus::InTransit),
            ..Self::default()
        }
    }
}

/// List endpoints answer either a bare array or a paginated envelope
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ShipmentListResponse {
    Paginated { results: Vec<ShipmentSummary> },
    Plain(Vec<ShipmentSummary>),
}

impl ShipmentListResponse {
    pub fn into_vec(self) -> Vec<ShipmentSummary> {
        match self {
            ShipmentListResponse::Paginated { results } => results,
            ShipmentListResponse::Plain(items) => items,
        }
    }
}

/// Temperature bound given as a number, a decimal string, or null
///
/// Null and blank strings mean "no bound"; anything else must parse.
fn deserialize_celsius<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de;

    struct Celsius;

    impl<'de> de::Visitor<'de> for Celsius {
        type Value = Option<f64>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a temperature as a number, decimal string, or null")
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Self::Value, E> {
            Ok(Some(v))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Self::Value, E> {
            Ok(Some(v as f64))
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Self::Value, E> {
            Ok(Some(v as f64))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Self::Value, E> {
            let v = v.trim();
            if v.is_empty() {
                return Ok(None);
            }
            v.parse::<f64>()
                .map(Some)
                .map_err(|_| E::custom(format!("'{}' is not a temperature", v)))
        }

        fn visit_none<E: de::Error>(self) -> std::result::Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> std::result::Result<Self::Value, E> {
            Ok(None)
        }
    }

    deserializer.deserialize_any(Celsius)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_strings_and_unknown_status() {
        let json = r#"{
            "id": "SHP-1042",
            "status": "held_at_customs",
            "min_temperature": "2.00",
            "max_temperature": 8
        }"#;
        let shipment: ShipmentSummary = serde_json::from_str(json).unwrap();
        assert_eq!(shipment.id.as_str(), "SHP-1042");
        assert_eq!(shipment.status, ShipmentStatus::Unknown);
        assert_eq!(shipment.temperature_range(), Some((2.0, 8.0)));
    }

    #[test]
    fn test_integer_ids_and_missing_bounds() {
        let json = r#"{"id": 42, "status": "in_transit", "min_temperature": null}"#;
        let shipment: ShipmentSummary = serde_json::from_str(json).unwrap();

        assert_eq!(shipment.id.as_str(), "42");
        assert_eq!(shipment.min_temperature, None);
        assert_eq!(shipment.max_temperature, None);
        assert_eq!(shipment.temperature_range(), None);

        let garbage = r#"{"id": 1, "status": "pending", "max_temperature": "cold"}"#;
        assert!(serde_json::from_str::<ShipmentSummary>(garbage).is_err());
    }

    #[test]
    fn test_list_response_accepts_both_shapes() {
        let plain = r#"[{"id": "a", "status": "in_transit"}]"#;
        let paged = r#"{"count": 1, "results": [{"id": "b", "status": "delivered"}]}"#;

        let plain: ShipmentListResponse = serde_json::from_str(plain).unwrap();
        let paged: ShipmentListResponse = serde_json::from_str(paged).unwrap();

        assert_eq!(plain.into_vec()[0].status, ShipmentStatus::InTransit);
        assert_eq!(paged.into_vec()[0].id.as_str(), "b");
    }
}
