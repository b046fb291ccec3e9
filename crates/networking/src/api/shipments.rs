//! Shipment lookups used before a live tracking session starts

use crate::ApiClient;
use coldchain_core::{Error, Result, ShipmentFilter, ShipmentId, ShipmentStatus, ShipmentSummary};
use tracing::{info, warn};

/// Shipments currently on the road
pub async fn in_transit_shipments(client: &ApiClient) -> Result<Vec<ShipmentSummary>> {
    let shipments = client.list_shipments(&ShipmentFilter::in_transit()).await?;
    info!("{} shipments in transit", shipments.len());
    Ok(shipments)
}

/// Fetch a shipment and check it is worth tracking live
///
/// Delivered or cancelled shipments produce no further telemetry; they are
/// still returned, with a warning.
pub async fn fetch_trackable_shipment(
    client: &ApiClient,
    id: &ShipmentId,
) -> Result<ShipmentSummary> {
    if id.as_str().trim().is_empty() {
        return Err(Error::InvalidData("Shipment id must not be empty".to_string()));
    }

    let shipment = client.get_shipment(id).await?;

    if !is_trackable(shipment.status) {
        warn!(
            "Shipment {} is {:?}; no live updates expected",
            shipment.id, shipment.status
        );
    }

    Ok(shipment)
}

/// Whether the server still pushes updates for a shipment in this status
pub fn is_trackable(status: ShipmentStatus) -> bool {
    matches!(
        status,
        ShipmentStatus::Pending | ShipmentStatus::InTransit | ShipmentStatus::Unknown
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_trackable() {
        assert!(is_trackable(ShipmentStatus::InTransit));
        assert!(is_trackable(ShipmentStatus::Pending));
        assert!(!is_trackable(ShipmentStatus::Delivered));
        assert!(!is_trackable(ShipmentStatus::Cancelled));
    }
}
