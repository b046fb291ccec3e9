//! End-to-end tracker tests over the in-process transport

use coldchain_core::{AlertKind, ControlFrame, Location, ShipmentId, Topic};
use coldchain_engine::tracking::{retarget, spawn_tracker, LinkStatus};
use coldchain_engine::TrackerConfig;
use coldchain_networking::websocket::{ConnectionState, MemoryConnector, MemoryPeer};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn config() -> TrackerConfig {
    TrackerConfig::new("https://ops.test")
}

async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

fn frames(peer: &mut MemoryPeer) -> Vec<ControlFrame> {
    peer.drain_frames()
        .iter()
        .map(|raw| serde_json::from_str(raw).unwrap())
        .collect()
}

async fn next_peer(peers: &mut mpsc::UnboundedReceiver<MemoryPeer>) -> MemoryPeer {
    peers.try_recv().expect("no connection was accepted")
}

#[tokio::test(start_paused = true)]
async fn subscribes_on_open_and_projects_updates() {
    let (connector, mut peers) = MemoryConnector::new();
    let tracker = spawn_tracker(
        &config(),
        Arc::new(connector.clone()),
        ShipmentId::new("SHP-42"),
    )
    .unwrap();
    settle().await;

    assert_eq!(
        connector.attempted_urls(),
        vec!["wss://ops.test/ws/shipments/SHP-42/".to_string()]
    );
    assert_eq!(tracker.status().link, LinkStatus::Connected);

    let mut peer = next_peer(&mut peers).await;
    assert_eq!(frames(&mut peer), vec![ControlFrame::subscribe(Topic::shipments())]);

    peer.push_json(&json!({"type": "shipment_update", "update_type": "location",
                           "data": {"latitude": 15.3694, "longitude": 44.1910},
                           "timestamp": "2024-05-01T08:00:00Z"}));
    peer.push_json(&json!({"type": "shipment_update", "update_type": "temperature",
                           "data": {"temperature": 6.0, "avg_temperature": 5.8,
                                    "has_violations": false, "violations": []},
                           "timestamp": "2024-05-01T08:01:00Z"}));
    peer.push_json(&json!({"type": "shipment_update", "update_type": "temperature",
                           "data": {"temperature": 9.5, "avg_temperature": 6.1,
                                    "has_violations": true,
                                    "violations": [{"product_name": "Milk", "temperature": 9.5,
                                                    "min_temp": 2, "max_temp": 8}]},
                           "timestamp": "2024-05-01T08:02:00Z"}));
    peer.push("garbage that is not json");
    settle().await;

    let view = tracker.snapshot();
    assert_eq!(
        view.location,
        Some(Location {
            latitude: 15.3694,
            longitude: 44.1910
        })
    );
    assert_eq!(view.temperature.as_ref().map(|t| t.temperature), Some(9.5));
    assert_eq!(view.alerts.len(), 1);
    assert_eq!(view.alerts[0].kind, AlertKind::TemperatureViolation);

    // A bad frame does not hurt the link; it is only reported
    assert_eq!(tracker.connection_state(), ConnectionState::Open);
    let status = tracker.status();
    assert_eq!(status.link, LinkStatus::Connected);
    assert!(status
        .last_error
        .as_deref()
        .is_some_and(|e| e.starts_with("Protocol error")));

    tracker.stop().await;
}

#[tokio::test(start_paused = true)]
async fn resubscribes_after_reconnect() {
    let (connector, mut peers) = MemoryConnector::new();
    let tracker = spawn_tracker(
        &config(),
        Arc::new(connector.clone()),
        ShipmentId::new("7"),
    )
    .unwrap();
    settle().await;

    let mut first = next_peer(&mut peers).await;
    assert_eq!(frames(&mut first).len(), 1);
    first.close();
    settle().await;

    assert_eq!(tracker.status().link, LinkStatus::Reconnecting { attempt: 1 });

    tokio::time::advance(Duration::from_millis(2000)).await;
    settle().await;

    let mut second = next_peer(&mut peers).await;
    assert_eq!(frames(&mut second), vec![ControlFrame::subscribe(Topic::shipments())]);
    assert_eq!(tracker.status().link, LinkStatus::Connected);

    tracker.stop().await;
}

#[tokio::test(start_paused = true)]
async fn gives_up_then_resumes_on_manual_reconnect() {
    let (connector, mut peers) = MemoryConnector::new();
    let config = config().with_backoff(Duration::from_millis(100), Duration::from_secs(1), 2);
    let tracker = spawn_tracker(
        &config,
        Arc::new(connector.clone()),
        ShipmentId::new("9"),
    )
    .unwrap();
    settle().await;

    connector.refuse_next(2);
    next_peer(&mut peers).await.close();
    settle().await;
    tokio::time::advance(Duration::from_millis(200)).await;
    settle().await;
    tokio::time::advance(Duration::from_millis(400)).await;
    settle().await;

    let status = tracker.status();
    assert_eq!(status.link, LinkStatus::GaveUp);
    assert_eq!(
        status.last_error.as_deref(),
        Some("Reconnect exhausted after 2 attempts")
    );
    assert_eq!(connector.attempts(), 3);

    tokio::time::advance(Duration::from_secs(60)).await;
    settle().await;
    assert_eq!(connector.attempts(), 3);

    tracker.reconnect().unwrap();
    settle().await;
    assert_eq!(tracker.status().link, LinkStatus::Connected);
    let mut peer = next_peer(&mut peers).await;
    assert_eq!(frames(&mut peer), vec![ControlFrame::subscribe(Topic::shipments())]);

    tracker.stop().await;
}

#[tokio::test(start_paused = true)]
async fn stop_unsubscribes_and_releases_transport() {
    let (connector, mut peers) = MemoryConnector::new();
    let tracker = spawn_tracker(
        &config(),
        Arc::new(connector.clone()),
        ShipmentId::new("1"),
    )
    .unwrap();
    settle().await;

    let mut peer = next_peer(&mut peers).await;
    frames(&mut peer);

    tracker.stop().await;
    settle().await;

    assert_eq!(frames(&mut peer), vec![ControlFrame::unsubscribe(Topic::shipments())]);
    assert!(peer.is_detached());
}

#[tokio::test(start_paused = true)]
async fn retarget_stops_previous_shipment_first() {
    let (connector, mut peers) = MemoryConnector::new();
    let connector = Arc::new(connector);
    let first = spawn_tracker(&config(), connector.clone(), ShipmentId::new("A")).unwrap();
    settle().await;
    let old_peer = next_peer(&mut peers).await;

    let second = retarget(Some(first), &config(), connector.clone(), ShipmentId::new("B"))
        .await
        .unwrap();
    settle().await;

    assert!(old_peer.is_detached());
    assert_eq!(second.shipment_id().as_str(), "B");
    let new_peer = next_peer(&mut peers).await;
    assert_eq!(new_peer.url, "wss://ops.test/ws/shipments/B/");

    // Late pushes on the old socket go nowhere
    old_peer.push_json(&json!({"type": "temperature_alert", "data": {}, "timestamp": "t"}));
    settle().await;
    assert!(second.snapshot().alerts.is_empty());

    second.stop().await;
}

#[tokio::test(start_paused = true)]
async fn dropping_the_handle_disconnects() {
    let (connector, mut peers) = MemoryConnector::new();
    let tracker = spawn_tracker(
        &config(),
        Arc::new(connector.clone()),
        ShipmentId::new("D"),
    )
    .unwrap();
    settle().await;
    let peer = next_peer(&mut peers).await;

    drop(tracker);
    settle().await;

    assert!(peer.is_detached());
}

#[tokio::test]
async fn rejects_unusable_base_url() {
    let (connector, _peers) = MemoryConnector::new();
    let config = TrackerConfig::new("ftp://ops.test");
    assert!(spawn_tracker(&config, Arc::new(connector), ShipmentId::new("X")).is_err());
}
