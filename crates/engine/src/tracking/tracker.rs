//! Live tracking task for one shipment
//!
//! Wires a [`ConnectionManager`], a [`SubscriptionRegistry`] and a
//! [`ShipmentTrackingProjection`] together and runs them on a single task,
//! so every event is handled in delivery order without locks on the view.

use super::projection::ShipmentTrackingProjection;
use crate::config::TrackerConfig;
use coldchain_core::{Error, Result, ShipmentId, Topic, TrackingViewModel};
use coldchain_networking::websocket::{
    to_ws_url, ConnectionEvent, ConnectionEventKind, ConnectionManager, ConnectionState,
    Connector, MessageRouter, SubscriptionRegistry,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What the UI should show about the live link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LinkStatus {
    Connecting,
    Connected,
    /// Dropped; automatic retry `attempt` is pending or in flight
    Reconnecting { attempt: u32 },
    Disconnected,
    /// Automatic reconnection gave up; needs [`TrackerHandle::reconnect`]
    GaveUp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackerStatus {
    pub link: LinkStatus,
    pub last_error: Option<String>,
}

// ─── Handle ──────────────────────────────────────────────────────────

/// Handle to one running tracker
///
/// Dropping the handle tears the tracker down as well; call
/// [`TrackerHandle::stop`] to wait for the teardown to finish.
pub struct TrackerHandle {
    shipment_id: ShipmentId,
    socket_url: String,
    manager: ConnectionManager,
    view_rx: watch::Receiver<TrackingViewModel>,
    status_rx: watch::Receiver<TrackerStatus>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl TrackerHandle {
    pub fn shipment_id(&self) -> &ShipmentId {
        &self.shipment_id
    }

    /// Receiver that changes on every projected frame
    pub fn view(&self) -> watch::Receiver<TrackingViewModel> {
        self.view_rx.clone()
    }

    pub fn snapshot(&self) -> TrackingViewModel {
        self.view_rx.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<TrackerStatus> {
        self.status_rx.clone()
    }

    pub fn status(&self) -> TrackerStatus {
        self.status_rx.borrow().clone()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.manager.state()
    }

    /// Connect again after the link gave up or was dropped
    pub fn reconnect(&self) -> Result<()> {
        info!("Manual reconnect for shipment {}", self.shipment_id);
        self.manager.connect(&self.socket_url)
    }

    /// Unsubscribe, disconnect, and wait for the task to exit
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Tracker task for {} ended abnormally: {}", self.shipment_id, e);
            }
        }
    }
}

impl Drop for TrackerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ─── Spawn ───────────────────────────────────────────────────────────

/// Start tracking `shipment_id` over a fresh connection
///
/// Fails only if the configured URL cannot be turned into a socket URL.
pub fn spawn_tracker(
    config: &TrackerConfig,
    connector: Arc<dyn Connector>,
    shipment_id: ShipmentId,
) -> Result<TrackerHandle> {
    let socket_url = config.socket_url(&shipment_id);
    to_ws_url(&socket_url)?;

    let manager = ConnectionManager::new(connector, config.backoff);
    let events = manager.events();

    let mut registry = SubscriptionRegistry::new();
    registry.subscribe(config.topic.clone(), &manager);

    let (view_tx, view_rx) = watch::channel(TrackingViewModel::default());
    let (status_tx, status_rx) = watch::channel(TrackerStatus {
        link: LinkStatus::Connecting,
        last_error: None,
    });

    manager.connect(&socket_url)?;
    info!("Tracking shipment {} via {}", shipment_id, socket_url);

    let cancel = CancellationToken::new();
    let task = tokio::spawn(
        TrackerLoop {
            shipment_id: shipment_id.clone(),
            topic: config.topic.clone(),
            manager: manager.clone(),
            registry,
            projection: ShipmentTrackingProjection::new(),
            view_tx,
            status_tx,
        }
        .run(events, cancel.clone()),
    );

    Ok(TrackerHandle {
        shipment_id,
        socket_url,
        manager,
        view_rx,
        status_rx,
        cancel,
        task: Some(task),
    })
}

/// Stop `current` (if any) before tracking `next`
pub async fn retarget(
    current: Option<TrackerHandle>,
    config: &TrackerConfig,
    connector: Arc<dyn Connector>,
    next: ShipmentId,
) -> Result<TrackerHandle> {
    if let Some(current) = current {
        info!("Switching tracker from {} to {}", current.shipment_id(), next);
        current.stop().await;
    }
    spawn_tracker(config, connector, next)
}

// ─── Loop ────────────────────────────────────────────────────────────

struct TrackerLoop {
    shipment_id: ShipmentId,
    topic: Topic,
    manager: ConnectionManager,
    registry: SubscriptionRegistry,
    projection: ShipmentTrackingProjection,
    view_tx: watch::Sender<TrackingViewModel>,
    status_tx: watch::Sender<TrackerStatus>,
}

impl TrackerLoop {
    async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<ConnectionEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => self.handle(event),
                    None => break,
                },
            }
        }

        self.teardown();
    }

    /// Opens and frames queued before a reconnect belong to a dead session
    fn is_stale(&self, event: &ConnectionEvent) -> bool {
        event.epoch != self.manager.epoch()
    }

    fn handle(&mut self, event: ConnectionEvent) {
        let stale = self.is_stale(&event);
        match event.kind {
            ConnectionEventKind::Open if stale => {
                debug!("Ignoring open from stale epoch {}", event.epoch);
            }
            ConnectionEventKind::Open => {
                let sent = self.registry.replay(&self.manager);
                debug!(
                    "Shipment {}: link open, {} subscription(s) sent",
                    self.shipment_id, sent
                );
                self.set_link(LinkStatus::Connected);
            }
            ConnectionEventKind::Message(_) if stale => {
                debug!("Dropping frame from stale epoch {}", event.epoch);
            }
            ConnectionEventKind::Message(raw) => self.project(&raw),
            ConnectionEventKind::Error(info) => {
                self.status_tx.send_modify(|status| status.last_error = Some(info));
            }
            ConnectionEventKind::Closed { was_manual: true } => {
                self.set_link(LinkStatus::Disconnected);
            }
            ConnectionEventKind::Closed { was_manual: false } => {
                let link = if self.manager.is_exhausted() {
                    LinkStatus::GaveUp
                } else {
                    match self.manager.reconnect_attempt() {
                        0 => LinkStatus::Disconnected,
                        attempt => LinkStatus::Reconnecting { attempt },
                    }
                };
                self.set_link(link);
            }
            ConnectionEventKind::ReconnectExhausted { attempts } => {
                warn!(
                    "Shipment {}: gave up after {} reconnect attempts",
                    self.shipment_id, attempts
                );
                let reason = Error::ReconnectExhausted { attempts }.to_string();
                self.status_tx.send_modify(|status| {
                    status.link = LinkStatus::GaveUp;
                    status.last_error = Some(reason);
                });
            }
        }
    }

    fn project(&mut self, raw: &str) {
        match MessageRouter::decode(raw) {
            Ok(Some(message)) => {
                debug!(
                    "Shipment {}: {} update stamped {}",
                    self.shipment_id,
                    message.kind(),
                    message.timestamp()
                );
                MessageRouter::dispatch(message, &mut self.projection);
                self.view_tx.send_replace(self.projection.view().clone());
            }
            Ok(None) => {}
            Err(e) => {
                warn!("Shipment {}: dropping inbound frame: {}", self.shipment_id, e);
                let reason = Error::from(e).to_string();
                self.status_tx
                    .send_modify(|status| status.last_error = Some(reason));
            }
        }
    }

    fn set_link(&self, link: LinkStatus) {
        self.status_tx.send_if_modified(|status| {
            if status.link == link {
                return false;
            }
            status.link = link;
            true
        });
    }

    fn teardown(&mut self) {
        self.registry.unsubscribe(&self.topic, &self.manager);
        self.manager.disconnect();
        self.set_link(LinkStatus::Disconnected);
        info!("Stopped tracking shipment {}", self.shipment_id);
    }
}
