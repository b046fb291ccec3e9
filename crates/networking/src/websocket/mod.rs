//! WebSocket connection for real-time shipment tracking
//!
//! [`ConnectionManager`] owns the one live transport, [`ReconnectScheduler`]
//! decides when to retry, [`SubscriptionRegistry`] replays topics on every
//! open and [`MessageRouter`] turns raw frames into typed handler calls.

mod manager;
mod reconnect;
mod router;
mod subscriptions;
mod transport;

pub use manager::ConnectionManager;
pub use reconnect::{BackoffPolicy, ReconnectDecision, ReconnectScheduler};
pub use router::{MessageHandler, MessageRouter, ProtocolError, RouteOutcome};
pub use subscriptions::{FrameSink, SubscriptionRegistry};
pub use transport::{
    to_ws_url, ConnectOutcome, Connector, MemoryConnector, MemoryPeer, TransportEvent,
    TransportLink, WsConnector,
};

use serde::Serialize;

/// WebSocket connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Nothing has been attempted yet
    Idle,
    Connecting,
    Open,
    Closing,
    /// Either waiting for a retry or terminal; see [`ConnectionManager::is_exhausted`]
    Closed,
}

/// Lifecycle notification, tagged with the epoch it was emitted under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionEvent {
    pub epoch: u64,
    pub kind: ConnectionEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEventKind {
    Open,
    Message(String),
    Error(String),
    Closed { was_manual: bool },
    /// Automatic reconnection gave up; only an explicit `connect()` resumes
    ReconnectExhausted { attempts: u32 },
}
