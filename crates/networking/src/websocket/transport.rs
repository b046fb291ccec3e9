//! Transport seam between the connection manager and a real socket
//!
//! A [`Connector`] performs the handshake and hands back a [`TransportLink`]:
//! an outbound text channel plus a stream of [`TransportEvent`]s. Dropping
//! the outbound sender asks the transport to close the socket.

use coldchain_core::{Error, Result};
use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, warn};

/// Default time allowed for the websocket handshake
const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Event delivered by an established transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// One inbound text frame
    Message(String),
    /// Non-terminal error report; a `Closed` follows if the socket died
    Error(String),
    /// The socket is gone, with the peer's close reason if any
    Closed(Option<String>),
}

/// An established connection as seen by its owner
#[derive(Debug)]
pub struct TransportLink {
    pub outbound: mpsc::UnboundedSender<String>,
    pub inbound: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Opens transports to a websocket URL
pub trait Connector: Send + Sync + 'static {
    fn connect(&self, url: String) -> BoxFuture<'static, Result<TransportLink>>;
}

/// Rewrite an `http(s)://` origin to `ws(s)://`
///
/// `ws://` and `wss://` URLs pass through untouched.
pub fn to_ws_url(url: &str) -> Result<String> {
    let url = url.trim();
    let (scheme, rest) = if let Some(rest) = url.strip_prefix("https://") {
        ("wss://", rest)
    } else if let Some(rest) = url.strip_prefix("http://") {
        ("ws://", rest)
    } else if let Some(rest) = url.strip_prefix("wss://") {
        ("wss://", rest)
    } else if let Some(rest) = url.strip_prefix("ws://") {
        ("ws://", rest)
    } else {
        return Err(Error::InvalidUrl(format!(
            "expected http(s):// or ws(s):// URL, got '{}'",
            url
        )));
    };

    if rest.is_empty() || rest.starts_with('/') {
        return Err(Error::InvalidUrl(format!("missing host in '{}'", url)));
    }

    Ok(format!("{}{}", scheme, rest))
}

// ─── tokio-tungstenite ───────────────────────────────────────────────

/// Websocket transport backed by tokio-tungstenite
#[derive(Debug, Clone)]
pub struct WsConnector {
    handshake_timeout: Duration,
}

impl WsConnector {
    pub fn new() -> Self {
        Self {
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for WsConnector {
    fn connect(&self, url: String) -> BoxFuture<'static, Result<TransportLink>> {
        let timeout = self.handshake_timeout;

        Box::pin(async move {
            let (stream, _response) = tokio::time::timeout(timeout, connect_async(url.as_str()))
                .await
                .map_err(|_| Error::Transport(format!("Handshake with {} timed out", url)))?
                .map_err(|e| Error::Transport(format!("Connect to {} failed: {}", url, e)))?;

            debug!("WebSocket handshake complete: {}", url);

            let (mut write, mut read) = stream.split();
            let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<String>();
            let (inbound_tx, inbound) = mpsc::unbounded_channel::<TransportEvent>();

            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        outgoing = outbound_rx.recv() => match outgoing {
                            Some(text) => {
                                if let Err(e) = write.send(Message::Text(text)).await {
                                    let _ = inbound_tx.send(TransportEvent::Error(e.to_string()));
                                    let _ = inbound_tx.send(TransportEvent::Closed(None));
                                    break;
                                }
                            }
                            None => {
                                // Owner detached
                                let _ = write.close().await;
                                break;
                            }
                        },
                        incoming = read.next() => match incoming {
                            Some(Ok(Message::Text(text))) => {
                                let _ = inbound_tx.send(TransportEvent::Message(text));
                            }
                            Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                                Ok(text) => {
                                    let _ = inbound_tx.send(TransportEvent::Message(text));
                                }
                                Err(e) => {
                                    warn!("Dropping non-UTF-8 binary frame: {}", e);
                                }
                            },
                            Some(Ok(Message::Close(frame))) => {
                                let reason = frame.map(|f| f.reason.to_string());
                                let _ = inbound_tx.send(TransportEvent::Closed(reason));
                                break;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                let _ = inbound_tx.send(TransportEvent::Error(e.to_string()));
                                let _ = inbound_tx.send(TransportEvent::Closed(None));
                                break;
                            }
                            None => {
                                let _ = inbound_tx.send(TransportEvent::Closed(None));
                                break;
                            }
                        },
                    }
                }
            });

            Ok(TransportLink { outbound, inbound })
        })
    }
}

// ─── In-process transport ────────────────────────────────────────────

/// How the next [`MemoryConnector`] handshake behaves
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    Accept,
    /// Handshake fails with this message
    Refuse(String),
    /// Handshake succeeds after this long (tokio clock)
    AcceptAfter(Duration),
}

/// Server side of one in-process connection
#[derive(Debug)]
pub struct MemoryPeer {
    pub url: String,
    to_client: mpsc::UnboundedSender<TransportEvent>,
    from_client: mpsc::UnboundedReceiver<String>,
}

impl MemoryPeer {
    /// Push a raw text frame to the client
    pub fn push(&self, raw: impl Into<String>) -> bool {
        self.to_client
            .send(TransportEvent::Message(raw.into()))
            .is_ok()
    }

    pub fn push_json(&self, value: &serde_json::Value) -> bool {
        self.push(value.to_string())
    }

    /// Report a transport error without closing
    pub fn fail(&self, info: impl Into<String>) -> bool {
        self.to_client
            .send(TransportEvent::Error(info.into()))
            .is_ok()
    }

    /// Close from the server side
    pub fn close(self) {
        let _ = self.to_client.send(TransportEvent::Closed(None));
    }

    /// Next frame written by the client, if one is already queued
    pub fn try_recv_frame(&mut self) -> Option<String> {
        self.from_client.try_recv().ok()
    }

    /// Every frame written by the client so far
    pub fn drain_frames(&mut self) -> Vec<String> {
        let mut frames = Vec::new();
        while let Some(frame) = self.try_recv_frame() {
            frames.push(frame);
        }
        frames
    }

    pub async fn recv_frame(&mut self) -> Option<String> {
        self.from_client.recv().await
    }

    /// True once the client side has let go of this connection
    pub fn is_detached(&self) -> bool {
        self.to_client.is_closed()
    }
}

#[derive(Debug, Default)]
struct MemoryScript {
    outcomes: VecDeque<ConnectOutcome>,
    attempts: Vec<String>,
}

/// Scripted in-process connector
///
/// Each `connect` consumes the next queued [`ConnectOutcome`] (accepting
/// when the queue is empty) and hands accepted peers to the
/// receiver returned by [`MemoryConnector::new`].
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    script: Arc<Mutex<MemoryScript>>,
    peers: mpsc::UnboundedSender<MemoryPeer>,
}

impl MemoryConnector {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MemoryPeer>) {
        let (peers, peers_rx) = mpsc::unbounded_channel();
        let connector = Self {
            script: Arc::new(Mutex::new(MemoryScript::default())),
            peers,
        };
        (connector, peers_rx)
    }

    /// Queue the outcome of a future handshake
    pub fn push_outcome(&self, outcome: ConnectOutcome) {
        self.lock().outcomes.push_back(outcome);
    }

    /// Queue `count` refusals
    pub fn refuse_next(&self, count: usize) {
        let mut script = self.lock();
        for n in 0..count {
            script
                .outcomes
                .push_back(ConnectOutcome::Refuse(format!("connection refused ({})", n + 1)));
        }
    }

    /// Number of `connect` calls seen so far
    pub fn attempts(&self) -> usize {
        self.lock().attempts.len()
    }

    /// URLs of every `connect` call, oldest first
    pub fn attempted_urls(&self) -> Vec<String> {
        self.lock().attempts.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryScript> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Connector for MemoryConnector {
    fn connect(&self, url: String) -> BoxFuture<'static, Result<TransportLink>> {
        let outcome = {
            let mut script = self.lock();
            script.attempts.push(url.clone());
            script.outcomes.pop_front().unwrap_or(ConnectOutcome::Accept)
        };
        let peers = self.peers.clone();

        Box::pin(async move {
            match outcome {
                ConnectOutcome::Refuse(message) => return Err(Error::Transport(message)),
                ConnectOutcome::AcceptAfter(delay) => tokio::time::sleep(delay).await,
                ConnectOutcome::Accept => {}
            }

            let (outbound, from_client) = mpsc::unbounded_channel();
            let (to_client, inbound) = mpsc::unbounded_channel();
            let peer = MemoryPeer {
                url,
                to_client,
                from_client,
            };

            peers
                .send(peer)
                .map_err(|_| Error::Transport("memory server is gone".to_string()))?;

            Ok(TransportLink { outbound, inbound })
        })
    }
}
