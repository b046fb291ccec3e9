//! Connection lifecycle owner
//!
//! All mutable state sits behind one mutex that is never held across an
//! `.await`. Every asynchronous continuation (handshake, session reader,
//! retry timer) captures the epoch it was spawned under and re-checks it
//! under the lock before touching anything, so `disconnect()` turns all
//! of them into no-ops without having to chase them down.

use super::reconnect::{BackoffPolicy, ReconnectDecision, ReconnectScheduler};
use super::subscriptions::FrameSink;
use super::transport::{to_ws_url, Connector, TransportEvent, TransportLink};
use super::{ConnectionEvent, ConnectionEventKind, ConnectionState};
use coldchain_core::{ControlFrame, Error, Result};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

struct Session {
    state: ConnectionState,
    epoch: u64,
    url: Option<String>,
    /// Set by `disconnect()`; the scheduler ignores closes while set
    manual: bool,
    exhausted: bool,
    outbound: Option<mpsc::UnboundedSender<String>>,
    /// Cancels the in-flight handshake or the session reader
    session_cancel: Option<CancellationToken>,
    scheduler: ReconnectScheduler,
    listeners: Vec<mpsc::UnboundedSender<ConnectionEvent>>,
}

struct Inner {
    connector: Arc<dyn Connector>,
    session: Mutex<Session>,
    state_tx: watch::Sender<ConnectionState>,
}

/// Owns exactly one transport connection at a time
///
/// Cheap to clone; all clones drive the same connection.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn Connector>, policy: BackoffPolicy) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Idle);

        Self {
            inner: Arc::new(Inner {
                connector,
                session: Mutex::new(Session {
                    state: ConnectionState::Idle,
                    epoch: 0,
                    url: None,
                    manual: false,
                    exhausted: false,
                    outbound: None,
                    session_cancel: None,
                    scheduler: ReconnectScheduler::new(policy),
                    listeners: Vec::new(),
                }),
                state_tx,
            }),
        }
    }

    /// Start connecting to `url` (`http(s)` origins are rewritten to `ws(s)`)
    ///
    /// Only valid from `Idle` or `Closed`. Resets the reconnect attempt
    /// counter, so this is also how a consumer resumes after exhaustion.
    /// Must be called from within a Tokio runtime.
    #[instrument(skip(self))]
    pub fn connect(&self, url: &str) -> Result<()> {
        let ws_url = to_ws_url(url)?;
        let mut session = self.inner.lock();

        match session.state {
            ConnectionState::Idle | ConnectionState::Closed => {}
            other => {
                return Err(Error::InvalidState(format!(
                    "connect() called while {:?}",
                    other
                )));
            }
        }

        session.scheduler.reset();
        session.exhausted = false;
        self.inner.begin_connect(&mut session, ws_url);
        Ok(())
    }

    /// Tear the connection down from any state; idempotent
    ///
    /// Cancels the pending retry timer, detaches the transport, bumps the
    /// epoch and leaves the manager `Closed` until the next `connect()`.
    #[instrument(skip(self))]
    pub fn disconnect(&self) {
        let mut session = self.inner.lock();

        session.scheduler.cancel();
        if let Some(cancel) = session.session_cancel.take() {
            cancel.cancel();
        }
        // Dropping the sender tells the transport to close the socket
        session.outbound = None;
        session.epoch += 1;
        session.manual = true;

        let was_live = matches!(
            session.state,
            ConnectionState::Connecting | ConnectionState::Open
        );
        if session.state == ConnectionState::Open {
            self.inner.transition(&mut session, ConnectionState::Closing);
        }
        self.inner.transition(&mut session, ConnectionState::Closed);

        if was_live {
            info!("Disconnected (epoch {})", session.epoch);
            Inner::emit(&mut session, ConnectionEventKind::Closed { was_manual: true });
        }
    }

    /// Serialize `payload` and write it if the connection is open
    ///
    /// Returns `false` when the frame was dropped; nothing is queued.
    pub fn send<T: Serialize + ?Sized>(&self, payload: &T) -> bool {
        match serde_json::to_string(payload) {
            Ok(text) => self.send_text(text),
            Err(e) => {
                warn!("Failed to serialize outbound frame: {}", e);
                false
            }
        }
    }

    pub fn send_text(&self, text: String) -> bool {
        match self.try_send_text(text) {
            Ok(()) => true,
            Err(e) => {
                debug!("Dropping outbound frame: {}", e);
                false
            }
        }
    }

    /// Like [`send_text`](Self::send_text), but says why a frame was dropped
    pub fn try_send_text(&self, text: String) -> Result<()> {
        let session = self.inner.lock();

        if session.state != ConnectionState::Open {
            return Err(Error::SendRejected);
        }

        session
            .outbound
            .as_ref()
            .and_then(|outbound| outbound.send(text).ok())
            .ok_or(Error::SendRejected)
    }

    /// Subscribe to lifecycle events
    ///
    /// Each subscriber gets its own FIFO channel. Events from superseded
    /// epochs are never delivered.
    pub fn events(&self) -> mpsc::UnboundedReceiver<ConnectionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.lock().listeners.push(tx);
        rx
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    pub fn epoch(&self) -> u64 {
        self.inner.lock().epoch
    }

    /// Consecutive automatic attempts since the last successful open
    pub fn reconnect_attempt(&self) -> u32 {
        self.inner.lock().scheduler.attempt()
    }

    pub fn has_pending_reconnect(&self) -> bool {
        self.inner.lock().scheduler.has_pending_timer()
    }

    /// True once automatic reconnection has given up
    pub fn is_exhausted(&self) -> bool {
        self.inner.lock().exhausted
    }
}

impl FrameSink for ConnectionManager {
    fn is_open(&self) -> bool {
        self.is_connected()
    }

    fn send_frame(&self, frame: &ControlFrame) -> bool {
        self.send(frame)
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, session: &mut Session, next: ConnectionState) {
        if session.state != next {
            debug!("Connection state {:?} -> {:?}", session.state, next);
            session.state = next;
            self.state_tx.send_replace(next);
        }
    }

    fn emit(session: &mut Session, kind: ConnectionEventKind) {
        let event = ConnectionEvent {
            epoch: session.epoch,
            kind,
        };
        session
            .listeners
            .retain(|listener| listener.send(event.clone()).is_ok());
    }

    /// New epoch, `Connecting`, and a spawned handshake
    fn begin_connect(self: &Arc<Self>, session: &mut Session, url: String) {
        session.epoch += 1;
        session.manual = false;
        session.url = Some(url.clone());
        session.outbound = None;
        if let Some(previous) = session.session_cancel.take() {
            previous.cancel();
        }
        self.transition(session, ConnectionState::Connecting);

        let epoch = session.epoch;
        let cancel = CancellationToken::new();
        session.session_cancel = Some(cancel.clone());

        info!("Connecting to {} (epoch {})", url, epoch);

        let connector = Arc::clone(&self.connector);
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                result = connector.connect(url) => result,
            };

            if let Some(inner) = weak.upgrade() {
                inner.on_connect_result(epoch, result, cancel);
            }
        });
    }

    fn on_connect_result(
        self: &Arc<Self>,
        epoch: u64,
        result: Result<TransportLink>,
        cancel: CancellationToken,
    ) {
        let mut session = self.lock();

        if session.epoch != epoch {
            debug!(
                "Discarding handshake result from epoch {} (current {})",
                epoch, session.epoch
            );
            return;
        }

        match result {
            Ok(TransportLink { outbound, inbound }) => {
                session.outbound = Some(outbound);
                session.scheduler.on_open();
                session.exhausted = false;
                self.transition(&mut session, ConnectionState::Open);
                info!("Connection open (epoch {})", epoch);
                Inner::emit(&mut session, ConnectionEventKind::Open);

                tokio::spawn(run_session(Arc::downgrade(self), epoch, inbound, cancel));
            }
            Err(e) => {
                warn!("Connection attempt failed (epoch {}): {}", epoch, e);
                Inner::emit(&mut session, ConnectionEventKind::Error(e.to_string()));
                self.on_unexpected_close(&mut session);
            }
        }
    }

    fn on_transport_event(self: &Arc<Self>, epoch: u64, event: TransportEvent) -> bool {
        let mut session = self.lock();

        if session.epoch != epoch {
            return false;
        }

        match event {
            TransportEvent::Message(raw) => {
                Inner::emit(&mut session, ConnectionEventKind::Message(raw));
                true
            }
            TransportEvent::Error(info) => {
                // Errors alone never change state
                warn!("Transport error (epoch {}): {}", epoch, info);
                Inner::emit(&mut session, ConnectionEventKind::Error(info));
                true
            }
            TransportEvent::Closed(reason) => {
                info!(
                    "Connection closed by peer (epoch {}): {}",
                    epoch,
                    reason.as_deref().unwrap_or("no reason")
                );
                self.on_unexpected_close(&mut session);
                false
            }
        }
    }

    /// Close not preceded by `disconnect()`: the only scheduler trigger
    fn on_unexpected_close(self: &Arc<Self>, session: &mut Session) {
        session.outbound = None;
        session.session_cancel = None;
        self.transition(session, ConnectionState::Closed);
        Inner::emit(session, ConnectionEventKind::Closed { was_manual: false });

        if session.manual {
            return;
        }

        match session.scheduler.on_unexpected_close() {
            ReconnectDecision::Retry { attempt, delay } => {
                info!(
                    "Reconnecting in {}ms (attempt {}/{})",
                    delay.as_millis(),
                    attempt,
                    session.scheduler.policy().max_attempts
                );

                let epoch = session.epoch;
                let weak = Arc::downgrade(self);
                let timer = tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Some(inner) = weak.upgrade() {
                        inner.on_retry_timer(epoch);
                    }
                });
                session.scheduler.arm(timer);
            }
            ReconnectDecision::Exhausted { attempts } => {
                warn!("Giving up after {} reconnect attempts", attempts);
                session.exhausted = true;
                Inner::emit(session, ConnectionEventKind::ReconnectExhausted { attempts });
            }
        }
    }

    fn on_retry_timer(self: &Arc<Self>, epoch: u64) {
        let mut session = self.lock();

        if session.epoch != epoch || session.manual {
            debug!("Ignoring stale reconnect timer from epoch {}", epoch);
            return;
        }

        session.scheduler.timer_fired();

        match session.url.clone() {
            Some(url) => self.begin_connect(&mut session, url),
            None => warn!("Reconnect timer fired without a URL"),
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let session = self
            .session
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        session.scheduler.cancel();
        if let Some(cancel) = session.session_cancel.take() {
            cancel.cancel();
        }
    }
}

/// Pump transport events for one epoch until close or cancellation
async fn run_session(
    inner: Weak<Inner>,
    epoch: u64,
    mut inbound: mpsc::UnboundedReceiver<TransportEvent>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            event = inbound.recv() => event.unwrap_or(TransportEvent::Closed(None)),
        };

        let Some(inner) = inner.upgrade() else {
            return;
        };

        if !inner.on_transport_event(epoch, event) {
            return;
        }
    }
}
