//! WebSocket connection handler
//!
//! Runs one client session from registration to teardown: register with
//! the hub, subscribe to every channel, run the inbound and outbound halves,
//! then unregister and cancel subscriptions.

use futures_util::{Sink, Stream};
use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use super::config::SessionConfig;
use super::hub::{HubHandle, SessionHandle, SessionId};
use super::replies::ChannelReplies;
use super::session::{inbound_half, outbound_half, CloseReason, SessionEvent};
use super::subscription::SubscriptionMap;

/// Shared state for WebSocket handlers
#[derive(Clone)]
pub struct WebSocketState {
    /// Hub the sessions register with
    pub hub: HubHandle,
    replies: Arc<ChannelReplies>,
    config: SessionConfig,
    next_session_id: Arc<AtomicU64>,
    /// Controller notified of session lifecycle
    session_event_tx: Option<mpsc::Sender<SessionEvent>>,
}

impl WebSocketState {
    /// Create new WebSocket state
    pub fn new(hub: HubHandle, replies: ChannelReplies, config: SessionConfig) -> Self {
        Self {
            hub,
            replies: Arc::new(replies),
            config,
            next_session_id: Arc::new(AtomicU64::new(1)),
            session_event_tx: None,
        }
    }

    /// Set the session event sender
    pub fn set_session_event_sender(&mut self, tx: mpsc::Sender<SessionEvent>) {
        self.session_event_tx = Some(tx);
    }

    /// Get a session event channel
    pub fn create_session_event_channel() -> (mpsc::Sender<SessionEvent>, mpsc::Receiver<SessionEvent>) {
        mpsc::channel(256)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn new_session_id(&self) -> SessionId {
        SessionId(self.next_session_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Handle a new WebSocket connection
    ///
    /// Returns once the session is torn down. The writer is moved to its own
    /// task; the reader is driven on the caller's task.
    pub async fn handle_connection<W, R, WE, RE>(&self, writer: W, mut reader: R) -> CloseReason
    where
        W: Sink<Message, Error = WE> + Unpin + Send + 'static,
        R: Stream<Item = Result<Message, RE>> + Unpin + Send,
        WE: Display + Send + 'static,
        RE: Display + Send,
    {
        let id = self.new_session_id();
        info!("New WebSocket connection: {}", id);

        let (outbound_tx, outbound_rx) = mpsc::channel(self.config.outbound_capacity);
        let (close_tx, close_rx) = oneshot::channel();

        if let Err(e) = self
            .hub
            .register(SessionHandle::new(id, outbound_tx.clone(), close_tx))
            .await
        {
            error!("Failed to register {}: {}", id, e);
            return CloseReason::Aborted;
        }
        self.notify(SessionEvent::Opened { id }).await;

        let mut subscriptions = SubscriptionMap::new(
            id,
            outbound_tx,
            Arc::clone(&self.replies),
            self.config.subscription_capacity,
        );
        if let Err(e) = subscriptions.subscribe_all() {
            warn!("Failed to subscribe {}: {}", id, e);
        }

        let mut outbound = tokio::spawn(outbound_half(
            id,
            writer,
            outbound_rx,
            close_rx,
            self.config.clone(),
        ));

        // Wait for either half to finish (connection closed)
        let (reason, outbound_done) = tokio::select! {
            reason = inbound_half(id, &mut reader, &subscriptions, &self.config) => (reason, false),
            joined = &mut outbound => (joined.unwrap_or(CloseReason::Aborted), true),
        };

        // Unregistering closes the queue, which ends the outbound half
        if let Err(e) = self.hub.unregister(id).await {
            debug!("Unregister {} skipped: {}", id, e);
        }
        if !outbound_done {
            if let Err(e) = outbound.await {
                warn!("Outbound half of {} failed: {}", id, e);
            }
        }

        subscriptions.cancel_all();
        info!("WebSocket connection closed: {} ({})", id, reason);
        self.notify(SessionEvent::Closed {
            id,
            reason: reason.clone(),
        })
        .await;

        reason
    }

    /// Waits for room on the channel so no lifecycle event is lost
    async fn notify(&self, event: SessionEvent) {
        if let Some(tx) = &self.session_event_tx {
            if let Err(e) = tx.send(event).await {
                warn!("Failed to send session event: {}", e);
            }
        }
    }
}
