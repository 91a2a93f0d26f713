//! Connection registry (hub)
//!
//! The set of live sessions is owned by a single event loop task. Every
//! mutation (register, unregister, broadcast) arrives as a command on one
//! channel and is applied in order, so the live set needs no lock and has
//! exactly one source of truth.
//!
//! Broadcasting never waits on a session: a payload is offered to each
//! outbound queue with `try_send`, and a session whose queue is full is
//! treated as dead, unregistered and closed.

use feedhub_core::{FeedError, FeedResult};
use std::collections::HashMap;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Capacity of the hub's command channel
pub const HUB_COMMAND_CAPACITY: usize = 1024;

/// Unique identifier for a client session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// What the hub holds for a registered session
///
/// Dropping the handle (or calling `close`) closes the session's outbound
/// queue as far as the session's writer is concerned.
#[derive(Debug)]
pub struct SessionHandle {
    id: SessionId,
    outbound: mpsc::Sender<String>,
    close: oneshot::Sender<()>,
}

impl SessionHandle {
    pub fn new(id: SessionId, outbound: mpsc::Sender<String>, close: oneshot::Sender<()>) -> Self {
        Self {
            id,
            outbound,
            close,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    fn close(self) {
        // The writer may already be gone
        let _ = self.close.send(());
    }
}

/// Outcome of one broadcast
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Sessions that accepted the payload
    pub delivered: usize,
    /// Sessions dropped because their queue was full or closed
    pub evicted: Vec<SessionId>,
}

enum HubCommand {
    Register(SessionHandle),
    Unregister(SessionId),
    Broadcast(String),
    SessionCount(oneshot::Sender<usize>),
}

/// Cloneable entry point to the hub's event loop
#[derive(Clone, Debug)]
pub struct HubHandle {
    tx: mpsc::Sender<HubCommand>,
}

impl HubHandle {
    /// Add a session to the live set
    pub async fn register(&self, session: SessionHandle) -> FeedResult<()> {
        self.send(HubCommand::Register(session)).await
    }

    /// Remove a session and close its outbound queue; unknown ids are ignored
    pub async fn unregister(&self, id: SessionId) -> FeedResult<()> {
        self.send(HubCommand::Unregister(id)).await
    }

    /// Offer a payload to every live session
    pub async fn broadcast(&self, payload: impl Into<String>) -> FeedResult<()> {
        self.send(HubCommand::Broadcast(payload.into())).await
    }

    /// Number of live sessions, as seen by the event loop
    pub async fn session_count(&self) -> FeedResult<usize> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(HubCommand::SessionCount(reply_tx)).await?;
        reply_rx
            .await
            .map_err(|_| FeedError::hub_unavailable("hub dropped the session count request"))
    }

    async fn send(&self, command: HubCommand) -> FeedResult<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| FeedError::hub_unavailable("hub event loop has stopped"))
    }
}

/// Live session set, driven by [`Hub::spawn`]
#[derive(Debug, Default)]
pub struct Hub {
    sessions: HashMap<SessionId, SessionHandle>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the event loop on its own task
    ///
    /// The loop stops once every [`HubHandle`] has been dropped.
    pub fn spawn(self) -> (HubHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(HUB_COMMAND_CAPACITY);
        let task = tokio::spawn(self.run(rx));
        (HubHandle { tx }, task)
    }

    async fn run(mut self, mut rx: mpsc::Receiver<HubCommand>) {
        info!("Hub event loop started");

        while let Some(command) = rx.recv().await {
            match command {
                HubCommand::Register(session) => {
                    self.register(session);
                }
                HubCommand::Unregister(id) => {
                    self.unregister(id);
                }
                HubCommand::Broadcast(payload) => {
                    let report = self.broadcast(&payload);
                    debug!(
                        delivered = report.delivered,
                        evicted = report.evicted.len(),
                        "Broadcast complete"
                    );
                }
                HubCommand::SessionCount(reply) => {
                    let _ = reply.send(self.len());
                }
            }
        }

        // Dropping the remaining handles closes every session
        info!(sessions = self.len(), "Hub event loop stopped");
    }

    /// Add a session; returns false if the id was already live
    pub fn register(&mut self, session: SessionHandle) -> bool {
        let id = session.id();
        if self.sessions.contains_key(&id) {
            warn!(session = %id, "Duplicate session registration ignored");
            return false;
        }

        self.sessions.insert(id, session);
        info!(session = %id, sessions = self.len(), "Session registered");
        true
    }

    /// Remove a session and close its outbound queue
    pub fn unregister(&mut self, id: SessionId) -> bool {
        match self.sessions.remove(&id) {
            Some(session) => {
                session.close();
                info!(session = %id, sessions = self.len(), "Session unregistered");
                true
            }
            None => false,
        }
    }

    /// Offer `payload` to every live session without blocking
    pub fn broadcast(&mut self, payload: &str) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        for (id, session) in &self.sessions {
            match session.outbound.try_send(payload.to_string()) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(session = %id, "Outbound queue full, disconnecting slow consumer");
                    report.evicted.push(*id);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(session = %id, "Outbound queue already closed");
                    report.evicted.push(*id);
                }
            }
        }

        for id in &report.evicted {
            self.unregister(*id);
        }

        report
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestSession {
        outbound_rx: mpsc::Receiver<String>,
        close_rx: oneshot::Receiver<()>,
    }

    fn session(id: u64, capacity: usize) -> (SessionHandle, TestSession) {
        let (outbound_tx, outbound_rx) = mpsc::channel(capacity);
        let (close_tx, close_rx) = oneshot::channel();
        (
            SessionHandle::new(SessionId(id), outbound_tx, close_tx),
            TestSession {
                outbound_rx,
                close_rx,
            },
        )
    }

    #[test]
    fn test_register_and_unregister() {
        let mut hub = Hub::new();
        let (handle, mut test) = session(1, 4);

        assert!(hub.register(handle));
        assert!(hub.contains(SessionId(1)));
        assert_eq!(hub.len(), 1);

        assert!(hub.unregister(SessionId(1)));
        assert!(hub.is_empty());
        assert!(test.close_rx.try_recv().is_ok());

        // Second unregister is a no-op
        assert!(!hub.unregister(SessionId(1)));
    }

    #[test]
    fn test_duplicate_register_is_noop() {
        let mut hub = Hub::new();
        let (first, mut first_test) = session(1, 4);
        let (second, _second_test) = session(1, 4);

        assert!(hub.register(first));
        assert!(!hub.register(second));
        assert_eq!(hub.len(), 1);

        hub.broadcast("hello");
        assert_eq!(first_test.outbound_rx.try_recv().unwrap(), "hello");
    }

    #[test]
    fn test_broadcast_evicts_full_session() {
        let mut hub = Hub::new();
        let (slow, mut slow_test) = session(1, 1);
        let (fast, mut fast_test) = session(2, 4);

        // Fill the slow session's queue to capacity
        slow.outbound.try_send("backlog".to_string()).unwrap();

        hub.register(slow);
        hub.register(fast);

        let report = hub.broadcast("tick");
        assert_eq!(report.delivered, 1);
        assert_eq!(report.evicted, vec![SessionId(1)]);
        assert_eq!(hub.len(), 1);
        assert!(!hub.contains(SessionId(1)));

        assert_eq!(fast_test.outbound_rx.try_recv().unwrap(), "tick");
        assert!(slow_test.close_rx.try_recv().is_ok());
        assert_eq!(slow_test.outbound_rx.try_recv().unwrap(), "backlog");
        assert!(slow_test.outbound_rx.try_recv().is_err());
    }

    #[test]
    fn test_broadcast_evicts_closed_session() {
        let mut hub = Hub::new();
        let (gone, gone_test) = session(1, 4);
        hub.register(gone);
        drop(gone_test);

        let report = hub.broadcast("tick");
        assert_eq!(report.delivered, 0);
        assert_eq!(report.evicted, vec![SessionId(1)]);
        assert!(hub.is_empty());
    }

    #[test]
    fn test_broadcast_reaches_every_session() {
        let mut hub = Hub::new();
        let mut tests = Vec::new();
        for id in 0..5 {
            let (handle, test) = session(id, 2);
            hub.register(handle);
            tests.push(test);
        }

        let report = hub.broadcast("all");
        assert_eq!(report.delivered, 5);
        assert!(report.evicted.is_empty());
        for test in &mut tests {
            assert_eq!(test.outbound_rx.try_recv().unwrap(), "all");
        }
    }

    #[tokio::test]
    async fn test_event_loop_backpressure() {
        let (hub, _task) = Hub::new().spawn();
        let (slow, mut slow_test) = session(1, 1);
        let (fast, mut fast_test) = session(2, 1);
        slow.outbound.try_send("backlog".to_string()).unwrap();

        hub.register(slow).await.unwrap();
        hub.register(fast).await.unwrap();
        assert_eq!(hub.session_count().await.unwrap(), 2);

        hub.broadcast("tick").await.unwrap();
        assert_eq!(hub.session_count().await.unwrap(), 1);

        assert_eq!(fast_test.outbound_rx.recv().await.unwrap(), "tick");
        assert!((&mut slow_test.close_rx).await.is_ok());
    }

    #[tokio::test]
    async fn test_event_loop_unregister_closes_queue() {
        let (hub, _task) = Hub::new().spawn();
        let (handle, test) = session(7, 4);

        hub.register(handle).await.unwrap();
        hub.unregister(SessionId(7)).await.unwrap();

        assert!(test.close_rx.await.is_ok());
        assert_eq!(hub.session_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_event_loop_stops_when_handles_dropped() {
        let (hub, task) = Hub::new().spawn();
        let (handle, test) = session(1, 4);
        hub.register(handle).await.unwrap();

        drop(hub);
        task.await.unwrap();

        // Remaining sessions are closed when the loop exits
        assert!(test.close_rx.await.is_err());
    }
}
