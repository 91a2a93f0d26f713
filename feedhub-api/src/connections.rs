//! Connection tally fed by session lifecycle events

use feedhub_services::SessionEvent;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::debug;

/// Running totals of opened and closed sessions
#[derive(Debug, Default)]
pub struct ConnectionStats {
    opened: AtomicU64,
    closed: AtomicU64,
}

/// Point-in-time copy of [`ConnectionStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectionSnapshot {
    pub opened: u64,
    pub closed: u64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: &SessionEvent) {
        match event {
            SessionEvent::Opened { id } => {
                self.opened.fetch_add(1, Ordering::Relaxed);
                debug!("Session opened: {}", id);
            }
            SessionEvent::Closed { id, reason } => {
                self.closed.fetch_add(1, Ordering::Relaxed);
                debug!("Session closed: {} ({})", id, reason);
            }
        }
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        ConnectionSnapshot {
            opened: self.opened.load(Ordering::Relaxed),
            closed: self.closed.load(Ordering::Relaxed),
        }
    }

    /// Consume session events until every sender is gone
    pub async fn process_session_events(&self, mut rx: mpsc::Receiver<SessionEvent>) {
        while let Some(event) = rx.recv().await {
            self.record(&event);
        }
    }
}
