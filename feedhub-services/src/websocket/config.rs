//! Session timing and capacity settings

use std::time::Duration;

/// Time allowed to write one frame to the peer
pub const DEFAULT_WRITE_WAIT: Duration = Duration::from_secs(10);

/// Time allowed between two reads before the peer is considered dead
pub const DEFAULT_PONG_WAIT: Duration = Duration::from_secs(60);

/// Largest inbound frame accepted, in bytes
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 512;

/// Outbound queue capacity per session
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 512;

/// Inbound queue capacity per channel subscription
pub const DEFAULT_SUBSCRIPTION_CAPACITY: usize = 100;

/// Keepalive period for a liveness deadline: 90% of it, so a ping always
/// lands before the peer's deadline expires
pub fn keepalive_period(pong_wait: Duration) -> Duration {
    pong_wait - pong_wait / 10
}

/// Configuration shared by every client session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Deadline for each outbound write
    pub write_wait: Duration,
    /// Liveness deadline, refreshed by every inbound frame
    pub pong_wait: Duration,
    /// How often an idle session sends a ping
    pub ping_period: Duration,
    /// Largest inbound frame accepted, in bytes
    pub max_message_size: usize,
    /// Outbound queue capacity
    pub outbound_capacity: usize,
    /// Inbound queue capacity per subscription
    pub subscription_capacity: usize,
}

impl SessionConfig {
    /// Set the liveness deadline and derive the keepalive period from it
    pub fn with_pong_wait(mut self, pong_wait: Duration) -> Self {
        self.pong_wait = pong_wait;
        self.ping_period = keepalive_period(pong_wait);
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            write_wait: DEFAULT_WRITE_WAIT,
            pong_wait: DEFAULT_PONG_WAIT,
            ping_period: keepalive_period(DEFAULT_PONG_WAIT),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            subscription_capacity: DEFAULT_SUBSCRIPTION_CAPACITY,
        }
    }
}
