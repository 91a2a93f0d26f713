//! WebSocket infrastructure for the price feed hub
//!
//! This module provides the hub that tracks live sessions, the per-session
//! reader/writer halves and the channel subscriptions that answer client
//! requests.

mod config;
mod handler;
mod hub;
mod replies;
mod session;
mod subscription;

pub use config::{
    keepalive_period, SessionConfig, DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_OUTBOUND_CAPACITY,
    DEFAULT_PONG_WAIT, DEFAULT_SUBSCRIPTION_CAPACITY, DEFAULT_WRITE_WAIT,
};
pub use handler::WebSocketState;
pub use hub::{BroadcastReport, Hub, HubHandle, SessionHandle, SessionId, HUB_COMMAND_CAPACITY};
pub use replies::ChannelReplies;
pub use session::{CloseReason, SessionEvent};
pub use subscription::{Dispatch, Subscription, SubscriptionMap};
