//! Services for the Price Feed Hub
//!
//! This crate provides the capped topic log, the periodic ingestion jobs
//! and the WebSocket hub that serves clients from them.

pub mod ingestion;
pub mod scheduler;
pub mod status;
pub mod topic_log;
pub mod websocket;

pub use ingestion::{IngestionConfig, PriceFeedJob, BTC_USD_FEED_ID, ETH_USD_FEED_ID};
pub use scheduler::{Job, Scheduler};
pub use status::StatusJob;
pub use topic_log::{TopicLogStore, DEFAULT_MAX_LEN};
pub use websocket::{
    ChannelReplies, CloseReason, Hub, HubHandle, SessionConfig, SessionEvent, SessionId,
    WebSocketState,
};
