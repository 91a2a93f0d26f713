//! Core types for the Price Feed Hub
//!
//! This crate defines the shared data structures used across the hub,
//! including log records, price samples, the WebSocket envelope protocol
//! and the price source abstraction.

pub mod error;
pub mod record;
pub mod source;
pub mod websocket;

pub use error::{FeedError, FeedResult};
pub use record::{price_feed_topic, LogRecord, PriceSample, PRICE_FEED_TOPIC_PREFIX};
pub use source::PriceSource;
pub use websocket::{
    normalize_frame, ChannelKind, Envelope, FeedHistory, PongPayload, PriceUpdatePayload,
    PricefeedPayload, PricefeedRequest, EVENT_PONG, EVENT_PRICEFEED, EVENT_PRICE_UPDATE,
};
