//! Channel reply functions
//!
//! Turns one inbound envelope on a channel into the envelope sent back to
//! the client.

use chrono::Utc;
use feedhub_core::{
    price_feed_topic, ChannelKind, Envelope, FeedHistory, FeedResult, PongPayload,
    PricefeedPayload, PricefeedRequest, EVENT_PONG, EVENT_PRICEFEED,
};
use std::sync::Arc;
use tracing::debug;

use crate::TopicLogStore;

/// Data the reply functions read from
#[derive(Debug, Clone)]
pub struct ChannelReplies {
    log: Arc<TopicLogStore>,
    feed_ids: Vec<String>,
}

impl ChannelReplies {
    pub fn new(log: Arc<TopicLogStore>, feed_ids: Vec<String>) -> Self {
        Self { log, feed_ids }
    }

    /// Build the reply for `request` on `channel`
    pub fn reply(&self, channel: ChannelKind, request: &Envelope) -> FeedResult<Envelope> {
        match channel {
            ChannelKind::Ping => self.pong(),
            ChannelKind::Pricefeed => self.price_list(request),
        }
    }

    fn pong(&self) -> FeedResult<Envelope> {
        let payload = PongPayload {
            server_timestamp: Utc::now().timestamp_millis(),
        };
        Envelope::with_payload(EVENT_PONG, &payload)
    }

    fn price_list(&self, request: &Envelope) -> FeedResult<Envelope> {
        // A missing or unreadable payload means "all configured feeds"
        let request: PricefeedRequest = if request.payload.is_null() {
            PricefeedRequest::default()
        } else {
            serde_json::from_value(request.payload.clone()).unwrap_or_else(|e| {
                debug!("Ignoring pricefeed payload: {}", e);
                PricefeedRequest::default()
            })
        };

        let feed_ids = request.feed_ids.as_deref().unwrap_or(&self.feed_ids[..]);
        let price_list = feed_ids
            .iter()
            .map(|id| FeedHistory::from_records(id.clone(), &self.log.read_all(&price_feed_topic(id))))
            .collect();

        Envelope::with_payload(EVENT_PRICEFEED, &PricefeedPayload { price_list })
    }
}
