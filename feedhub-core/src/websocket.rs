//! WebSocket message types for the price feed hub
//!
//! Every frame in either direction is an [`Envelope`] tagged with the
//! name of the channel (event) it belongs to.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::{FeedError, FeedResult, LogRecord, PriceSample};

/// Reply event for the `ping` channel
pub const EVENT_PONG: &str = "pong";
/// Reply event for the `pricefeed` channel
pub const EVENT_PRICEFEED: &str = "pricefeed";
/// Event broadcast after every successful ingestion tick
pub const EVENT_PRICE_UPDATE: &str = "price_update";

// ============================================================================
// Envelope
// ============================================================================

/// One discrete message exchanged over a connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Channel name this frame belongs to
    pub event: String,
    /// Opaque payload, interpreted by the channel's reply handler
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
}

impl Envelope {
    pub fn new(event: impl Into<String>, payload: Value) -> Self {
        Self {
            event: event.into(),
            payload,
        }
    }

    /// Build an envelope from any serializable payload
    pub fn with_payload<T: Serialize>(event: impl Into<String>, payload: &T) -> FeedResult<Self> {
        Ok(Self::new(event, serde_json::to_value(payload)?))
    }

    /// Parse an inbound frame
    ///
    /// The frame is normalized first, see [`normalize_frame`].
    pub fn parse(frame: &str) -> FeedResult<Self> {
        let normalized = normalize_frame(frame);
        serde_json::from_str(&normalized)
            .map_err(|e| FeedError::parse(format!("Invalid envelope: {}", e)))
    }

    /// Serialize for the wire
    pub fn to_json(&self) -> FeedResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Collapse newlines into spaces and trim surrounding whitespace
pub fn normalize_frame(raw: &str) -> String {
    raw.replace('\n', " ").trim().to_string()
}

// ============================================================================
// Channels
// ============================================================================

/// Closed set of channels a client can talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Application-level ping, answered with a pong
    Ping,
    /// Snapshot request for the retained price history
    Pricefeed,
}

impl ChannelKind {
    /// Every channel, in subscription order
    pub const ALL: [ChannelKind; 2] = [ChannelKind::Ping, ChannelKind::Pricefeed];

    /// Wire name of the channel
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Ping => "ping",
            ChannelKind::Pricefeed => "pricefeed",
        }
    }

    /// Look up a channel by its wire name
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Payloads
// ============================================================================

/// Payload of a `pong` reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PongPayload {
    /// Server time in Unix milliseconds
    pub server_timestamp: i64,
}

/// Optional payload of a `pricefeed` request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricefeedRequest {
    /// Restrict the reply to these feeds; all configured feeds when absent
    #[serde(default)]
    pub feed_ids: Option<Vec<String>>,
}

/// Retained history for one feed, oldest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedHistory {
    pub feed_id: String,
    /// Prices as JSON numbers, index-aligned with `timestamps`
    pub prices: Vec<f64>,
    pub timestamps: Vec<i64>,
}

impl FeedHistory {
    /// Build the history from log records
    ///
    /// Records whose value is not a number are skipped together with their
    /// timestamp.
    pub fn from_records(feed_id: impl Into<String>, records: &[LogRecord]) -> Self {
        let feed_id = feed_id.into();
        let (prices, timestamps) = records
            .iter()
            .filter_map(|record| match record.value.trim().parse::<f64>() {
                Ok(price) if price.is_finite() => Some((price, record.timestamp)),
                _ => {
                    warn!(%feed_id, value = %record.value, "Skipping unparseable price");
                    None
                }
            })
            .unzip();

        Self {
            feed_id,
            prices,
            timestamps,
        }
    }
}

/// Payload of a `pricefeed` reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricefeedPayload {
    pub price_list: Vec<FeedHistory>,
}

/// Payload of a `price_update` broadcast
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceUpdatePayload {
    pub samples: Vec<PriceSample>,
}
