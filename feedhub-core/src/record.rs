//! Ingested price data
//!
//! A [`PriceSample`] is what the external price source hands back for one
//! feed; a [`LogRecord`] is the part of it retained in the topic log.

use serde::{Deserialize, Serialize};

/// Prefix of every topic fed by the price ingestion job
pub const PRICE_FEED_TOPIC_PREFIX: &str = "pyth_history_price_feed_";

/// Topic name for a price feed identifier
///
/// Namespaces the stream so raw feed ids never collide with other topics.
pub fn price_feed_topic(feed_id: &str) -> String {
    format!("{}{}", PRICE_FEED_TOPIC_PREFIX, feed_id)
}

/// One ingested sample, immutable once appended to a topic log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Sample value as reported by the source (decimal string)
    pub value: String,
    /// Publish time reported by the source (Unix seconds)
    pub timestamp: i64,
}

impl LogRecord {
    pub fn new(value: impl Into<String>, timestamp: i64) -> Self {
        Self {
            value: value.into(),
            timestamp,
        }
    }
}

/// A timestamped price for one feed, as returned by a [`crate::PriceSource`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSample {
    /// Feed identifier
    pub id: String,
    /// Price value (decimal string, unscaled)
    pub value: String,
    /// Publish time (Unix seconds)
    pub timestamp: i64,
}

impl PriceSample {
    pub fn new(id: impl Into<String>, value: impl Into<String>, timestamp: i64) -> Self {
        Self {
            id: id.into(),
            value: value.into(),
            timestamp,
        }
    }

    /// Topic this sample is appended to
    pub fn topic(&self) -> String {
        price_feed_topic(&self.id)
    }

    /// The retained part of the sample
    pub fn to_record(&self) -> LogRecord {
        LogRecord::new(self.value.clone(), self.timestamp)
    }
}
