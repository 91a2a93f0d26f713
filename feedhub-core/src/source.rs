//! External price source abstraction

use async_trait::async_trait;

use crate::{FeedResult, PriceSample};

/// Anything that can report the latest price for a set of feeds
///
/// Any error is treated by callers as a failure of the whole batch.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Fetch the latest sample for each requested feed identifier
    async fn fetch_latest(&self, feed_ids: &[String]) -> FeedResult<Vec<PriceSample>>;
}
