//! Pyth Hermes API client
//!
//! Provides the latest published price for a set of feed identifiers.

use async_trait::async_trait;
use feedhub_core::{FeedError, FeedResult, PriceSample, PriceSource};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use crate::types::{LatestPricesResponse, LATEST_PRICES_PATH};

/// Request timeout for Hermes calls
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Pyth Hermes API client
#[derive(Clone, Debug)]
pub struct PythClient {
    client: Client,
    base_url: Url,
}

impl PythClient {
    /// Create a new client against the given Hermes host
    pub fn new(base_url: &str) -> FeedResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| FeedError::config(format!("Invalid Pyth API host {}: {}", base_url, e)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| FeedError::internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build the latest-prices URL, one `ids[]` parameter per feed
    pub fn latest_prices_url(&self, feed_ids: &[String]) -> Url {
        let mut url = self.base_url.clone();
        url.set_path(LATEST_PRICES_PATH);
        url.set_query(None);

        if !feed_ids.is_empty() {
            let mut query = url.query_pairs_mut();
            for id in feed_ids {
                query.append_pair("ids[]", id);
            }
        }

        url
    }

    /// Fetch the latest price update for each feed
    #[instrument(skip(self))]
    pub async fn get_latest_prices(&self, feed_ids: &[String]) -> FeedResult<LatestPricesResponse> {
        let url = self.latest_prices_url(feed_ids);
        debug!("Fetching Pyth latest prices from: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FeedError::network(format!("Failed to fetch latest prices: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(FeedError::api(format!(
                "Pyth API error ({}): {}",
                status, body
            )));
        }

        response.json().await.map_err(|e| {
            FeedError::parse(format!("Failed to parse latest prices response: {}", e))
        })
    }
}

#[async_trait]
impl PriceSource for PythClient {
    async fn fetch_latest(&self, feed_ids: &[String]) -> FeedResult<Vec<PriceSample>> {
        if feed_ids.is_empty() {
            return Ok(Vec::new());
        }

        let response = self.get_latest_prices(feed_ids).await?;
        Ok(response.to_samples())
    }
}
