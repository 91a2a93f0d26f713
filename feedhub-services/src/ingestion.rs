//! Price ingestion job
//!
//! Polls a [`PriceSource`] for the configured feeds and appends each sample
//! to its price feed topic. A failed fetch drops the tick: nothing is
//! retried and nothing already appended is rolled back.

use async_trait::async_trait;
use feedhub_core::{
    Envelope, FeedResult, PriceSample, PriceSource, PriceUpdatePayload, EVENT_PRICE_UPDATE,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::scheduler::Job;
use crate::websocket::HubHandle;
use crate::TopicLogStore;

/// Pyth BTC/USD feed
pub const BTC_USD_FEED_ID: &str = "e62df6c8b4a85fe1a67db44dc12de5db330f7ac66b72dc658afedf0f4a415b43";
/// Pyth ETH/USD feed
pub const ETH_USD_FEED_ID: &str = "ff61491a931112ddf1bd8147cd1b641375f79f5825126d665480874634fd0ace";

/// Configuration for the price ingestion job
#[derive(Debug, Clone)]
pub struct IngestionConfig {
    /// Feeds polled on every tick
    pub feed_ids: Vec<String>,
    /// Time between ticks
    pub poll_interval: Duration,
    /// Broadcast each successful batch to every live session
    pub broadcast_updates: bool,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            feed_ids: vec![BTC_USD_FEED_ID.to_string(), ETH_USD_FEED_ID.to_string()],
            poll_interval: Duration::from_secs(1),
            broadcast_updates: true,
        }
    }
}

/// Periodic job feeding the topic log from a price source
pub struct PriceFeedJob {
    source: Arc<dyn PriceSource>,
    log: Arc<TopicLogStore>,
    hub: Option<HubHandle>,
    feed_ids: Vec<String>,
    broadcast_updates: bool,
}

impl PriceFeedJob {
    pub fn new(source: Arc<dyn PriceSource>, log: Arc<TopicLogStore>, config: &IngestionConfig) -> Self {
        Self {
            source,
            log,
            hub: None,
            feed_ids: config.feed_ids.clone(),
            broadcast_updates: config.broadcast_updates,
        }
    }

    /// Broadcast successful batches through `hub`
    pub fn with_hub(mut self, hub: HubHandle) -> Self {
        self.hub = Some(hub);
        self
    }

    /// Run one tick; returns the number of samples appended
    pub async fn ingest_once(&self) -> FeedResult<usize> {
        let samples = self.source.fetch_latest(&self.feed_ids).await?;

        for sample in &samples {
            self.log.append(&sample.topic(), sample.to_record());
        }
        debug!("Appended {} price samples", samples.len());

        if !samples.is_empty() {
            self.broadcast(samples.clone()).await;
        }

        Ok(samples.len())
    }

    async fn broadcast(&self, samples: Vec<PriceSample>) {
        let Some(hub) = self.hub.as_ref().filter(|_| self.broadcast_updates) else {
            return;
        };

        let frame = match Envelope::with_payload(EVENT_PRICE_UPDATE, &PriceUpdatePayload { samples })
            .and_then(|envelope| envelope.to_json())
        {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Failed to encode price update: {}", e);
                return;
            }
        };

        if let Err(e) = hub.broadcast(frame).await {
            warn!("Failed to broadcast price update: {}", e);
        }
    }
}

#[async_trait]
impl Job for PriceFeedJob {
    fn name(&self) -> &str {
        "pyth:price-feed"
    }

    async fn run(&self) -> FeedResult<()> {
        self.ingest_once().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::{Hub, SessionHandle, SessionId};
    use feedhub_core::{price_feed_topic, FeedError, LogRecord};
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use tokio::sync::{mpsc, oneshot};

    /// Returns scripted results in order, then empty batches
    struct ScriptedSource {
        script: Mutex<VecDeque<FeedResult<Vec<PriceSample>>>>,
        requests: Mutex<Vec<Vec<String>>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<FeedResult<Vec<PriceSample>>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl PriceSource for ScriptedSource {
        async fn fetch_latest(&self, feed_ids: &[String]) -> FeedResult<Vec<PriceSample>> {
            self.requests.lock().push(feed_ids.to_vec());
            self.script.lock().pop_front().unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    fn config() -> IngestionConfig {
        IngestionConfig {
            feed_ids: vec!["btc".to_string(), "eth".to_string()],
            ..IngestionConfig::default()
        }
    }

    #[tokio::test]
    async fn test_appends_each_sample_to_its_topic() {
        let source = ScriptedSource::new(vec![Ok(vec![
            PriceSample::new("btc", "100", 1),
            PriceSample::new("eth", "7", 1),
        ])]);
        let log = Arc::new(TopicLogStore::new(10));
        let job = PriceFeedJob::new(source.clone(), log.clone(), &config());

        assert_eq!(job.ingest_once().await.unwrap(), 2);
        assert_eq!(
            log.read_all(&price_feed_topic("btc")),
            vec![LogRecord::new("100", 1)]
        );
        assert_eq!(
            log.read_all(&price_feed_topic("eth")),
            vec![LogRecord::new("7", 1)]
        );
        assert_eq!(source.requests.lock()[0], vec!["btc", "eth"]);
    }

    #[tokio::test]
    async fn test_failed_tick_leaves_log_unchanged() {
        let source = ScriptedSource::new(vec![
            Ok(vec![PriceSample::new("btc", "100", 1)]),
            Err(FeedError::network("connection refused")),
            Ok(vec![PriceSample::new("btc", "102", 3)]),
        ]);
        let log = Arc::new(TopicLogStore::new(10));
        let job = PriceFeedJob::new(source.clone(), log.clone(), &config());

        job.run().await.unwrap();
        let before = log.read_all(&price_feed_topic("btc"));

        assert!(job.run().await.is_err());
        assert_eq!(log.read_all(&price_feed_topic("btc")), before);

        // The next tick proceeds independently
        job.run().await.unwrap();
        assert_eq!(
            log.read_all(&price_feed_topic("btc")),
            vec![LogRecord::new("100", 1), LogRecord::new("102", 3)]
        );
        assert_eq!(source.requests.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_broadcasts_price_update() {
        let source = ScriptedSource::new(vec![Ok(vec![PriceSample::new("btc", "100", 1)])]);
        let log = Arc::new(TopicLogStore::new(10));
        let (hub, _task) = Hub::new().spawn();

        let (outbound_tx, mut outbound_rx) = mpsc::channel(4);
        let (close_tx, _close_rx) = oneshot::channel();
        hub.register(SessionHandle::new(SessionId(1), outbound_tx, close_tx))
            .await
            .unwrap();

        let job = PriceFeedJob::new(source, log, &config()).with_hub(hub);
        job.ingest_once().await.unwrap();

        let frame = outbound_rx.recv().await.unwrap();
        let envelope = Envelope::parse(&frame).unwrap();
        assert_eq!(envelope.event, "price_update");
        let payload: PriceUpdatePayload = serde_json::from_value(envelope.payload).unwrap();
        assert_eq!(payload.samples, vec![PriceSample::new("btc", "100", 1)]);
    }

    #[tokio::test]
    async fn test_broadcast_disabled() {
        let source = ScriptedSource::new(vec![Ok(vec![PriceSample::new("btc", "100", 1)])]);
        let log = Arc::new(TopicLogStore::new(10));
        let (hub, _task) = Hub::new().spawn();

        let (outbound_tx, mut outbound_rx) = mpsc::channel(4);
        let (close_tx, _close_rx) = oneshot::channel();
        hub.register(SessionHandle::new(SessionId(1), outbound_tx, close_tx))
            .await
            .unwrap();

        let config = IngestionConfig {
            broadcast_updates: false,
            ..config()
        };
        let job = PriceFeedJob::new(source, log.clone(), &config).with_hub(hub.clone());
        job.ingest_once().await.unwrap();

        // Round trip through the hub loop before checking the queue
        assert_eq!(hub.session_count().await.unwrap(), 1);
        assert!(outbound_rx.try_recv().is_err());
        assert_eq!(log.len(&price_feed_topic("btc")), 1);
    }
}
