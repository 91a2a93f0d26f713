//! Periodic status report

use async_trait::async_trait;
use feedhub_core::FeedResult;
use std::sync::Arc;
use tracing::info;

use crate::scheduler::Job;
use crate::websocket::HubHandle;
use crate::TopicLogStore;

/// Logs live sessions and retained records per topic
pub struct StatusJob {
    hub: HubHandle,
    log: Arc<TopicLogStore>,
}

impl StatusJob {
    pub fn new(hub: HubHandle, log: Arc<TopicLogStore>) -> Self {
        Self { hub, log }
    }

    /// Retained record count for every topic, sorted by topic name
    pub fn topic_sizes(&self) -> Vec<(String, usize)> {
        self.log
            .topics()
            .into_iter()
            .map(|topic| {
                let len = self.log.len(&topic);
                (topic, len)
            })
            .collect()
    }
}

#[async_trait]
impl Job for StatusJob {
    fn name(&self) -> &str {
        "misc:status"
    }

    async fn run(&self) -> FeedResult<()> {
        let sessions = self.hub.session_count().await?;
        info!(sessions, topics = self.log.topics().len(), "Hub status");

        for (topic, len) in self.topic_sizes() {
            info!(%topic, records = len, max = self.log.max_len(), "Topic status");
        }

        Ok(())
    }
}
