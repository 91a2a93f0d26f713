//! Periodic job scheduler
//!
//! Each registered job runs on its own ticker task. A failed run is logged
//! and the ticker carries on; a slow run delays only its own job.

use async_trait::async_trait;
use feedhub_core::FeedResult;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// A unit of periodic work
#[async_trait]
pub trait Job: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Run once
    async fn run(&self) -> FeedResult<()>;
}

/// Runs registered jobs at fixed periods
#[derive(Default)]
pub struct Scheduler {
    entries: Vec<(Duration, Arc<dyn Job>)>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `job` to run every `period`
    pub fn register(&mut self, period: Duration, job: Arc<dyn Job>) -> &mut Self {
        self.entries.push((period, job));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Start every job on its own task
    ///
    /// The first run of each job happens immediately.
    pub fn start(self) -> Vec<JoinHandle<()>> {
        self.entries
            .into_iter()
            .map(|(period, job)| tokio::spawn(run_job(period, job)))
            .collect()
    }
}

async fn run_job(period: Duration, job: Arc<dyn Job>) {
    info!("Starting job {} every {:?}", job.name(), period);

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        match job.run().await {
            Ok(()) => debug!("Job {} completed", job.name()),
            Err(e) => warn!("Job {} failed: {}", job.name(), e),
        }
    }
}
