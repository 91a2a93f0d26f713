//! Capped Topic Log
//!
//! Append-only, size-bounded record history per topic. Once a topic holds
//! more than `max_len` records the oldest ones are evicted, so memory stays
//! bounded regardless of ingestion rate or reader behavior.
//!
//! Topics live in a sharded map and each one sits behind its own lock:
//! appends and reads on different topics never contend, and readers only
//! ever receive a copy.

use dashmap::DashMap;
use feedhub_core::LogRecord;
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

/// Production retention per topic
pub const DEFAULT_MAX_LEN: usize = 1000;

type SharedLog = Arc<RwLock<VecDeque<LogRecord>>>;

/// Per-topic capped logs, keyed by topic name
#[derive(Debug)]
pub struct TopicLogStore {
    logs: DashMap<String, SharedLog>,
    max_len: usize,
}

impl TopicLogStore {
    /// Create a store retaining at most `max_len` records per topic
    ///
    /// A `max_len` of zero is raised to one.
    pub fn new(max_len: usize) -> Self {
        Self {
            logs: DashMap::new(),
            max_len: max_len.max(1),
        }
    }

    /// Maximum records retained per topic
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Append a record at the tail of `topic`, evicting from the head
    pub fn append(&self, topic: &str, record: LogRecord) {
        let log = self.log_for(topic);
        let mut records = log.write();

        records.push_back(record);
        while records.len() > self.max_len {
            records.pop_front();
        }
    }

    /// Copy of every retained record of `topic`, oldest first
    ///
    /// Unknown topics read as empty.
    pub fn read_all(&self, topic: &str) -> Vec<LogRecord> {
        let Some(log) = self.existing(topic) else {
            return Vec::new();
        };

        let records = log.read();
        records.iter().cloned().collect()
    }

    /// Number of records currently retained for `topic`
    pub fn len(&self, topic: &str) -> usize {
        self.existing(topic).map(|log| log.read().len()).unwrap_or(0)
    }

    /// Names of every topic appended to so far
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.logs.iter().map(|entry| entry.key().clone()).collect();
        topics.sort();
        topics
    }

    /// Whether no topic has been created yet
    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }

    fn existing(&self, topic: &str) -> Option<SharedLog> {
        // Clone the Arc so the shard lock is released before the topic lock is taken
        self.logs.get(topic).map(|entry| Arc::clone(entry.value()))
    }

    fn log_for(&self, topic: &str) -> SharedLog {
        if let Some(log) = self.existing(topic) {
            return log;
        }

        let log = self
            .logs
            .entry(topic.to_string())
            .or_insert_with(|| {
                debug!(topic, "Creating topic log");
                Arc::new(RwLock::new(VecDeque::with_capacity(self.max_len.min(64))))
            });
        Arc::clone(log.value())
    }
}

impl Default for TopicLogStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LEN)
    }
}
