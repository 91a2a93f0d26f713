//! Error types for the hub

use thiserror::Error;

/// Hub-wide error type
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unknown channel: {0}")]
    UnknownChannel(String),

    #[error("Hub unavailable: {0}")]
    HubUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FeedError {
    pub fn api(msg: impl Into<String>) -> Self {
        FeedError::Api(msg.into())
    }

    pub fn network(msg: impl Into<String>) -> Self {
        FeedError::Network(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        FeedError::Parse(msg.into())
    }

    pub fn unknown_channel(name: impl Into<String>) -> Self {
        FeedError::UnknownChannel(name.into())
    }

    pub fn hub_unavailable(msg: impl Into<String>) -> Self {
        FeedError::HubUnavailable(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        FeedError::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        FeedError::Internal(msg.into())
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        FeedError::Parse(err.to_string())
    }
}

/// Result type alias for hub operations
pub type FeedResult<T> = Result<T, FeedError>;
