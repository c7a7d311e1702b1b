//! Error types for Synheart Drive

use thiserror::Error;

/// Errors that can occur while configuring or driving the pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Engine is already running")]
    AlreadyRunning,

    #[error("Invalid command table: {0}")]
    InvalidCommandTable(String),

    #[error("Invalid RC command: {0}")]
    CommandParseError(String),

    #[error("Reference time out of range: {0} ms")]
    ReferenceTimeOutOfRange(i64),

    #[error("Scheduler error: {0}")]
    SchedulerError(String),
}

/// Failure reported by a single subscriber while handling a snapshot.
///
/// These never abort a cycle; the pipeline logs them and moves on.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct SubscriberError(pub String);

impl SubscriberError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

impl From<std::io::Error> for SubscriberError {
    fn from(e: std::io::Error) -> Self {
        Self(e.to_string())
    }
}
