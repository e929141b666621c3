use crate::sequencer::SequenceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("target is empty")]
    EmptyTarget,
    #[error("WebSocket connection failed: {0}")]
    Transport(String),
    /// Error frame sent by the analysis service.
    #[error("Error: {0}")]
    Service(String),
    #[error("Ignoring malformed frame: {0}")]
    MalformedFrame(#[from] serde_json::Error),
    #[error(transparent)]
    Sequence(#[from] SequenceError),
    #[error("invalid config {key}={value:?}: {reason}")]
    Config {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("dashboard loop has stopped")]
    LoopStopped,
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}
