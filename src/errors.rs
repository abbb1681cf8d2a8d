/// Domain-specific error types for the monitor.
/// The simulation core raises exactly one kind, `InvalidParameter`, for
/// structural precondition violations; callers should treat it as a
/// programming error, not a transient condition. Everything else covers
/// the plumbing around the core (feed, config, server).
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("price feed error: {0}")]
    PriceFeed(String),

    #[error("config error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for MonitorError {
    fn from(e: reqwest::Error) -> Self {
        MonitorError::Network(e.to_string())
    }
}

impl From<serde_json::Error> for MonitorError {
    fn from(e: serde_json::Error) -> Self {
        MonitorError::Parse(e.to_string())
    }
}

impl From<std::io::Error> for MonitorError {
    fn from(e: std::io::Error) -> Self {
        MonitorError::Network(e.to_string())
    }
}

pub type MonitorResult<T> = Result<T, MonitorError>;
