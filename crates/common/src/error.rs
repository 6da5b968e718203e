use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Market data unreachable or answered with a non-success status.
    #[error("Network error: {0}")]
    Network(String),

    /// Order rejected by the exchange or never reached it. Carries the raw detail.
    #[error("Failed to execute trade: {0}")]
    Execution(String),

    #[error("Trade history storage error: {0}")]
    Storage(String),

    /// No trade history file has been written yet.
    #[error("No trade history available")]
    MissingHistory,

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
