use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("failed to connect to broker: {0}")]
    Connection(String),
    #[error("failed to set up topology: {0}")]
    Topology(String),
    #[error("broker connection closed: {0}")]
    ConnectionClosed(String),
    #[error("channel operation failed: {0}")]
    Channel(String),
    #[error("unsupported broker url: {0}")]
    UnsupportedUrl(String),
}
