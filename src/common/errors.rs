//! Error types for the engine
//!
//! Errors are grouped into three classes that decide how the caller reacts:
//! transient failures are logged and skipped until the next event, invalid
//! state is a contract violation that is logged loudly and skipped, and fatal
//! errors abort start-up.

use thiserror::Error;

/// Result type alias using our EngineError
pub type Result<T> = std::result::Result<T, EngineError>;

/// Main error type for engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    /// WebSocket connection errors
    #[error("WebSocket connection error: {0}")]
    WebSocketConnection(String),

    /// WebSocket send/receive errors
    #[error("WebSocket communication error: {0}")]
    WebSocketCommunication(String),

    /// JSON serialization/deserialization errors
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// File or stream I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A feed message that parsed but failed field validation
    #[error("Invalid market data message: {0}")]
    InvalidMessage(String),

    /// Upstream call failed but may succeed on the next cycle
    #[error("Transient upstream failure: {0}")]
    Transient(String),

    /// Broker refused the order
    #[error("Order rejected: {0}")]
    Rejected(String),

    /// Authentication errors
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Operation attempted against state that does not allow it
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Timeout errors
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Channel send errors
    #[error("Channel send error: {0}")]
    ChannelSend(String),
}

impl EngineError {
    /// Failures that are absorbed and retried naturally on the next event
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EngineError::WebSocketConnection(_)
                | EngineError::WebSocketCommunication(_)
                | EngineError::Io(_)
                | EngineError::Transient(_)
                | EngineError::Rejected(_)
                | EngineError::Timeout(_)
                | EngineError::ChannelSend(_)
        )
    }

    /// Failures that must abort the session
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::Authentication(_) | EngineError::Configuration(_)
        )
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for EngineError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        EngineError::WebSocketCommunication(err.to_string())
    }
}

impl From<config::ConfigError> for EngineError {
    fn from(err: config::ConfigError) -> Self {
        EngineError::Configuration(err.to_string())
    }
}
