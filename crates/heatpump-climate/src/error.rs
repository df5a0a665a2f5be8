//! Error types for the climate adapter.

use thiserror::Error;

/// Result type for climate adapter operations.
pub type ClimateResult<T> = Result<T, ClimateError>;

/// Kind of device token being validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Operating mode token
    Mode,
    /// Fan speed token
    Fan,
    /// Vane (swing) position token
    Swing,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mode => write!(f, "mode"),
            Self::Fan => write!(f, "fan"),
            Self::Swing => write!(f, "swing"),
        }
    }
}

/// Error type for climate adapter operations.
#[derive(Debug, Error)]
pub enum ClimateError {
    /// Payload is not JSON or lacks a field required for its topic
    #[error("Decode error: {0}")]
    Decode(String),

    /// Device reported a mode token outside the known vocabulary
    #[error("Unknown device mode: {0}")]
    UnknownMode(String),

    /// Caller requested a token the device does not accept
    #[error("Invalid {kind} token: {value}")]
    InvalidMode { kind: TokenKind, value: String },

    /// Setpoint is NaN or infinite
    #[error("Invalid setpoint: {0}")]
    InvalidSetpoint(f64),

    /// Message arrived on a topic this adapter does not own
    #[error("Unrecognized topic: {0}")]
    UnrecognizedTopic(String),

    /// Publish/subscribe failure reported by the transport
    #[error("Transport error: {0}")]
    Transport(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<serde_json::Error> for ClimateError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

impl ClimateError {
    /// Whether this error stems from an inbound message that was dropped.
    pub fn is_dropped_message(&self) -> bool {
        matches!(
            self,
            Self::Decode(_) | Self::UnknownMode(_) | Self::UnrecognizedTopic(_)
        )
    }
}
