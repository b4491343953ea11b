use thiserror::Error;

/// Main error type for the simulator
#[derive(Error, Debug)]
pub enum TradeGymError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Market data errors
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Invalid market data: {0}")]
    InvalidMarketData(String),

    // Experience / learning errors
    #[error("Insufficient experience: {available} stored, {required} required")]
    InsufficientExperience { available: usize, required: usize },

    #[error("Replay buffer is empty")]
    EmptyBuffer,

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    // State machine errors
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    // Checkpoint errors
    #[error("Checkpoint not found: {0}")]
    CheckpointNotFound(String),

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for TradeGymError
pub type Result<T> = std::result::Result<T, TradeGymError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_experience_message() {
        let err = TradeGymError::InsufficientExperience {
            available: 3,
            required: 64,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient experience: 3 stored, 64 required"
        );
    }

    #[test]
    fn test_dimension_mismatch_message() {
        let err = TradeGymError::DimensionMismatch {
            expected: 50,
            actual: 42,
        };
        assert!(err.to_string().contains("expected 50"));
    }
}
