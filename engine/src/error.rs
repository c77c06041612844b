use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    #[error("Serialization error: {source}")]
    SerializationError {
        #[from]
        source: serde_json::Error,
    },

    #[error("Unknown instrument: '{0}'")]
    UnknownInstrument(String),

    #[error("Unknown timeframe: '{0}'")]
    UnknownTimeframe(String),

    // Only reachable through a logic bug in the candle generator.
    #[error("Candle invariant violated at index {index}: {detail}")]
    InvariantViolation { index: usize, detail: String },

    #[error("Local storage error: {0}")]
    StorageError(String),

    #[error(transparent)]
    AnyhowError(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
