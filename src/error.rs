use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodonOptError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Scoring plugin failure: {}", .0.join("; "))]
    Plugin(Vec<String>),

    #[error("Folding backend unavailable: {0}")]
    BackendConnectivity(String),

    #[error("Folding error: {0}")]
    Folding(String),

    #[error("Malformed folding reply: {0}")]
    Protocol(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("AMQP error: {0}")]
    Amqp(#[from] lapin::Error),
}

pub type Result<T> = std::result::Result<T, CodonOptError>;
