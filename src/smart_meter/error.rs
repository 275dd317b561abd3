use thiserror::Error;

/// Errors surfaced by the meter core to its caller.
///
/// None of these are fatal for measurement: the in-memory state stays valid
/// and the caller decides whether to retry or report.
#[derive(Debug, Error)]
pub enum MeterError {
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("store contents are not valid JSON: {0}")]
    StoreFormat(#[from] serde_json::Error),

    #[error("configuration file is not valid TOML: {0}")]
    Config(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("price per unit must be finite and positive, got {0}")]
    InvalidPrice(f64),
}

pub type Result<T> = std::result::Result<T, MeterError>;
