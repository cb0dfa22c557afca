use thiserror::Error;

/// Error type for parcel model setup and integration.
///
/// Setup errors are reported before the first step is taken.
/// Numerical errors abort the run; there is no mid-run recovery.
#[derive(Error, Debug)]
pub enum ParcelError {
    #[error("{0}")]
    Error(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Invalid bin specification for '{partition}': {reason}")]
    InvalidBinSpec { partition: String, reason: String },
    #[error("Non-finite {quantity} ({value}) after step {step}")]
    NonFinite {
        step: usize,
        quantity: String,
        value: f64,
    },
    #[error("{quantity} left its physical range ({value}) after step {step}")]
    OutOfRange {
        step: usize,
        quantity: String,
        value: f64,
    },
    #[error("Integration failed at step {step}: {reason}")]
    IntegrationFailed { step: usize, reason: String },
    #[error("Could not parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience type for `Result<T, ParcelError>`.
pub type ParcelResult<T> = Result<T, ParcelError>;
