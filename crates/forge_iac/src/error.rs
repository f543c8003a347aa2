//! Error types for the IaC layer.

use forge_core::SynthError;
use thiserror::Error;

/// Result type alias for IaC operations.
pub type IacResult<T> = Result<T, IacError>;

/// Errors that can occur while declaring or writing environments.
#[derive(Error, Debug)]
pub enum IacError {
    #[error("Synthesis failed: {0}")]
    Synth(#[from] SynthError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Unsupported output format: {0}")]
    InvalidFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl IacError {
    /// The underlying synthesis error, if any.
    pub fn as_synth(&self) -> Option<&SynthError> {
        match self {
            IacError::Synth(err) => Some(err),
            _ => None,
        }
    }
}
