use thiserror::Error;

/// Failures of the provider-facing surface. Handlers turn every variant into
/// a fixed response shape; none of them reach the caller as a fault.
#[derive(Debug, Error)]
pub enum PrxError {
    #[error("security check failed")]
    AuthDenied,
    #[error("key already exists")]
    AlreadyExists,
    #[error("provider call failed: {0}")]
    Transport(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("template resource corrupt: {0}")]
    ResourceCorrupt(&'static str),
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

pub type PrxResult<T> = Result<T, PrxError>;
