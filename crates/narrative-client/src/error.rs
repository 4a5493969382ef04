use thiserror::Error;
use valuation_core::ValuationError;

#[derive(Error, Debug)]
pub enum NarrativeError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout")]
    Timeout,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type NarrativeResult<T> = Result<T, NarrativeError>;

impl NarrativeError {
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NarrativeError::Timeout
        } else {
            NarrativeError::RequestFailed(err)
        }
    }
}

impl From<NarrativeError> for ValuationError {
    fn from(err: NarrativeError) -> Self {
        ValuationError::UpstreamUnavailable(format!("narrative provider: {}", err))
    }
}
