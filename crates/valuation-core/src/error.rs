use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValuationError {
    /// The caller sent something we cannot act on (missing or blank ticker).
    #[error("{0}")]
    InvalidRequest(String),

    /// A provider answered, but without the field or values we need.
    #[error("{0}")]
    UpstreamDataMissing(String),

    /// Transport failure, timeout, non-2xx status or undecodable body.
    #[error("Upstream provider unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Earnings history too short, or a zero EPS in a denominator.
    #[error("Cannot compute valuation: {0}")]
    ComputationUndefined(String),
}

impl ValuationError {
    /// Short stable name used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            ValuationError::InvalidRequest(_) => "invalid_request",
            ValuationError::UpstreamDataMissing(_) => "upstream_data_missing",
            ValuationError::UpstreamUnavailable(_) => "upstream_unavailable",
            ValuationError::ComputationUndefined(_) => "computation_undefined",
        }
    }
}
