use thiserror::Error;

/// Calculator failures. "Not enough data" is not here on purpose: it is a
/// value variant of `DecayOutcome`, since it is an expected, common result.
#[derive(Debug, Error)]
pub enum DecayError {
    #[error("invalid decay config: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Error)]
pub enum TrendError {
    #[error("invalid trend config: {0}")]
    InvalidConfig(String),
    /// History violated the sorted/unique-timestamp contract. Fatal to the
    /// operation; the analyzer never guesses a trend from malformed input.
    #[error("history integrity violation: {0}")]
    DataIntegrity(String),
}

/// Failures surfaced by the persistence gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("backend error: {0}")]
    Backend(String),
}
