use decaywatch_core::error::GatewayError;
use decaywatch_core::types::ChannelKind;
use thiserror::Error;

/// Dispatch-level failures. Per-channel delivery failures are never here:
/// they are data in the alert's channel results.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The gateway could not supply preferences, so target channels cannot
    /// be determined. Distinct from any per-channel failure.
    #[error("preferences unavailable: {0}")]
    PreferencesUnavailable(#[source] GatewayError),
    #[error("failed to persist alert: {0}")]
    Store(#[source] GatewayError),
    #[error("channel not configured: {0}")]
    ChannelNotConfigured(ChannelKind),
}
